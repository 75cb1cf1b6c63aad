//! Layer ordering for Fig's own configuration.

pub mod merge_policy;
