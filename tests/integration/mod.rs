//! Integration tests for Fig settings management

mod config_loading;
mod editor_session;
mod file_watch;
mod merge_engine;
mod persistence;
pub mod test_utils;
