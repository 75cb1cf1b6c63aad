//! Read every settings layer for a home/project pair and merge them.

use crate::error::FileError;
use crate::merge::{merge_layers, MergedConfig};
use crate::persistence::ConfigFileManager;
use crate::settings::{ConfigDocument, ConfigPaths, ConfigSource};
use std::path::PathBuf;
use tracing::debug;

/// One settings file as found on disk
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub source: ConfigSource,
    pub path: PathBuf,
    /// `None` when the file does not exist
    pub document: Option<ConfigDocument>,
}

impl Layer {
    pub fn exists(&self) -> bool {
        self.document.is_some()
    }
}

/// Read all layers that apply to `paths`, lowest precedence first.
///
/// Project layers are skipped without a project. Any unreadable or invalid file
/// fails the whole load.
pub fn load_layers(
    manager: &ConfigFileManager,
    paths: &ConfigPaths,
) -> Result<Vec<Layer>, FileError> {
    let mut layers = Vec::new();
    for source in ConfigSource::ALL {
        let Some(path) = source.path(paths) else {
            continue;
        };
        let document = manager.read::<ConfigDocument>(&path)?;
        debug!(source = %source, path = %path.display(), found = document.is_some(), "Loaded layer");
        layers.push(Layer {
            source,
            path,
            document,
        });
    }
    Ok(layers)
}

/// Merge the layers that exist.
pub fn merge_loaded(layers: &[Layer]) -> MergedConfig {
    let present: Vec<(ConfigSource, &ConfigDocument)> = layers
        .iter()
        .filter_map(|layer| layer.document.as_ref().map(|doc| (layer.source, doc)))
        .collect();
    merge_layers(&present)
}

/// [`load_layers`] then [`merge_loaded`].
pub fn load_merged(
    manager: &ConfigFileManager,
    paths: &ConfigPaths,
) -> Result<MergedConfig, FileError> {
    Ok(merge_loaded(&load_layers(manager, paths)?))
}

/// [`load_merged`] with each read on the blocking thread pool.
pub async fn load_merged_async(
    manager: &ConfigFileManager,
    paths: &ConfigPaths,
) -> Result<MergedConfig, FileError> {
    let mut layers = Vec::new();
    for source in ConfigSource::ALL {
        let Some(path) = source.path(paths) else {
            continue;
        };
        let document = manager.read_async::<ConfigDocument>(path.clone()).await?;
        layers.push(Layer {
            source,
            path,
            document,
        });
    }
    Ok(merge_loaded(&layers))
}
