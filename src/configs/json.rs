use std::{fs, path::Path};

use super::{DatasetConfig, NetworkConfig, TrainingConfig};
use crate::{dataset::TrainItem, Result};

/// Loads a [`NetworkConfig`] from a JSON file.
pub fn load_network_config(path: impl AsRef<Path>) -> Result<NetworkConfig> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Loads a [`TrainingConfig`] from a JSON file.
///
/// A `local` dataset path is resolved relative to the directory of the config file when it
/// is not absolute.
///
/// # Errors
/// Returns `NnErr::Io` if the file cannot be read and `NnErr::Serde` if it cannot be parsed.
pub fn load_training(path: impl AsRef<Path>) -> Result<TrainingConfig> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    let mut config: TrainingConfig = serde_json::from_str(&content)?;

    if let DatasetConfig::Local { path: dataset } = &mut config.dataset {
        if dataset.is_relative() {
            if let Some(dir) = path.parent() {
                *dataset = dir.join(&*dataset);
            }
        }
    }

    Ok(config)
}

impl DatasetConfig {
    /// Materializes the train items this config points at.
    pub fn load(&self) -> Result<Vec<TrainItem>> {
        match self {
            DatasetConfig::Inline { items } => Ok(items.clone()),
            DatasetConfig::Local { path } => {
                let content = fs::read_to_string(path)?;
                Ok(serde_json::from_str(&content)?)
            }
        }
    }
}
