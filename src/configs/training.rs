use std::{num::NonZeroUsize, path::PathBuf};

use serde::{Deserialize, Serialize};

use super::NetworkConfig;
use crate::{dataset::TrainItem, optimization::GradAlgorithm};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    pub size: NonZeroUsize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            size: NonZeroUsize::MIN,
        }
    }
}

/// Where the training examples come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DatasetConfig {
    Inline { items: Vec<TrainItem> },
    /// A JSON file holding an array of train items.
    Local { path: PathBuf },
}

/// A whole training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub network: NetworkConfig,
    pub algorithm: GradAlgorithm,
    pub epochs: usize,
    #[serde(default)]
    pub pool: PoolConfig,
    pub dataset: DatasetConfig,
}
