mod json;
mod model;
mod training;

pub use json::{load_network_config, load_training};
pub use model::NetworkConfig;
pub use training::{DatasetConfig, PoolConfig, TrainingConfig};
