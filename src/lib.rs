pub mod activation;
pub mod configs;
pub mod dataset;
mod error;
pub mod layer;
pub mod matrix;
pub mod neural_net;
pub mod optimization;
pub mod orchestra;

pub use activation::ActFn;
pub use dataset::{LabeledDataset, TrainItem, TrainSetProvider};
pub use error::{NnErr, Result};
pub use layer::{ForwardContext, Layer, LayerConfig, LayerType};
pub use matrix::Matrix;
pub use neural_net::{EpochReport, NeuralNetwork, TrainSummary};
pub use optimization::{GradAlgorithm, Optimizer};
pub use orchestra::{AdapterErr, PoolErr, TrainingAdapter, TrainingJob, WorkerPool};
