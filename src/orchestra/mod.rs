pub mod adapter;
pub mod communication;
pub mod error;
pub mod orchestrator;
mod worker;

pub use adapter::{ProgressReporter, TrainingAdapter, TrainingJob};
pub use communication::{
    Action, Message, MessageType, Task, TaskId, TaskStatus, TrainArgs, TrainRequest,
    TrainResponse,
};
pub use error::{AdapterErr, PoolErr};
pub use orchestrator::{PoolStatus, UnitState, WorkerPool};
