use std::{fmt, future::IntoFuture, path::Path};

use futures::future::BoxFuture;
use log::{debug, info};
use tokio::sync::mpsc::UnboundedReceiver;

use super::{
    communication::{Action, Message, Task, TaskId, TrainArgs, TrainRequest, TrainResponse},
    error::{AdapterErr, Result},
    orchestrator::WorkerPool,
};
use crate::{
    configs::PoolConfig,
    dataset::TrainItem,
    neural_net::{EpochReport, NeuralNetwork},
    optimization::GradAlgorithm,
};

/// Receives the progress of a training job, once per finished epoch.
pub type ProgressReporter = Box<dyn FnMut(EpochReport) + Send>;

/// Trains networks on a [`WorkerPool`] without blocking the caller.
#[derive(Clone)]
pub struct TrainingAdapter {
    pool: WorkerPool,
}

impl TrainingAdapter {
    /// Starts a pool of `pool_size` execution units.
    ///
    /// Must be called inside a running actix system.
    pub fn new(pool_size: usize) -> Result<Self> {
        Ok(Self {
            pool: WorkerPool::new(pool_size)?,
        })
    }

    pub fn from_config(config: &PoolConfig) -> Result<Self> {
        Self::new(config.size.get())
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Queues the training of a copy of `network`.
    ///
    /// The job is queued right away, awaiting the returned [`TrainingJob`] yields the trained
    /// network. `network` itself is left untouched.
    ///
    /// # Arguments
    /// * `network` - The network to start from.
    /// * `algorithm` - The weight update rule.
    /// * `train_set` - The examples to learn.
    /// * `epochs` - The amount of passes over `train_set`.
    /// * `reporter` - Called with the progress of every epoch while the job is awaited.
    ///
    /// # Returns
    /// The job handle, or an error if the request cannot be encoded.
    pub fn train_async(
        &self,
        network: &NeuralNetwork,
        algorithm: GradAlgorithm,
        train_set: &[TrainItem],
        epochs: usize,
        reporter: Option<ProgressReporter>,
    ) -> Result<TrainingJob> {
        let request = TrainRequest {
            serialized_network: network.serialize()?,
            args: TrainArgs {
                algorithm,
                train_set: train_set.to_vec(),
                epochs,
            },
        };

        let task = Task::new(Message::request(Action::TrainGradAlgorithm, &request)?);
        let id = task.id.clone();

        // subscribe first, the scheduler handles messages in the order they were sent
        let updates = self.pool.subscribe_to(id.clone());
        self.pool.enqueue(task);
        info!(task_id = id.as_str(), epochs = epochs; "training queued with {algorithm:?}");

        Ok(TrainingJob {
            id: id.clone(),
            pool: self.pool.clone(),
            result: Box::pin(wait_for(id, updates, reporter)),
        })
    }

    /// Reads a serialized network from `path`.
    pub async fn load_network(&self, path: impl AsRef<Path>) -> Result<NeuralNetwork> {
        let serialized = tokio::fs::read_to_string(path).await?;
        Ok(NeuralNetwork::deserialize(&serialized)?)
    }

    /// Serializes `network` into bytes ready to be stored.
    pub fn save_network(&self, network: &NeuralNetwork) -> Result<Vec<u8>> {
        Ok(network.serialize()?.into_bytes())
    }

    /// Writes the serialized `network` to `path`.
    pub async fn save_network_to(
        &self,
        network: &NeuralNetwork,
        path: impl AsRef<Path>,
    ) -> Result<()> {
        let bytes = self.save_network(network)?;
        tokio::fs::write(path, bytes).await?;
        Ok(())
    }

    /// Stops the pool. Every pending job fails with [`AdapterErr::Terminated`].
    pub fn terminate(&self) {
        info!("terminating training pool");
        self.pool.terminate();
    }
}

/// A queued training, await it for the trained network.
pub struct TrainingJob {
    id: TaskId,
    pool: WorkerPool,
    result: BoxFuture<'static, Result<NeuralNetwork>>,
}

impl TrainingJob {
    pub fn id(&self) -> &TaskId {
        &self.id
    }

    /// Asks the pool to stop this job, it then resolves to [`AdapterErr::Cancelled`].
    ///
    /// A job that already completed keeps its result.
    pub fn cancel(&self) {
        self.pool.cancel(self.id.clone());
    }
}

impl fmt::Debug for TrainingJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrainingJob").field("id", &self.id).finish()
    }
}

impl IntoFuture for TrainingJob {
    type Output = Result<NeuralNetwork>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        self.result
    }
}

async fn wait_for(
    id: TaskId,
    mut updates: UnboundedReceiver<Task>,
    mut reporter: Option<ProgressReporter>,
) -> Result<NeuralNetwork> {
    while let Some(task) = updates.recv().await {
        match task.message.action {
            Action::TrainGradAlgorithmStatus => {
                if let Some(reporter) = reporter.as_mut() {
                    reporter(task.message.body()?);
                }
            }
            Action::TrainGradAlgorithm if task.is_complete() => {
                debug!(task_id = id.as_str(); "training response received");
                return trained_network(id, &task.message);
            }
            Action::TrainGradAlgorithm => {}
        }
    }

    debug!(task_id = id.as_str(); "pool terminated before the task completed");
    Err(AdapterErr::Terminated)
}

fn trained_network(id: TaskId, message: &Message) -> Result<NeuralNetwork> {
    let response: TrainResponse = message.body()?;

    if response.cancelled {
        return Err(AdapterErr::Cancelled { id });
    }

    match response.serialized_network {
        Some(serialized) => Ok(NeuralNetwork::deserialize(&serialized)?),
        None => Err(AdapterErr::TaskFailed {
            id,
            reason: response
                .error
                .unwrap_or_else(|| "the response carries no network".into()),
        }),
    }
}
