use std::{
    any::Any,
    ops::ControlFlow,
    panic::{self, AssertUnwindSafe},
};

use actix::prelude::*;
use log::{debug, error, info, warn};
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::{
    communication::{
        Action, Message, MessageType, Task, TaskId, TaskStatus, TrainRequest, TrainResponse,
    },
    orchestrator::Scheduler,
};
use crate::neural_net::NeuralNetwork;

/* -------------------------------------------------------------------------- */
/*                               Actix messages                               */
/* -------------------------------------------------------------------------- */

/// Scheduler -> unit: run this task.
#[derive(Message)]
#[rtype(result = "()")]
pub(super) struct Execute {
    pub task: Task,
    pub token: CancellationToken,
}

/// Unit -> scheduler: a message emitted on behalf of a task.
#[derive(Message)]
#[rtype(result = "()")]
pub(super) struct UnitEvent {
    pub unit_id: usize,
    pub task: Task,
}

/* -------------------------------------------------------------------------- */
/*                               Execution unit                               */
/* -------------------------------------------------------------------------- */

/// Runs one task at a time on its own thread.
///
/// Every task handed to a unit ends with exactly one `Complete` event, whether it trained,
/// was cancelled, was malformed or panicked.
pub(super) struct ExecutionUnit {
    id: usize,
    scheduler: Addr<Scheduler>,
}

impl ExecutionUnit {
    pub fn new(id: usize, scheduler: Addr<Scheduler>) -> Self {
        Self { id, scheduler }
    }

    fn run(&self, message: &Message, token: &CancellationToken) -> Result<TrainResponse, String> {
        if message.kind != MessageType::Request || message.action != Action::TrainGradAlgorithm {
            return Err(format!(
                "unsupported {:?} message for action {:?}",
                message.kind, message.action
            ));
        }

        let request: TrainRequest = message.body().map_err(|e| e.to_string())?;
        let mut network =
            NeuralNetwork::deserialize(&request.serialized_network).map_err(|e| e.to_string())?;
        let args = request.args;

        if token.is_cancelled() {
            return Ok(TrainResponse::cancelled());
        }

        let summary = network
            .train(args.algorithm, &args.train_set, args.epochs, |report| {
                self.emit(
                    message.id.clone(),
                    TaskStatus::Running,
                    Action::TrainGradAlgorithmStatus,
                    report,
                );

                if token.is_cancelled() {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            })
            .map_err(|e| e.to_string())?;

        if summary.cancelled {
            debug!(unit = self.id, epochs = summary.epochs_run; "training cancelled");
            return Ok(TrainResponse::cancelled());
        }

        let serialized = network.serialize().map_err(|e| e.to_string())?;
        Ok(TrainResponse::trained(serialized))
    }

    fn emit<B: Serialize>(&self, id: TaskId, status: TaskStatus, action: Action, body: &B) {
        let message = match Message::response(id.clone(), action, body) {
            Ok(message) => message,
            Err(e) => {
                error!(unit = self.id, task_id = id.as_str(); "cannot encode response: {e}");
                Message {
                    id: id.clone(),
                    kind: MessageType::Response,
                    action,
                    body: Value::Null,
                }
            }
        };

        self.scheduler.do_send(UnitEvent {
            unit_id: self.id,
            task: Task {
                id,
                status,
                message,
            },
        });
    }
}

fn panic_reason(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("training panicked: {msg}")
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("training panicked: {msg}")
    } else {
        "training panicked".to_string()
    }
}

impl Actor for ExecutionUnit {
    type Context = SyncContext<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        debug!(unit = self.id; "execution unit started");
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        debug!(unit = self.id; "execution unit stopped");
    }
}

impl Handler<Execute> for ExecutionUnit {
    type Result = ();

    fn handle(&mut self, msg: Execute, _ctx: &mut Self::Context) {
        let Execute { task, token } = msg;
        info!(unit = self.id, task_id = task.id.as_str(); "running task");

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.run(&task.message, &token)));
        let response = match outcome {
            Ok(Ok(response)) => response,
            Ok(Err(reason)) => {
                warn!(unit = self.id, task_id = task.id.as_str(); "task failed: {reason}");
                TrainResponse::failed(reason)
            }
            Err(payload) => {
                let reason = panic_reason(payload);
                error!(unit = self.id, task_id = task.id.as_str(); "{reason}");
                TrainResponse::failed(reason)
            }
        };

        info!(unit = self.id, task_id = task.id.as_str(); "task complete");
        self.emit(
            task.id,
            TaskStatus::Complete,
            Action::TrainGradAlgorithm,
            &response,
        );
    }
}
