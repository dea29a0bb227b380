use std::collections::VecDeque;

use actix::prelude::*;
use log::{debug, info, warn};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;

use super::{
    communication::{Action, Message, Task, TaskId, TaskStatus, TrainResponse},
    error::PoolErr,
    worker::{Execute, ExecutionUnit, UnitEvent},
};

/* -------------------------------------------------------------------------- */
/*                               Actix messages                               */
/* -------------------------------------------------------------------------- */

#[derive(Message)]
#[rtype(result = "()")]
struct Enqueue(Task);

#[derive(Message)]
#[rtype(result = "()")]
struct Subscribe(Subscriber);

#[derive(Message)]
#[rtype(result = "()")]
struct Cancel(TaskId);

#[derive(Message)]
#[rtype(result = "()")]
struct Terminate;

#[derive(Message)]
#[rtype(result = "PoolStatus")]
struct GetStatus;

/* -------------------------------------------------------------------------- */
/*                                  Snapshots                                 */
/* -------------------------------------------------------------------------- */

/// What an execution unit is doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitState {
    Idle,
    Running(TaskId),
}

/// A snapshot of the pool.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PoolStatus {
    /// One entry per execution unit, in dispatch order.
    pub units: Vec<UnitState>,
    /// The waiting tasks, oldest first.
    pub queued: Vec<TaskId>,
}

/* -------------------------------------------------------------------------- */
/*                               Scheduler actor                              */
/* -------------------------------------------------------------------------- */

struct UnitSlot {
    addr: Addr<ExecutionUnit>,
    running: Option<(TaskId, CancellationToken)>,
}

struct Subscriber {
    /// Only the events of this task when set.
    task: Option<TaskId>,
    sender: UnboundedSender<Task>,
}

impl Subscriber {
    /// Forwards `task` if it is of interest, returns whether the subscription stays open.
    fn deliver(&self, task: &Task) -> bool {
        match &self.task {
            None => self.sender.send(task.clone()).is_ok(),
            Some(id) if *id == task.id => {
                // nothing follows a completion, ending the stream frees the receiver
                self.sender.send(task.clone()).is_ok() && !task.is_complete()
            }
            Some(_) => !self.sender.is_closed(),
        }
    }
}

/// Owns the task queue and the execution units.
///
/// Tasks are handed out in FIFO order to the first idle unit. Every event a unit emits is
/// republished to the subscribers interested in its task. A completion frees the unit and
/// drains the queue.
pub(super) struct Scheduler {
    units: Vec<UnitSlot>,
    queue: VecDeque<Task>,
    subscribers: Vec<Subscriber>,
}

impl Scheduler {
    fn start_with(size: usize) -> Addr<Self> {
        Self::create(move |ctx| {
            let scheduler = ctx.address();
            let units = (0..size)
                .map(|unit_id| {
                    let scheduler = scheduler.clone();
                    UnitSlot {
                        addr: SyncArbiter::start(1, move || {
                            ExecutionUnit::new(unit_id, scheduler.clone())
                        }),
                        running: None,
                    }
                })
                .collect();

            Self {
                units,
                queue: VecDeque::new(),
                subscribers: Vec::new(),
            }
        })
    }

    /// Hands queued tasks to idle units until either runs out.
    fn dispatch(&mut self) {
        for (unit_id, unit) in self.units.iter_mut().enumerate() {
            if unit.running.is_some() {
                continue;
            }

            let Some(mut task) = self.queue.pop_front() else {
                break;
            };

            debug!(unit = unit_id, task_id = task.id.as_str(); "dispatching task");
            task.status = TaskStatus::Running;
            let token = CancellationToken::new();
            unit.running = Some((task.id.clone(), token.clone()));
            unit.addr.do_send(Execute { task, token });
        }
    }

    /// Sends `task` to every interested subscriber, forgetting the ones that hung up.
    fn publish(&mut self, task: Task) {
        self.subscribers.retain(|subscriber| subscriber.deliver(&task));
    }

    fn status(&self) -> PoolStatus {
        PoolStatus {
            units: self
                .units
                .iter()
                .map(|unit| match &unit.running {
                    Some((id, _)) => UnitState::Running(id.clone()),
                    None => UnitState::Idle,
                })
                .collect(),
            queued: self.queue.iter().map(|task| task.id.clone()).collect(),
        }
    }
}

impl Actor for Scheduler {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        info!(units = self.units.len(); "scheduler started");
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        info!("scheduler stopped");
    }
}

impl Handler<Enqueue> for Scheduler {
    type Result = ();

    fn handle(&mut self, msg: Enqueue, _ctx: &mut Self::Context) {
        let mut task = msg.0;
        debug!(task_id = task.id.as_str(), queued = self.queue.len(); "task enqueued");
        task.status = TaskStatus::Waiting;
        self.queue.push_back(task);
        self.dispatch();
    }
}

impl Handler<Subscribe> for Scheduler {
    type Result = ();

    fn handle(&mut self, msg: Subscribe, _ctx: &mut Self::Context) {
        self.subscribers.push(msg.0);
    }
}

impl Handler<UnitEvent> for Scheduler {
    type Result = ();

    fn handle(&mut self, msg: UnitEvent, _ctx: &mut Self::Context) {
        let UnitEvent { unit_id, task } = msg;
        let complete = task.is_complete();

        if complete {
            match self.units.get_mut(unit_id) {
                Some(unit) if matches!(&unit.running, Some((id, _)) if *id == task.id) => {
                    debug!(unit = unit_id, task_id = task.id.as_str(); "task completed");
                    unit.running = None;
                }
                _ => warn!(
                    unit = unit_id, task_id = task.id.as_str();
                    "completion from a unit that was not running the task"
                ),
            }
        }

        self.publish(task);

        if complete {
            self.dispatch();
        }
    }
}

impl Handler<Cancel> for Scheduler {
    type Result = ();

    fn handle(&mut self, msg: Cancel, _ctx: &mut Self::Context) {
        let id = msg.0;

        if let Some(pos) = self.queue.iter().position(|task| task.id == id) {
            debug!(task_id = id.as_str(); "cancelling queued task");
            self.queue.remove(pos);

            let cancelled = TrainResponse::cancelled();
            match Message::response(id.clone(), Action::TrainGradAlgorithm, &cancelled) {
                Ok(message) => self.publish(Task {
                    id,
                    status: TaskStatus::Complete,
                    message,
                }),
                Err(e) => warn!(task_id = id.as_str(); "cannot encode cancellation: {e}"),
            }
            return;
        }

        let running = self
            .units
            .iter()
            .filter_map(|unit| unit.running.as_ref())
            .find(|(running, _)| *running == id);

        match running {
            Some((_, token)) => {
                debug!(task_id = id.as_str(); "cancelling running task");
                token.cancel();
            }
            None => debug!(task_id = id.as_str(); "nothing to cancel"),
        }
    }
}

impl Handler<Terminate> for Scheduler {
    type Result = ();

    fn handle(&mut self, _msg: Terminate, ctx: &mut Self::Context) {
        info!(
            units = self.units.len(),
            queued = self.queue.len(),
            subscribers = self.subscribers.len();
            "terminating pool"
        );

        for unit in &self.units {
            if let Some((_, token)) = &unit.running {
                token.cancel();
            }
        }

        // dropping the senders completes every subscriber stream
        self.units.clear();
        self.queue.clear();
        self.subscribers.clear();
        ctx.stop();
    }
}

impl Handler<GetStatus> for Scheduler {
    type Result = MessageResult<GetStatus>;

    fn handle(&mut self, _msg: GetStatus, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(self.status())
    }
}

/* -------------------------------------------------------------------------- */
/*                            Public pool interface                           */
/* -------------------------------------------------------------------------- */

/// A fixed size pool of execution units fed from a FIFO queue.
///
/// Must be created inside a running actix system. Cloning the handle shares the pool.
#[derive(Clone)]
pub struct WorkerPool {
    scheduler: Addr<Scheduler>,
    size: usize,
}

impl WorkerPool {
    /// Starts `size` execution units, each on its own thread.
    ///
    /// # Returns
    /// The pool handle, or `PoolErr::InvalidPoolSize` if `size` is zero.
    pub fn new(size: usize) -> Result<Self, PoolErr> {
        if size == 0 {
            return Err(PoolErr::InvalidPoolSize(size));
        }

        Ok(Self {
            scheduler: Scheduler::start_with(size),
            size,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Queues `task`, it runs as soon as a unit is idle and every older task was dispatched.
    pub fn enqueue(&self, task: Task) {
        self.scheduler.do_send(Enqueue(task));
    }

    /// Returns a stream of every message emitted by the units from now on.
    ///
    /// The stream ends when the pool terminates. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> UnboundedReceiver<Task> {
        self.subscribe_with(None)
    }

    /// Like [`WorkerPool::subscribe`], keeping only the messages of the task `id`.
    ///
    /// The stream also ends right after the task completes.
    pub fn subscribe_to(&self, id: TaskId) -> UnboundedReceiver<Task> {
        self.subscribe_with(Some(id))
    }

    fn subscribe_with(&self, task: Option<TaskId>) -> UnboundedReceiver<Task> {
        let (sender, rx) = mpsc::unbounded_channel();
        self.scheduler.do_send(Subscribe(Subscriber { task, sender }));
        rx
    }

    /// Cancels a task.
    ///
    /// A queued task is dropped and completed as cancelled right away, a running one stops at
    /// its next epoch boundary.
    pub fn cancel(&self, id: TaskId) {
        self.scheduler.do_send(Cancel(id));
    }

    /// Stops every unit and drops the queue. Tasks that did not complete never will.
    pub fn terminate(&self) {
        self.scheduler.do_send(Terminate);
    }

    pub fn is_terminated(&self) -> bool {
        !self.scheduler.connected()
    }

    /// Returns a snapshot of the units and the queue.
    pub async fn status(&self) -> Result<PoolStatus, PoolErr> {
        self.scheduler
            .send(GetStatus)
            .await
            .map_err(|_| PoolErr::Terminated)
    }
}
