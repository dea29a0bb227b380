use std::{error::Error, fmt, io};

use super::communication::TaskId;
use crate::NnErr;

/// Failures of the worker pool itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolErr {
    InvalidPoolSize(usize),
    Terminated,
}

impl fmt::Display for PoolErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolErr::InvalidPoolSize(size) => {
                write!(f, "a pool needs at least one execution unit, got {size}")
            }
            PoolErr::Terminated => write!(f, "all execution units terminated"),
        }
    }
}

impl Error for PoolErr {}

/// Failures surfaced to the callers of the training adapter.
#[derive(Debug)]
pub enum AdapterErr {
    /// The pool was torn down before the task completed.
    Terminated,
    TaskFailed { id: TaskId, reason: String },
    Cancelled { id: TaskId },
    Protocol(String),
    Pool(PoolErr),
    Nn(NnErr),
    Io(io::Error),
}

impl fmt::Display for AdapterErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdapterErr::Terminated => write!(f, "threads terminated"),
            AdapterErr::TaskFailed { id, reason } => write!(f, "task {id} failed: {reason}"),
            AdapterErr::Cancelled { id } => write!(f, "task {id} was cancelled"),
            AdapterErr::Protocol(msg) => write!(f, "protocol error: {msg}"),
            AdapterErr::Pool(e) => write!(f, "{e}"),
            AdapterErr::Nn(e) => write!(f, "{e}"),
            AdapterErr::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl Error for AdapterErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AdapterErr::Pool(e) => Some(e),
            AdapterErr::Nn(e) => Some(e),
            AdapterErr::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<NnErr> for AdapterErr {
    fn from(value: NnErr) -> Self {
        Self::Nn(value)
    }
}

impl From<io::Error> for AdapterErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for AdapterErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Protocol(value.to_string())
    }
}

impl From<PoolErr> for AdapterErr {
    fn from(value: PoolErr) -> Self {
        match value {
            PoolErr::Terminated => Self::Terminated,
            other => Self::Pool(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, AdapterErr>;
