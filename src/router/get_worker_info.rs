use super::{RequestKind, Route};
use crate::codec::EncodedValues;
use crate::command::{Header, ServerRequest};
use crate::error::WorkerError;
use crate::promise::Deferred;
use crate::running::SharedRunning;
use serde::{Deserialize, Serialize};

pub const SDK_NAME: &str = env!("CARGO_PKG_NAME");
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerInfo {
    pub task_queue: String,
    /// Number of registered processes.
    pub running: usize,
    pub sdk_name: String,
    pub sdk_version: String,
}

pub struct GetWorkerInfo {
    task_queue: String,
    running: SharedRunning,
}

impl GetWorkerInfo {
    pub fn new(task_queue: impl Into<String>, running: SharedRunning) -> Self {
        Self {
            task_queue: task_queue.into(),
            running,
        }
    }

    pub fn snapshot(&self) -> WorkerInfo {
        WorkerInfo {
            task_queue: self.task_queue.clone(),
            running: self.running.borrow().len(),
            sdk_name: SDK_NAME.to_string(),
            sdk_version: SDK_VERSION.to_string(),
        }
    }
}

impl Route for GetWorkerInfo {
    fn kind(&self) -> RequestKind {
        RequestKind::GetWorkerInfo
    }

    fn handle(&self, _request: ServerRequest, _headers: Header, resolver: Deferred) -> Result<(), WorkerError> {
        resolver.resolve(EncodedValues::from_value(&self.snapshot())?)
    }
}
