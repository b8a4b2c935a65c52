use super::{target_run_id, RequestKind, Route};
use crate::codec::EncodedValues;
use crate::command::{Header, ServerRequest};
use crate::error::WorkerError;
use crate::process::CancelReason;
use crate::promise::Deferred;
use crate::running::SharedRunning;
use tracing::info;

const DEFAULT_REASON: &str = "workflow cancelled by host";

/// Cancels a run in place. The process stays registered until the host
/// follows up with `DestroyWorkflow`.
pub struct CancelWorkflow {
    running: SharedRunning,
}

impl CancelWorkflow {
    pub fn new(running: SharedRunning) -> Self {
        Self { running }
    }
}

impl Route for CancelWorkflow {
    fn kind(&self) -> RequestKind {
        RequestKind::CancelWorkflow
    }

    fn handle(&self, request: ServerRequest, _headers: Header, resolver: Deferred) -> Result<(), WorkerError> {
        let run_id = target_run_id(&request)?;
        let process = self
            .running
            .borrow()
            .find(run_id)
            .ok_or_else(|| WorkerError::ProcessNotFound(run_id.to_string()))?;

        let reason = request
            .options
            .get("reason")
            .and_then(|v| v.as_str())
            .unwrap_or(DEFAULT_REASON)
            .to_string();
        let settled = process.cancel(CancelReason::Workflow(reason))?;
        info!(run_id = %run_id, settled, "workflow cancelled");
        resolver.resolve(EncodedValues::null())
    }
}
