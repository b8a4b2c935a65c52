use super::{target_run_id, RequestKind, Route};
use crate::codec::EncodedValues;
use crate::command::{Header, ServerRequest};
use crate::error::WorkerError;
use crate::process::CancelReason;
use crate::promise::Deferred;
use crate::running::SharedRunning;
use tracing::info;

/// Evicts a workflow run from the worker.
///
/// The process leaves the registry first, then its outstanding requests are
/// settled with a `DestructMemorizedInstance` failure, the host is answered
/// with `null` and finally the scope graph is released.
pub struct DestroyWorkflow {
    running: SharedRunning,
}

impl DestroyWorkflow {
    pub fn new(running: SharedRunning) -> Self {
        Self { running }
    }
}

impl Route for DestroyWorkflow {
    fn kind(&self) -> RequestKind {
        RequestKind::DestroyWorkflow
    }

    fn handle(&self, request: ServerRequest, _headers: Header, resolver: Deferred) -> Result<(), WorkerError> {
        let run_id = target_run_id(&request)?;
        let process = self.running.borrow_mut().remove(run_id)?;

        let settled = process.cancel(CancelReason::DestructMemorizedInstance)?;
        resolver.resolve(EncodedValues::null())?;
        process.teardown();
        info!(run_id = %run_id, settled, "workflow destroyed");
        Ok(())
    }
}
