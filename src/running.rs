use crate::error::WorkerError;
use crate::process::Process;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::debug;

/// Registry handle shared by the worker and the lifecycle routes.
pub type SharedRunning = Rc<RefCell<RunningWorkflows>>;

/// Live workflow processes keyed by run id.
///
/// The registry owns the processes it holds. `remove` hands that ownership to
/// the caller; nothing else gets mutable access.
#[derive(Debug, Default)]
pub struct RunningWorkflows {
    processes: HashMap<String, Rc<Process>>,
}

impl RunningWorkflows {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedRunning {
        Rc::new(RefCell::new(Self::new()))
    }

    pub fn find(&self, run_id: &str) -> Option<Rc<Process>> {
        self.processes.get(run_id).cloned()
    }

    pub fn insert(&mut self, process: Rc<Process>) -> Result<(), WorkerError> {
        let run_id = process.run_id().to_string();
        if self.processes.contains_key(&run_id) {
            return Err(WorkerError::DuplicateRun(run_id));
        }
        debug!(run_id = %run_id, "process registered");
        self.processes.insert(run_id, process);
        Ok(())
    }

    pub fn remove(&mut self, run_id: &str) -> Result<Rc<Process>, WorkerError> {
        let process = self
            .processes
            .remove(run_id)
            .ok_or_else(|| WorkerError::ProcessNotFound(run_id.to_string()))?;
        debug!(run_id = %run_id, "process unregistered");
        Ok(process)
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    /// Registered run ids, sorted.
    pub fn run_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.processes.keys().cloned().collect();
        ids.sort();
        ids
    }
}
