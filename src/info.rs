use std::cell::Cell;

/// Identity of a running workflow execution plus its history-length watermark.
///
/// Shared (via `Rc`) between a `Process` and the correlation-table entries it
/// issued, so responses can raise the watermark as they arrive.
#[derive(Debug)]
pub struct WorkflowInfo {
    pub workflow_type: String,
    pub workflow_id: String,
    pub run_id: String,
    pub task_queue: String,
    history_length: Cell<u64>,
}

impl WorkflowInfo {
    pub fn new(workflow_type: impl Into<String>, workflow_id: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            workflow_type: workflow_type.into(),
            workflow_id: workflow_id.into(),
            run_id: run_id.into(),
            task_queue: crate::config::DEFAULT_TASK_QUEUE.to_string(),
            history_length: Cell::new(0),
        }
    }

    pub fn with_task_queue(mut self, task_queue: impl Into<String>) -> Self {
        self.task_queue = task_queue.into();
        self
    }

    pub fn with_history_length(self, history_length: u64) -> Self {
        self.history_length.set(history_length);
        self
    }

    pub fn history_length(&self) -> u64 {
        self.history_length.get()
    }

    /// Raise the watermark to `observed` if it is larger. Returns whether it moved.
    pub fn observe_history_length(&self, observed: u64) -> bool {
        if observed > self.history_length.get() {
            self.history_length.set(observed);
            true
        } else {
            false
        }
    }
}

/// New run identifier (UUIDv4, hyphenated).
pub fn new_run_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
