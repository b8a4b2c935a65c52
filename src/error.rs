use serde::{Deserialize, Serialize};

/// Errors raised by the worker runtime itself.
///
/// Variants fall in two groups:
///
/// **Local invariant violations** (returned to the caller, never swallowed):
/// - `DuplicateCorrelation` - a new request reused an id that is still in flight
/// - `CorrelationNotFound` - `reject`/`cancel` on an id with no live entry
/// - `AlreadySettled` / `ContinuationRegistered` - promise misuse
///
/// **Registry and host-facing errors** (turned into a `Failure` response by the router):
/// - `ProcessNotFound` / `DuplicateRun`
/// - `UnknownCommand` / `InvalidRequest`
///
/// An unsolicited response from the host is *not* an error: the client logs it and
/// queues an `UndefinedResponse` diagnostic instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkerError {
    #[error("unable to create a new request because a request with id {0} has already been sent")]
    DuplicateCorrelation(u64),
    #[error("unable to receive a request with id {0} because a request with that identifier was not sent")]
    CorrelationNotFound(u64),
    #[error("workflow process #{0} was not found")]
    ProcessNotFound(String),
    #[error("workflow process #{0} is already running")]
    DuplicateRun(String),
    #[error("promise has already been settled")]
    AlreadySettled,
    #[error("promise already has a continuation")]
    ContinuationRegistered,
    #[error("cancellation scope {0} does not exist")]
    ScopeNotFound(usize),
    #[error("unknown command {0:?}")]
    UnknownCommand(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("codec: {0}")]
    Codec(String),
    #[error("transport: {0}")]
    Transport(String),
}

impl WorkerError {
    /// True for errors that indicate a bug in the surrounding scheduler rather than
    /// a bad message from the host.
    pub fn is_local_invariant(&self) -> bool {
        matches!(
            self,
            WorkerError::DuplicateCorrelation(_)
                | WorkerError::CorrelationNotFound(_)
                | WorkerError::AlreadySettled
                | WorkerError::ContinuationRegistered
                | WorkerError::ScopeNotFound(_)
        )
    }
}

/// Classification of a failure carried back to a promise or to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Deliberately discarded by workflow-local logic.
    Canceled,
    /// Discarded because the worker destroyed the workflow instance (e.g. cache eviction).
    DestructMemorizedInstance,
    /// Business or host-facing error.
    Application,
    /// Worker-internal error.
    Internal,
}

/// Error value carried in failure responses and used to reject promises.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind:?}: {message}")]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
}

impl Failure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn canceled(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Canceled, message)
    }

    pub fn destructed() -> Self {
        Self::new(
            FailureKind::DestructMemorizedInstance,
            "workflow instance was destroyed by the worker",
        )
    }

    pub fn application(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Application, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Internal, message)
    }

    /// Both user-level cancellation and instance destruction count as cancellation.
    pub fn is_canceled(&self) -> bool {
        matches!(self.kind, FailureKind::Canceled | FailureKind::DestructMemorizedInstance)
    }
}

impl From<WorkerError> for Failure {
    fn from(err: WorkerError) -> Self {
        let kind = match &err {
            WorkerError::ProcessNotFound(_)
            | WorkerError::DuplicateRun(_)
            | WorkerError::UnknownCommand(_)
            | WorkerError::InvalidRequest(_) => FailureKind::Application,
            _ => FailureKind::Internal,
        };
        Failure::new(kind, err.to_string())
    }
}
