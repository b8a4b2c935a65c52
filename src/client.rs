use crate::codec::EncodedValues;
use crate::command::{Command, IdAllocator, Outcome, Request, Response};
use crate::error::{Failure, WorkerError};
use crate::info::WorkflowInfo;
use crate::promise::{Deferred, Promise};
use crate::queue::SharedQueue;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use tracing::{debug, warn};

struct PendingRequest {
    deferred: Deferred,
    info: Option<Rc<WorkflowInfo>>,
}

/// Correlates outbound requests with the responses the host sends back.
///
/// The client is the only owner of the correlation table. An entry lives from
/// `request` until exactly one of `dispatch`, `cancel` or `reject` consumes it.
/// Every path removes the entry (and drops every table borrow) *before*
/// settling the promise, so a continuation may call straight back into the
/// client.
///
/// Unknown ids are treated asymmetrically:
/// - `dispatch` tolerates them (the host may retransmit or answer late) and
///   queues an `UndefinedResponse` diagnostic instead of failing;
/// - `reject`/`cancel` fail with `CorrelationNotFound` because they come from
///   local code and indicate a bookkeeping bug.
pub struct Client {
    queue: SharedQueue,
    ids: IdAllocator,
    requests: RefCell<HashMap<u64, PendingRequest>>,
}

impl Client {
    pub fn new(queue: SharedQueue) -> Self {
        Self::with_allocator(queue, IdAllocator::new())
    }

    pub fn with_allocator(queue: SharedQueue, ids: IdAllocator) -> Self {
        Self {
            queue,
            ids,
            requests: RefCell::new(HashMap::new()),
        }
    }

    pub fn ids(&self) -> &IdAllocator {
        &self.ids
    }

    /// New request with an id from this client's allocator.
    pub fn new_request(&self, name: impl Into<String>) -> Request {
        Request::new(&self.ids, name)
    }

    /// Queue `request` and register a promise for its response.
    pub fn request(&self, request: Request, info: Option<Rc<WorkflowInfo>>) -> Result<Promise, WorkerError> {
        let id = request.id();
        if self.requests.borrow().contains_key(&id) {
            return Err(WorkerError::DuplicateCorrelation(id));
        }

        debug!(id, name = %request.name(), "queueing request");
        self.queue.borrow_mut().push(Command::Request(request));

        let deferred = Deferred::new();
        let promise = deferred.promise();
        self.requests.borrow_mut().insert(id, PendingRequest { deferred, info });
        Ok(promise)
    }

    /// Settle the promise registered for `response.id`.
    pub fn dispatch(&self, response: Response) {
        let id = response.id;
        let pending = self.requests.borrow_mut().remove(&id);
        let Some(PendingRequest { deferred, info }) = pending else {
            warn!(id, "got the response to undefined request");
            let diagnostic = Request::undefined_response(&self.ids, format!("Got the response to undefined request {id}"));
            self.queue.borrow_mut().push(Command::Request(diagnostic));
            return;
        };

        if let Some(info) = info {
            if info.observe_history_length(response.history_length) {
                debug!(id, run_id = %info.run_id, history_length = response.history_length, "history length advanced");
            }
        }

        let settled = match response.outcome {
            Outcome::Failure(failure) => {
                debug!(id, failure = %failure, "request failed");
                deferred.reject(failure)
            }
            Outcome::Success(payloads) => {
                debug!(id, values = payloads.len(), "request resolved");
                deferred.resolve(payloads)
            }
        };
        if let Err(e) = settled {
            warn!(id, error = %e, "response for an already settled request");
        }
    }

    /// True while the request has not been handed to the transport yet.
    pub fn is_queued(&self, id: u64) -> bool {
        self.queue.borrow().has(id)
    }

    /// True while the request still waits for its response.
    pub fn is_pending(&self, id: u64) -> bool {
        self.requests.borrow().contains_key(&id)
    }

    /// Number of in-flight requests.
    pub fn pending_count(&self) -> usize {
        self.requests.borrow().len()
    }

    /// Drop the request from the queue (if unsent) and reject it as canceled.
    pub fn cancel(&self, id: u64) -> Result<(), WorkerError> {
        self.cancel_with(id, Failure::canceled("internal cancel"))
    }

    /// Like `cancel`, with a caller-chosen failure.
    pub fn cancel_with(&self, id: u64, failure: Failure) -> Result<(), WorkerError> {
        let pulled = self.queue.borrow_mut().pull(id);
        if pulled.is_some() {
            debug!(id, "request pulled before send");
        }
        self.reject(id, failure)
    }

    pub fn reject(&self, id: u64, failure: Failure) -> Result<(), WorkerError> {
        let pending = self.requests.borrow_mut().remove(&id);
        let pending = pending.ok_or(WorkerError::CorrelationNotFound(id))?;
        debug!(id, failure = %failure, "rejecting request");
        pending.deferred.reject(failure)
    }

    /// Resolve a pending request locally, as if the host had answered.
    pub fn resolve(&self, id: u64, values: EncodedValues) -> Result<(), WorkerError> {
        let pending = self.requests.borrow_mut().remove(&id);
        let pending = pending.ok_or(WorkerError::CorrelationNotFound(id))?;
        pending.deferred.resolve(values)
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("last_id", &self.ids.last())
            .field("pending", &self.pending_count())
            .field("queued", &self.queue.borrow().len())
            .finish()
    }
}
