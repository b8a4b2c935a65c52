//! Workflow execution context.
//!
//! A `Process` issues requests on behalf of one workflow run and can cancel
//! them cooperatively. Requests are grouped into cancellation scopes kept in a
//! `ScopeArena`: scopes live in a `Vec` and refer to each other by index, so
//! the whole graph is released by clearing the vector.
use crate::client::Client;
use crate::command::Request;
use crate::error::{Failure, WorkerError};
use crate::info::WorkflowInfo;
use crate::promise::{Deferred, Promise};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

impl ScopeId {
    pub const ROOT: ScopeId = ScopeId(0);

    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Default)]
struct Scope {
    children: Vec<ScopeId>,
    requests: Vec<u64>,
    cancelled: Option<CancelReason>,
}

#[derive(Debug)]
pub struct ScopeArena {
    scopes: Vec<Scope>,
}

impl ScopeArena {
    /// Arena holding only the root scope.
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::default()],
        }
    }

    fn get(&self, id: ScopeId) -> Result<&Scope, WorkerError> {
        self.scopes.get(id.0).ok_or(WorkerError::ScopeNotFound(id.0))
    }

    fn get_mut(&mut self, id: ScopeId) -> Result<&mut Scope, WorkerError> {
        self.scopes.get_mut(id.0).ok_or(WorkerError::ScopeNotFound(id.0))
    }

    /// Child scope of `parent`. A child of a cancelled scope starts cancelled
    /// with the parent's reason.
    pub fn open(&mut self, parent: ScopeId) -> Result<ScopeId, WorkerError> {
        let cancelled = self.get(parent)?.cancelled.clone();
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope {
            cancelled,
            ..Scope::default()
        });
        self.get_mut(parent)?.children.push(id);
        Ok(id)
    }

    pub fn track(&mut self, scope: ScopeId, request_id: u64) -> Result<(), WorkerError> {
        self.get_mut(scope)?.requests.push(request_id);
        Ok(())
    }

    pub fn is_cancelled(&self, scope: ScopeId) -> Result<bool, WorkerError> {
        Ok(self.get(scope)?.cancelled.is_some())
    }

    pub fn cancel_reason(&self, scope: ScopeId) -> Result<Option<CancelReason>, WorkerError> {
        Ok(self.get(scope)?.cancelled.clone())
    }

    /// Mark `scope` and every descendant cancelled and take their tracked ids.
    /// A scope that is already cancelled keeps its first reason.
    pub fn cancel(&mut self, scope: ScopeId, reason: &CancelReason) -> Result<Vec<u64>, WorkerError> {
        self.get(scope)?;
        let mut ids = Vec::new();
        let mut stack = vec![scope];
        while let Some(next) = stack.pop() {
            let node = self.get_mut(next)?;
            node.cancelled.get_or_insert_with(|| reason.clone());
            ids.append(&mut node.requests);
            stack.extend(node.children.iter().copied());
        }
        Ok(ids)
    }

    /// Drop tracked ids for which `pending` returns false.
    pub fn prune(&mut self, pending: impl Fn(u64) -> bool) {
        for scope in &mut self.scopes {
            scope.requests.retain(|id| pending(*id));
        }
    }

    pub fn tracked(&self) -> usize {
        self.scopes.iter().map(|s| s.requests.len()).sum()
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    pub fn clear(&mut self) {
        self.scopes.clear();
    }
}

impl Default for ScopeArena {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelReason {
    /// Cancelled by workflow logic or by the host.
    Workflow(String),
    /// The worker is evicting the instance.
    DestructMemorizedInstance,
}

impl CancelReason {
    pub fn to_failure(&self) -> Failure {
        match self {
            CancelReason::Workflow(message) => Failure::canceled(message.clone()),
            CancelReason::DestructMemorizedInstance => Failure::destructed(),
        }
    }
}

/// Execution context of one workflow run.
pub struct Process {
    info: Rc<WorkflowInfo>,
    client: Rc<Client>,
    scopes: RefCell<ScopeArena>,
    cancel_reason: RefCell<Option<CancelReason>>,
}

impl Process {
    pub fn new(info: WorkflowInfo, client: Rc<Client>) -> Self {
        Self {
            info: Rc::new(info),
            client,
            scopes: RefCell::new(ScopeArena::new()),
            cancel_reason: RefCell::new(None),
        }
    }

    pub fn info(&self) -> &Rc<WorkflowInfo> {
        &self.info
    }

    pub fn run_id(&self) -> &str {
        &self.info.run_id
    }

    pub fn client(&self) -> &Rc<Client> {
        &self.client
    }

    pub fn history_length(&self) -> u64 {
        self.info.history_length()
    }

    pub fn new_request(&self, name: impl Into<String>) -> Request {
        self.client.new_request(name)
    }

    pub fn open_scope(&self, parent: ScopeId) -> Result<ScopeId, WorkerError> {
        self.scopes.borrow_mut().open(parent)
    }

    /// Submit `request` within `scope`.
    ///
    /// In a cancelled scope nothing is queued; the returned promise is already
    /// rejected with the cancellation failure.
    pub fn request(&self, scope: ScopeId, request: Request) -> Result<Promise, WorkerError> {
        let cancelled = self.scopes.borrow().cancel_reason(scope)?;
        if let Some(reason) = cancelled {
            debug!(run_id = %self.run_id(), id = request.id(), name = %request.name(), "request in cancelled scope");
            let deferred = Deferred::new();
            deferred.reject(reason.to_failure())?;
            return Ok(deferred.promise());
        }

        let id = request.id();
        let promise = self.client.request(request, Some(self.info.clone()))?;
        let client = &self.client;
        let mut scopes = self.scopes.borrow_mut();
        scopes.prune(|tracked| client.is_pending(tracked));
        scopes.track(scope, id)?;
        Ok(promise)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_reason.borrow().is_some()
    }

    pub fn cancel_reason(&self) -> Option<CancelReason> {
        self.cancel_reason.borrow().clone()
    }

    /// Cancel `scope` and its descendants. Returns the number of requests settled.
    ///
    /// Unsent requests are pulled from the outbound queue; sent ones are rejected
    /// locally and their late responses end up as `UndefinedResponse` diagnostics.
    pub fn cancel_scope(&self, scope: ScopeId, reason: &CancelReason) -> Result<usize, WorkerError> {
        let ids = self.scopes.borrow_mut().cancel(scope, reason)?;
        let failure = reason.to_failure();
        let mut settled = 0;
        for id in ids {
            if !self.client.is_pending(id) {
                continue;
            }
            let result = if self.client.is_queued(id) {
                self.client.cancel_with(id, failure.clone())
            } else {
                self.client.reject(id, failure.clone())
            };
            match result {
                Ok(()) => settled += 1,
                Err(e) => debug!(run_id = %self.run_id(), id, error = %e, "request already settled during cancel"),
            }
        }
        Ok(settled)
    }

    /// Cancel the whole process.
    ///
    /// The first reason is kept; a later call still sweeps the root scope so
    /// requests issued in the meantime are settled too.
    pub fn cancel(&self, reason: CancelReason) -> Result<usize, WorkerError> {
        {
            let mut current = self.cancel_reason.borrow_mut();
            if current.is_none() {
                info!(run_id = %self.run_id(), reason = ?reason, "cancelling process");
                *current = Some(reason.clone());
            }
        }
        self.cancel_scope(ScopeId::ROOT, &reason)
    }

    /// Release the scope graph. The process cannot issue requests afterwards.
    pub fn teardown(&self) {
        self.scopes.borrow_mut().clear();
        debug!(run_id = %self.run_id(), "process torn down");
    }

    pub fn is_torn_down(&self) -> bool {
        self.scopes.borrow().is_empty()
    }
}

impl fmt::Debug for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Process")
            .field("run_id", &self.info.run_id)
            .field("workflow_type", &self.info.workflow_type)
            .field("cancel_reason", &*self.cancel_reason.borrow())
            .field("scopes", &self.scopes.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::EncodedValues;
    use crate::command::Response;
    use crate::error::FailureKind;
    use crate::queue::ArrayQueue;

    fn process() -> Process {
        let client = Rc::new(Client::new(ArrayQueue::shared()));
        Process::new(WorkflowInfo::new("Greeter", "wf-1", "R1"), client)
    }

    #[test]
    fn test_arena_cancel_cascades() {
        let mut arena = ScopeArena::new();
        let a = arena.open(ScopeId::ROOT).unwrap();
        let b = arena.open(a).unwrap();
        let c = arena.open(ScopeId::ROOT).unwrap();
        arena.track(b, 1).unwrap();
        arena.track(c, 2).unwrap();

        let stop = CancelReason::Workflow("stop".into());
        assert_eq!(arena.cancel(a, &stop).unwrap(), vec![1]);
        assert!(arena.is_cancelled(b).unwrap());
        assert!(!arena.is_cancelled(c).unwrap());
        let d = arena.open(b).unwrap();
        assert_eq!(arena.cancel_reason(d).unwrap(), Some(stop.clone()));

        arena.cancel(ScopeId::ROOT, &CancelReason::DestructMemorizedInstance).unwrap();
        assert_eq!(arena.cancel_reason(b).unwrap(), Some(stop));
        assert_eq!(arena.cancel_reason(c).unwrap(), Some(CancelReason::DestructMemorizedInstance));
        assert_eq!(arena.tracked(), 1);

        arena.clear();
        assert_eq!(arena.open(ScopeId::ROOT), Err(WorkerError::ScopeNotFound(0)));
    }

    #[test]
    fn test_cancel_scope_only_touches_its_requests() {
        let p = process();
        let child = p.open_scope(ScopeId::ROOT).unwrap();
        let outer = p.request(ScopeId::ROOT, p.new_request("NewTimer")).unwrap();
        let inner = p.request(child, p.new_request("ExecuteActivity")).unwrap();

        let settled = p.cancel_scope(child, &CancelReason::Workflow("stop".into())).unwrap();
        assert_eq!(settled, 1);
        assert!(outer.is_pending());
        let failure = inner.result().unwrap().unwrap_err();
        assert_eq!(failure.kind, FailureKind::Canceled);
        assert_eq!(failure.message, "stop");
        assert!(!p.is_cancelled());
    }

    #[test]
    fn test_request_in_cancelled_scope_is_not_queued() {
        let p = process();
        p.cancel(CancelReason::DestructMemorizedInstance).unwrap();
        let req = p.new_request("NewTimer");
        let id = req.id();
        let promise = p.request(ScopeId::ROOT, req).unwrap();
        assert!(!p.client().is_queued(id));
        assert!(!p.client().is_pending(id));
        assert_eq!(promise.result().unwrap().unwrap_err().kind, FailureKind::DestructMemorizedInstance);
    }

    #[test]
    fn test_request_in_cancelled_scope_gets_scope_reason() {
        let p = process();
        let stopped = p.open_scope(ScopeId::ROOT).unwrap();
        let evicted = p.open_scope(ScopeId::ROOT).unwrap();
        p.cancel_scope(stopped, &CancelReason::Workflow("stop".into())).unwrap();
        p.cancel_scope(evicted, &CancelReason::DestructMemorizedInstance).unwrap();
        let nested = p.open_scope(evicted).unwrap();

        let late = p.request(stopped, p.new_request("NewTimer")).unwrap();
        let failure = late.result().unwrap().unwrap_err();
        assert_eq!(failure.kind, FailureKind::Canceled);
        assert_eq!(failure.message, "stop");

        let late = p.request(nested, p.new_request("NewTimer")).unwrap();
        assert_eq!(late.result().unwrap().unwrap_err().kind, FailureKind::DestructMemorizedInstance);
        assert!(!p.is_cancelled());
        assert_eq!(p.client().pending_count(), 0);
    }

    #[test]
    fn test_cancel_keeps_first_reason_and_skips_settled() {
        let p = process();
        let req = p.new_request("NewTimer");
        let id = req.id();
        let done = p.request(ScopeId::ROOT, req).unwrap();
        p.client().dispatch(Response::success(id, EncodedValues::null()));
        assert!(done.result().unwrap().is_ok());

        assert_eq!(p.cancel(CancelReason::Workflow("first".into())).unwrap(), 0);
        assert_eq!(p.cancel(CancelReason::DestructMemorizedInstance).unwrap(), 0);
        assert_eq!(p.cancel_reason(), Some(CancelReason::Workflow("first".into())));
    }

    #[test]
    fn test_teardown_releases_scopes() {
        let p = process();
        p.open_scope(ScopeId::ROOT).unwrap();
        p.teardown();
        assert!(p.is_torn_down());
        let req = p.new_request("NewTimer");
        assert_eq!(p.request(ScopeId::ROOT, req).unwrap_err(), WorkerError::ScopeNotFound(0));
    }
}
