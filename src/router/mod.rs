//! Host-initiated request routing.
//!
//! The host addresses the worker by command name. The name is parsed into a
//! `RequestKind` and handed to the `Route` registered for that kind together
//! with a `Deferred` the route settles. Whatever happens inside the route, the
//! caller gets a promise back: unknown names and handler errors become
//! rejections, never errors of `dispatch` itself.
use crate::command::{Header, ServerRequest};
use crate::error::{Failure, WorkerError};
use crate::promise::{Deferred, Promise};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

mod cancel_workflow;
mod destroy_workflow;
mod get_worker_info;

pub use cancel_workflow::CancelWorkflow;
pub use destroy_workflow::DestroyWorkflow;
pub use get_worker_info::{GetWorkerInfo, WorkerInfo};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    StartWorkflow,
    InvokeSignal,
    InvokeQuery,
    CancelWorkflow,
    DestroyWorkflow,
    GetWorkerInfo,
    StackTrace,
}

impl RequestKind {
    pub const ALL: [RequestKind; 7] = [
        RequestKind::StartWorkflow,
        RequestKind::InvokeSignal,
        RequestKind::InvokeQuery,
        RequestKind::CancelWorkflow,
        RequestKind::DestroyWorkflow,
        RequestKind::GetWorkerInfo,
        RequestKind::StackTrace,
    ];

    /// Wire name of the command.
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::StartWorkflow => "StartWorkflow",
            RequestKind::InvokeSignal => "InvokeSignal",
            RequestKind::InvokeQuery => "InvokeQuery",
            RequestKind::CancelWorkflow => "CancelWorkflow",
            RequestKind::DestroyWorkflow => "DestroyWorkflow",
            RequestKind::GetWorkerInfo => "GetWorkerInfo",
            RequestKind::StackTrace => "StackTrace",
        }
    }
}

impl FromStr for RequestKind {
    type Err = WorkerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RequestKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| WorkerError::UnknownCommand(s.to_string()))
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handler for one kind of host request.
///
/// `handle` settles `resolver` on success. Returning `Err` without settling
/// makes the router reject the request with the error as failure.
pub trait Route {
    fn kind(&self) -> RequestKind;

    fn handle(&self, request: ServerRequest, headers: Header, resolver: Deferred) -> Result<(), WorkerError>;
}

#[derive(Default)]
pub struct Router {
    routes: HashMap<RequestKind, Box<dyn Route>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `route` for its kind, replacing any earlier one.
    pub fn add<R: Route + 'static>(&mut self, route: R) {
        let kind = route.kind();
        if self.routes.insert(kind, Box::new(route)).is_some() {
            warn!(kind = %kind, "router: replacing registered route");
        }
    }

    pub fn with_route<R: Route + 'static>(mut self, route: R) -> Self {
        self.add(route);
        self
    }

    pub fn has(&self, kind: RequestKind) -> bool {
        self.routes.contains_key(&kind)
    }

    pub fn dispatch(&self, request: ServerRequest, headers: Header) -> Promise {
        let resolver = Deferred::new();
        let promise = resolver.promise();
        let (id, name) = (request.id, request.name.clone());

        let route = name
            .parse::<RequestKind>()
            .ok()
            .and_then(|kind| self.routes.get(&kind));
        let Some(route) = route else {
            warn!(id, name = %name, "router: unknown command");
            let _ = resolver.reject(Failure::application(format!("Unknown command {name:?}")));
            return promise;
        };

        debug!(id, kind = %route.kind(), "router: dispatching");
        if let Err(e) = route.handle(request, headers, resolver.clone()) {
            warn!(id, name = %name, error = %e, "router: route failed");
            if !resolver.is_settled() {
                let _ = resolver.reject(Failure::from(e));
            }
        }
        promise
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<&'static str> = self.routes.keys().map(RequestKind::as_str).collect();
        kinds.sort_unstable();
        f.debug_struct("Router").field("routes", &kinds).finish()
    }
}

/// Target run id of a lifecycle request.
pub(crate) fn target_run_id(request: &ServerRequest) -> Result<&str, WorkerError> {
    request
        .run_id
        .as_deref()
        .or_else(|| request.options.get("run_id").and_then(|v| v.as_str()))
        .ok_or_else(|| WorkerError::InvalidRequest(format!("{} requires a run id", request.name)))
}
