//! Commands exchanged between the worker and the orchestration host.
//!
//! - `Request`: worker → host, correlated by a numeric id
//! - `Response`: host → worker (or worker → host for server requests), same id
//! - `ServerRequest`: host → worker, routed by name
use crate::codec::{EncodedValues, Payload};
use crate::error::Failure;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cell::Cell;
use std::collections::BTreeMap;

/// Default counter base; the first id handed out is `DEFAULT_ID_BASE + 1`.
pub const DEFAULT_ID_BASE: u64 = 9000;

/// Name of the diagnostic request queued for responses nobody asked for.
pub const UNDEFINED_RESPONSE: &str = "UndefinedResponse";

/// Context headers keyed by name.
pub type Header = BTreeMap<String, Payload>;

/// Monotonic correlation id counter.
///
/// Ids increase by one from the base. When the counter reaches `u64::MAX` it
/// restarts at `1`; `0` is never produced. The allocator does not know which
/// ids are still outstanding, so a wrapped id can in principle collide with a
/// very old in-flight request. `Client::request` rejects such a collision with
/// `DuplicateCorrelation`.
#[derive(Debug)]
pub struct IdAllocator {
    last: Cell<u64>,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::with_base(DEFAULT_ID_BASE)
    }

    pub fn with_base(base: u64) -> Self {
        Self { last: Cell::new(base) }
    }

    pub fn next_id(&self) -> u64 {
        let next = match self.last.get().wrapping_add(1) {
            0 | u64::MAX => 1,
            n => n,
        };
        self.last.set(next);
        next
    }

    /// The most recently issued id (the base if none was issued yet).
    pub fn last(&self) -> u64 {
        self.last.get()
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Outbound request to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    id: u64,
    name: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    options: Map<String, Value>,
    #[serde(default)]
    payloads: EncodedValues,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    header: Option<Header>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    failure: Option<Failure>,
}

impl Request {
    /// Build a request; the id is taken from `ids` exactly once.
    pub fn new(ids: &IdAllocator, name: impl Into<String>) -> Self {
        Self {
            id: ids.next_id(),
            name: name.into(),
            options: Map::new(),
            payloads: EncodedValues::empty(),
            header: None,
            failure: None,
        }
    }

    /// Diagnostic request reporting a response to an unknown id.
    pub fn undefined_response(ids: &IdAllocator, message: impl Into<String>) -> Self {
        Self::new(ids, UNDEFINED_RESPONSE).with_option("message", Value::String(message.into()))
    }

    pub fn with_option(mut self, key: impl Into<String>, value: Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }

    pub fn with_options(mut self, options: Map<String, Value>) -> Self {
        self.options = options;
        self
    }

    pub fn with_payloads(mut self, payloads: EncodedValues) -> Self {
        self.payloads = payloads;
        self
    }

    pub fn with_header(mut self, header: Header) -> Self {
        self.header = Some(header);
        self
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &Map<String, Value> {
        &self.options
    }

    pub fn payloads(&self) -> &EncodedValues {
        &self.payloads
    }

    pub fn header(&self) -> Option<&Header> {
        self.header.as_ref()
    }

    pub fn failure(&self) -> Option<&Failure> {
        self.failure.as_ref()
    }

    pub fn set_failure(&mut self, failure: Option<Failure>) {
        self.failure = failure;
    }
}

/// Result carried by a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success(EncodedValues),
    Failure(Failure),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub id: u64,
    /// Host-side history length at the time of the response.
    #[serde(default)]
    pub history_length: u64,
    pub outcome: Outcome,
}

impl Response {
    pub fn success(id: u64, payloads: EncodedValues) -> Self {
        Self {
            id,
            history_length: 0,
            outcome: Outcome::Success(payloads),
        }
    }

    pub fn failure(id: u64, failure: Failure) -> Self {
        Self {
            id,
            history_length: 0,
            outcome: Outcome::Failure(failure),
        }
    }

    pub fn with_history_length(mut self, history_length: u64) -> Self {
        self.history_length = history_length;
        self
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, Outcome::Failure(_))
    }
}

/// Host-initiated request, routed by `name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerRequest {
    pub id: u64,
    pub name: String,
    /// Target execution for lifecycle commands.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub options: Map<String, Value>,
    #[serde(default)]
    pub payloads: EncodedValues,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<Header>,
}

impl ServerRequest {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            run_id: None,
            options: Map::new(),
            payloads: EncodedValues::empty(),
            header: None,
        }
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }

    pub fn with_payloads(mut self, payloads: EncodedValues) -> Self {
        self.payloads = payloads;
        self
    }

    pub fn with_header(mut self, header: Header) -> Self {
        self.header = Some(header);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    Request(Request),
    Response(Response),
    ServerRequest(ServerRequest),
}

impl Command {
    pub fn id(&self) -> u64 {
        match self {
            Command::Request(r) => r.id(),
            Command::Response(r) => r.id,
            Command::ServerRequest(r) => r.id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Command::Request(_) => "Request",
            Command::Response(_) => "Response",
            Command::ServerRequest(_) => "ServerRequest",
        }
    }
}

impl From<Request> for Command {
    fn from(r: Request) -> Self {
        Command::Request(r)
    }
}

impl From<Response> for Command {
    fn from(r: Response) -> Self {
        Command::Response(r)
    }
}

impl From<ServerRequest> for Command {
    fn from(r: ServerRequest) -> Self {
        Command::ServerRequest(r)
    }
}
