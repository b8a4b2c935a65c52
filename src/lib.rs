//! # durable-worker
//!
//! Worker-side command transport for durable workflows.
//!
//! Workflow code running inside the worker never talks to the orchestration
//! host directly. Each call that needs the host (a timer, an activity, a
//! signal) becomes a [`Request`] on an outbound queue, and the host answers
//! with a [`Response`] carrying the same numeric id. The host can also address
//! the worker with a [`ServerRequest`] (destroy a run, cancel a run, describe
//! the worker).
//!
//! ## Pieces
//!
//! - [`Client`]: the correlation table. `request` queues a command and hands
//!   back a [`Promise`]; `dispatch` settles it when the response arrives.
//! - [`Router`]: maps host command names to [`Route`] handlers.
//! - [`RunningWorkflows`]: run id to [`Process`] registry.
//! - [`Process`]: one workflow run, with cancellation scopes.
//! - [`Worker`]: wires the above together and serves a [`Transport`].
//!
//! ## Example
//!
//! ```rust
//! use durable_worker::{Command, EncodedValues, Response, ScopeId, Worker, WorkerOptions, WorkflowInfo};
//!
//! let worker = Worker::new(WorkerOptions::default());
//! let process = worker
//!     .register_process(WorkflowInfo::new("Greeter", "greeter-1", "run-1"))
//!     .unwrap();
//!
//! let timer = process.new_request("NewTimer");
//! let id = timer.id();
//! let promise = process.request(ScopeId::ROOT, timer).unwrap();
//!
//! // The transport would send these to the host.
//! let outbound: Vec<Command> = worker.flush();
//! assert_eq!(outbound.len(), 1);
//!
//! worker.dispatch(Response::success(id, EncodedValues::null()).with_history_length(4).into());
//! assert!(promise.result().unwrap().is_ok());
//! assert_eq!(process.history_length(), 4);
//! ```
//!
//! ## Threading
//!
//! The runtime is single-threaded: its types use `Rc`, `RefCell` and `Cell`
//! and are not `Send`. Run [`Worker::run`] on a current-thread tokio runtime
//! or inside a `tokio::task::LocalSet`.

pub mod client;
pub mod codec;
pub mod command;
pub mod config;
pub mod error;
pub mod info;
pub mod logging;
pub mod process;
pub mod promise;
pub mod queue;
pub mod router;
pub mod running;
pub mod transport;
pub mod worker;

pub use client::Client;
pub use codec::{DataConverter, EncodedValues, JsonConverter, Payload};
pub use command::{Command, Header, IdAllocator, Outcome, Request, Response, ServerRequest};
pub use config::WorkerOptions;
pub use error::{Failure, FailureKind, WorkerError};
pub use info::{new_run_id, WorkflowInfo};
pub use logging::{init_logging, LogFormat, LoggingConfig};
pub use process::{CancelReason, Process, ScopeArena, ScopeId};
pub use promise::{Deferred, Promise, Settlement};
pub use queue::{ArrayQueue, OutboundQueue, SharedQueue};
pub use router::{RequestKind, Route, Router};
pub use running::{RunningWorkflows, SharedRunning};
pub use transport::{channel_pair, ChannelTransport, HostEnd, JsonFrameCodec, Transport};
pub use worker::Worker;
