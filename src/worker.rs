use crate::client::Client;
use crate::command::{Command, IdAllocator, Response};
use crate::config::WorkerOptions;
use crate::error::WorkerError;
use crate::info::WorkflowInfo;
use crate::process::Process;
use crate::queue::{ArrayQueue, SharedQueue};
use crate::router::{CancelWorkflow, DestroyWorkflow, GetWorkerInfo, Router};
use crate::running::{RunningWorkflows, SharedRunning};
use crate::transport::Transport;
use std::rc::Rc;
use tracing::{debug, info, warn};

/// Worker runtime: one outbound queue, one correlation client, the process
/// registry and the host-request router.
///
/// Everything is single-threaded. `run` drives the worker on the current
/// thread (a current-thread tokio runtime or a `LocalSet`).
pub struct Worker {
    options: WorkerOptions,
    queue: SharedQueue,
    client: Rc<Client>,
    running: SharedRunning,
    router: Router,
}

impl Worker {
    pub fn new(options: WorkerOptions) -> Self {
        let options = options.normalized();
        let queue = ArrayQueue::shared();
        let client = Rc::new(Client::with_allocator(queue.clone(), IdAllocator::with_base(options.id_base)));
        let running = RunningWorkflows::shared();
        let router = Router::new()
            .with_route(DestroyWorkflow::new(running.clone()))
            .with_route(CancelWorkflow::new(running.clone()))
            .with_route(GetWorkerInfo::new(options.task_queue.clone(), running.clone()));
        Self {
            options,
            queue,
            client,
            running,
            router,
        }
    }

    pub fn options(&self) -> &WorkerOptions {
        &self.options
    }

    pub fn client(&self) -> &Rc<Client> {
        &self.client
    }

    pub fn queue(&self) -> &SharedQueue {
        &self.queue
    }

    pub fn running(&self) -> &SharedRunning {
        &self.running
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// For registering additional routes.
    pub fn router_mut(&mut self) -> &mut Router {
        &mut self.router
    }

    /// Create a process for `info` and register it.
    pub fn register_process(&self, info: WorkflowInfo) -> Result<Rc<Process>, WorkerError> {
        let info = info.with_task_queue(self.options.task_queue.clone());
        let process = Rc::new(Process::new(info, self.client.clone()));
        self.running.borrow_mut().insert(process.clone())?;
        Ok(process)
    }

    /// Handle one inbound command.
    pub fn dispatch(&self, command: Command) {
        match command {
            Command::Response(response) => self.client.dispatch(response),
            Command::ServerRequest(request) => {
                let id = request.id;
                let headers = request.header.clone().unwrap_or_default();
                let promise = self.router.dispatch(request, headers);
                let queue = self.queue.clone();
                let registered = promise.then(move |settlement| {
                    let response = match settlement {
                        Ok(values) => Response::success(id, values),
                        Err(failure) => Response::failure(id, failure),
                    };
                    queue.borrow_mut().push(response.into());
                });
                if let Err(e) = registered {
                    warn!(id, error = %e, "unable to answer server request");
                }
            }
            Command::Request(request) => {
                warn!(id = request.id(), name = %request.name(), "ignoring request sent to the worker");
            }
        }
    }

    pub fn dispatch_all(&self, commands: impl IntoIterator<Item = Command>) {
        for command in commands {
            self.dispatch(command);
        }
    }

    /// Take the next outbound batch (at most `max_batch` commands).
    pub fn flush(&self) -> Vec<Command> {
        self.queue.borrow_mut().drain(self.options.max_batch)
    }

    /// Serve `transport` until the host closes it.
    ///
    /// Every decoded batch gets exactly one reply frame, possibly empty.
    /// Undecodable frames are skipped; any other transport error ends the loop.
    pub async fn run<T: Transport + ?Sized>(&self, transport: &mut T) -> Result<(), WorkerError> {
        info!(task_queue = %self.options.task_queue, "worker started");
        loop {
            let batch = match transport.receive().await {
                Ok(Some(batch)) => batch,
                Ok(None) => {
                    info!(pending = self.client.pending_count(), "transport closed, worker stopping");
                    return Ok(());
                }
                Err(WorkerError::Codec(e)) => {
                    warn!(error = %e, "skipping malformed frame");
                    continue;
                }
                Err(e) => return Err(e),
            };
            debug!(commands = batch.len(), "received batch");
            self.dispatch_all(batch);
            let outbound = self.flush();
            debug!(commands = outbound.len(), "sending batch");
            transport.send(outbound).await?;
        }
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("task_queue", &self.options.task_queue)
            .field("client", &self.client)
            .field("running", &self.running.borrow().len())
            .field("router", &self.router)
            .finish()
    }
}
