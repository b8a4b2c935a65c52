//! The async run loop over the in-process channel transport.

mod common;

use common::{ok, requests, responses, worker_with_process};
use durable_worker::{channel_pair, Command, ScopeId, ServerRequest, Transport, WorkerError};

/// Test: the loop answers every batch, survives a malformed frame and stops when the host closes
#[tokio::test]
async fn run_loop_round_trip() {
    let (worker, process) = worker_with_process("R1");
    let timer = process.new_request("NewTimer");
    let timer_id = timer.id();
    let promise = process.request(ScopeId::ROOT, timer).unwrap();

    let (mut transport, mut host) = channel_pair();
    host.send(&[Command::from(ServerRequest::new(1, "GetWorkerInfo"))]).unwrap();
    host.send(&[Command::from(ok(timer_id).with_history_length(3))]).unwrap();
    host.send_raw(b"[{\"type\":".to_vec()).unwrap();
    host.send(&[Command::from(ServerRequest::new(2, "DestroyWorkflow").with_run_id("R1"))]).unwrap();
    host.close();

    worker.run(&mut transport).await.unwrap();

    // First reply: the queued timer request, then the worker info response.
    let first = host.try_recv().unwrap().unwrap();
    assert_eq!(requests(&first)[0].id(), timer_id);
    assert_eq!(responses(&first)[0].id, 1);

    // Second reply is empty: the response only settled a promise.
    assert!(host.try_recv().unwrap().unwrap().is_empty());
    assert!(promise.result().unwrap().is_ok());
    assert_eq!(process.history_length(), 3);

    // The malformed frame got no reply; the destroy did.
    let last = host.try_recv().unwrap().unwrap();
    assert_eq!(responses(&last)[0].id, 2);
    assert!(host.try_recv().is_none());
    assert!(worker.running().borrow().is_empty());
}

struct Broken;

#[async_trait::async_trait(?Send)]
impl Transport for Broken {
    async fn receive(&mut self) -> Result<Option<Vec<Command>>, WorkerError> {
        Err(WorkerError::Transport("connection reset".into()))
    }

    async fn send(&mut self, _commands: Vec<Command>) -> Result<(), WorkerError> {
        Ok(())
    }
}

/// Test: a transport failure ends the loop with that error
#[tokio::test]
async fn transport_error_stops_loop() {
    let (worker, _process) = worker_with_process("R1");
    let err = worker.run(&mut Broken).await.unwrap_err();
    assert_eq!(err, WorkerError::Transport("connection reset".into()));
}

/// Test: the loop can run inside a LocalSet next to other local tasks
#[tokio::test]
async fn run_inside_local_set() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let (worker, process) = worker_with_process("R1");
            let req = process.new_request("NewTimer");
            let id = req.id();
            let promise = process.request(ScopeId::ROOT, req).unwrap();

            let (mut transport, mut host) = channel_pair();
            let waiter = tokio::task::spawn_local(promise);
            let server = tokio::task::spawn_local(async move {
                let result = worker.run(&mut transport).await;
                (worker, result)
            });

            host.send(&Vec::new()).unwrap();
            let flushed = host.recv().await.unwrap().unwrap();
            assert_eq!(requests(&flushed)[0].id(), id);

            host.send(&[Command::from(ok(id))]).unwrap();
            assert!(waiter.await.unwrap().is_ok());

            host.close();
            let (worker, result) = server.await.unwrap();
            result.unwrap();
            assert_eq!(worker.client().pending_count(), 0);
        })
        .await;
}
