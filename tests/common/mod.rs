#![allow(dead_code)]

pub mod tracing_capture;

use durable_worker::{Command, EncodedValues, Process, Request, Response, Worker, WorkerOptions, WorkflowInfo};
use std::rc::Rc;

/// Worker with one registered process for `run_id`.
pub fn worker_with_process(run_id: &str) -> (Worker, Rc<Process>) {
    let worker = Worker::new(WorkerOptions::default());
    let process = worker
        .register_process(WorkflowInfo::new("Greeter", format!("wf-{run_id}"), run_id))
        .expect("register process");
    (worker, process)
}

pub fn ok(id: u64) -> Response {
    Response::success(id, EncodedValues::null())
}

/// Requests in `commands`, in order.
pub fn requests(commands: &[Command]) -> Vec<&Request> {
    commands
        .iter()
        .filter_map(|c| match c {
            Command::Request(r) => Some(r),
            _ => None,
        })
        .collect()
}

/// Responses in `commands`, in order.
pub fn responses(commands: &[Command]) -> Vec<&Response> {
    commands
        .iter()
        .filter_map(|c| match c {
            Command::Response(r) => Some(r),
            _ => None,
        })
        .collect()
}
