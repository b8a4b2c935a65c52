//! Frame transport between the worker and the orchestration host.
//!
//! A frame is one JSON array of commands. The worker receives a batch, handles
//! it, and answers with one frame holding whatever its outbound queue has.
use crate::command::Command;
use crate::error::WorkerError;
use async_trait::async_trait;
use tokio::sync::mpsc;

#[async_trait(?Send)]
pub trait Transport {
    /// Next inbound batch, or `None` once the host has closed the stream.
    ///
    /// A frame that cannot be decoded is reported as `WorkerError::Codec`; the
    /// transport stays usable afterwards.
    async fn receive(&mut self) -> Result<Option<Vec<Command>>, WorkerError>;

    async fn send(&mut self, commands: Vec<Command>) -> Result<(), WorkerError>;
}

pub struct JsonFrameCodec;

impl JsonFrameCodec {
    pub fn encode(commands: &[Command]) -> Result<Vec<u8>, WorkerError> {
        serde_json::to_vec(commands).map_err(|e| WorkerError::Codec(e.to_string()))
    }

    pub fn decode(frame: &[u8]) -> Result<Vec<Command>, WorkerError> {
        serde_json::from_slice(frame).map_err(|e| WorkerError::Codec(e.to_string()))
    }
}

/// In-process transport over a pair of unbounded channels.
#[derive(Debug)]
pub struct ChannelTransport {
    inbound: mpsc::UnboundedReceiver<Vec<u8>>,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
}

/// The host side of a `ChannelTransport`.
#[derive(Debug)]
pub struct HostEnd {
    to_worker: Option<mpsc::UnboundedSender<Vec<u8>>>,
    from_worker: mpsc::UnboundedReceiver<Vec<u8>>,
}

pub fn channel_pair() -> (ChannelTransport, HostEnd) {
    let (to_worker, inbound) = mpsc::unbounded_channel();
    let (outbound, from_worker) = mpsc::unbounded_channel();
    (
        ChannelTransport { inbound, outbound },
        HostEnd {
            to_worker: Some(to_worker),
            from_worker,
        },
    )
}

#[async_trait(?Send)]
impl Transport for ChannelTransport {
    async fn receive(&mut self) -> Result<Option<Vec<Command>>, WorkerError> {
        match self.inbound.recv().await {
            Some(frame) => JsonFrameCodec::decode(&frame).map(Some),
            None => Ok(None),
        }
    }

    async fn send(&mut self, commands: Vec<Command>) -> Result<(), WorkerError> {
        let frame = JsonFrameCodec::encode(&commands)?;
        self.outbound
            .send(frame)
            .map_err(|_| WorkerError::Transport("host end closed".to_string()))
    }
}

impl HostEnd {
    pub fn send(&self, commands: &[Command]) -> Result<(), WorkerError> {
        self.send_raw(JsonFrameCodec::encode(commands)?)
    }

    /// Send a frame as-is, without encoding.
    pub fn send_raw(&self, frame: Vec<u8>) -> Result<(), WorkerError> {
        let tx = self
            .to_worker
            .as_ref()
            .ok_or_else(|| WorkerError::Transport("host input closed".to_string()))?;
        tx.send(frame)
            .map_err(|_| WorkerError::Transport("worker end closed".to_string()))
    }

    /// End the inbound stream; the worker's `receive` then returns `None`.
    pub fn close(&mut self) {
        self.to_worker = None;
    }

    pub async fn recv(&mut self) -> Option<Result<Vec<Command>, WorkerError>> {
        let frame = self.from_worker.recv().await?;
        Some(JsonFrameCodec::decode(&frame))
    }

    /// Next frame already sent by the worker, without waiting.
    pub fn try_recv(&mut self) -> Option<Result<Vec<Command>, WorkerError>> {
        let frame = self.from_worker.try_recv().ok()?;
        Some(JsonFrameCodec::decode(&frame))
    }
}
