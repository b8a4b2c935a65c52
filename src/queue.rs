use crate::command::Command;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// Ordered buffer of commands not yet handed to the transport.
pub trait OutboundQueue {
    fn push(&mut self, command: Command);
    /// True while the request with `id` is still waiting to be sent.
    ///
    /// Only `Command::Request` entries match: host-assigned ids of queued
    /// responses live in a different number space.
    fn has(&self, id: u64) -> bool;
    /// Remove the request with `id` before it reaches the wire.
    fn pull(&mut self, id: u64) -> Option<Command>;
    /// Take up to `limit` commands in FIFO order.
    fn drain(&mut self, limit: usize) -> Vec<Command>;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Queue handle shared by the client (producer) and the worker (flusher).
pub type SharedQueue = Rc<RefCell<dyn OutboundQueue>>;

#[derive(Debug, Default)]
pub struct ArrayQueue {
    commands: VecDeque<Command>,
}

impl ArrayQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedQueue {
        Rc::new(RefCell::new(Self::new()))
    }
}

fn is_request(command: &Command, id: u64) -> bool {
    matches!(command, Command::Request(r) if r.id() == id)
}

impl OutboundQueue for ArrayQueue {
    fn push(&mut self, command: Command) {
        self.commands.push_back(command);
    }

    fn has(&self, id: u64) -> bool {
        self.commands.iter().any(|c| is_request(c, id))
    }

    fn pull(&mut self, id: u64) -> Option<Command> {
        let pos = self.commands.iter().position(|c| is_request(c, id))?;
        self.commands.remove(pos)
    }

    fn drain(&mut self, limit: usize) -> Vec<Command> {
        let n = limit.min(self.commands.len());
        self.commands.drain(..n).collect()
    }

    fn len(&self) -> usize {
        self.commands.len()
    }
}
