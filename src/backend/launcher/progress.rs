//! Status reporting for long-running launcher operations.

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

/// Receives human-readable progress messages. Must not block.
pub trait StatusSink: Send + Sync {
    fn status(&self, message: &str);
}

impl<F> StatusSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn status(&self, message: &str) {
        self(message)
    }
}

/// Discards every message.
impl StatusSink for () {
    fn status(&self, _message: &str) {}
}

/// Forwards messages over an unbounded channel, e.g. to a UI task.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: UnboundedSender<String>,
}

impl ChannelSink {
    pub fn new() -> (Self, UnboundedReceiver<String>) {
        let (sender, receiver) = unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl StatusSink for ChannelSink {
    fn status(&self, message: &str) {
        // A closed receiver means nobody is listening any more.
        let _ = self.sender.send(message.to_string());
    }
}
