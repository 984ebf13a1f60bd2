use crossbeam_channel::{Sender, TrySendError};

use crate::error::PostError;

/// Destination of progress messages.
///
/// `post` is a non-blocking enqueue and may be called from any thread,
/// including threads the image library spawned on its own.
pub trait MessagePort: Send + Sync {
    /// Enqueues one UTF-8 message.
    fn post(&self, message: &str) -> Result<(), PostError>;
}

/// [`MessagePort`] backed by a `crossbeam_channel` sender.
///
/// The receiving end plays the host runtime for Rust callers.
#[derive(Debug, Clone)]
pub struct ChannelPort {
    sender: Sender<String>,
}

impl ChannelPort {
    /// Wraps `sender`. Works with bounded and unbounded channels.
    pub fn new(sender: Sender<String>) -> Self {
        Self { sender }
    }
}

impl MessagePort for ChannelPort {
    fn post(&self, message: &str) -> Result<(), PostError> {
        self.sender
            .try_send(message.to_owned())
            .map_err(|e| match e {
                TrySendError::Full(_) => PostError::Full,
                TrySendError::Disconnected(_) => PostError::Disconnected,
            })
    }
}
