//! Session inbox message types.

use crate::game::{SessionSnapshot, Signal};
use tokio::sync::oneshot;

/// Messages that can be sent to a session ticker
#[derive(Debug)]
pub enum SessionMessage {
    /// Cash-out, stop or forfeit. Recorded and honored at the next tick.
    Signal(Signal),

    /// Get a read-only view of the session
    GetSnapshot {
        response: oneshot::Sender<SessionSnapshot>,
    },
}

impl From<Signal> for SessionMessage {
    fn from(signal: Signal) -> Self {
        SessionMessage::Signal(signal)
    }
}
