//! The send side of one live event stream, and the payloads it carries.

use std::sync::Arc;

use huddle_common::id::{prefix, PrefixedId};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use super::events::DomainEvent;

/// One serialized event payload. Cheap to clone: every subscriber shares the
/// same JSON; the transport wraps it in an SSE `data:` field.
pub type Frame = Arc<str>;

/// Serialize an event once for all of its subscribers.
pub fn encode_frame(event: &DomainEvent) -> Result<Frame, serde_json::Error> {
    Ok(serde_json::to_string(event)?.into())
}

/// Greeting payload sent first on workspace streams.
pub fn connected_frame() -> Frame {
    Arc::from(r#"{"type":"connected"}"#)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PushError {
    #[error("connection closed")]
    Closed,
    #[error("connection buffer full")]
    Full,
}

/// Push capability for one connection.
///
/// The registry holds this handle; the transport owns the matching receiver.
/// Dropping the receiver closes the writer, and dropping the last writer ends
/// the transport's stream.
#[derive(Debug, Clone)]
pub struct ConnectionWriter {
    id: Arc<str>,
    tx: mpsc::Sender<Frame>,
}

impl PrefixedId for ConnectionWriter {
    const PREFIX: &'static str = prefix::CONNECTION;
}

impl ConnectionWriter {
    /// Create a writer with room for `capacity` undelivered frames.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let writer = Self {
            id: Self::generate().into(),
            tx,
        };
        (writer, rx)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn shared_id(&self) -> Arc<str> {
        self.id.clone()
    }

    /// Non-blocking push into the connection's outbound buffer.
    pub fn push(&self, frame: Frame) -> Result<(), PushError> {
        self.tx.try_send(frame).map_err(|err| match err {
            TrySendError::Full(_) => PushError::Full,
            TrySendError::Closed(_) => PushError::Closed,
        })
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
