use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

/// Identity of a registered connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A message could not be delivered; the connection is considered closed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryError {
    pub connection: ConnectionId,
    pub reason: String,
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Delivery to {} failed: {}", self.connection, self.reason)
    }
}

impl std::error::Error for DeliveryError {}

/// A subscriber endpoint, e.g. one side of a websocket.
///
/// `send` must not block for long; a slow connection delays every other
/// recipient of the same publish.
pub trait Connection: Send + Sync {
    fn id(&self) -> ConnectionId;

    fn send(&self, text: &str) -> Result<(), DeliveryError>;
}

/// Connection backed by an unbounded tokio channel. Sending fails once the receiver is dropped.
#[derive(Debug)]
pub struct ChannelConnection {
    id: ConnectionId,
    tx: UnboundedSender<String>,
}

impl ChannelConnection {
    pub fn new() -> (Arc<Self>, UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connection = Arc::new(Self {
            id: ConnectionId::new(),
            tx,
        });
        (connection, rx)
    }
}

impl Connection for ChannelConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn send(&self, text: &str) -> Result<(), DeliveryError> {
        self.tx.send(text.to_owned()).map_err(|e| DeliveryError {
            connection: self.id,
            reason: e.to_string(),
        })
    }
}
