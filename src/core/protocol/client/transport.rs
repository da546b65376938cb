use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::core::protocol::error::ProtocolResult;
use crate::core::protocol::packets::processor::priority::Priority;

/// Events a datagram transport reports back to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Connected,
    /// One reliable-ordered payload, header byte included.
    Encapsulated(Bytes),
    Closed { reason: String },
}

/// The reliable-ordered datagram layer. Retransmission and ordering are its
/// business; the session only hands it finished batches.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Starts connecting. Events are reported on `events` until the
    /// transport closes.
    async fn connect(&self, events: mpsc::Sender<TransportEvent>) -> ProtocolResult<()>;

    async fn send(&self, payload: Vec<u8>, priority: Priority) -> ProtocolResult<()>;

    async fn close(&self) -> ProtocolResult<()>;
}
