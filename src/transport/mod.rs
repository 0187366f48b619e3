//! Transport Channel - persistent duplex link to the host
//!
//! ```text
//!                 send(OutboundFrame)              WebSocket
//! CallCorrelator ───────────────────► WsTransport ◄─────────► Host
//!                                         │
//!                                         ▼
//!                    mpsc<ChannelEvent> (arrival order)
//!                    Opened | Frame(InboundFrame) | Closed
//! ```
//!
//! The connection task retries forever after a fixed backoff. While the link
//! is down `send` fails fast; nothing is buffered for a later connection.

pub mod ws_transport;

pub use ws_transport::{TransportSettings, WsTransport};

use crate::protocol::{InboundFrame, OutboundFrame};

/// Notifications produced by the connection task, in arrival order
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// A connection was established (first time or after a reconnect)
    Opened,
    Frame(InboundFrame),
    /// The connection was lost; a reconnect is scheduled
    Closed,
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("not connected to host")]
    NotConnected,

    #[error("failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Outbound half of the channel.
///
/// Implemented by [`WsTransport`] and by in-memory doubles in tests.
pub trait Transport: Send + Sync {
    /// Enqueue a frame on the current connection
    fn send(&self, frame: &OutboundFrame) -> Result<(), TransportError>;

    fn is_open(&self) -> bool;
}
