//! The seam between the session and whatever moves frames on the wire.
//!
//! A [`FrameTransport`] owns the socket, TLS, frame byte layout and the login
//! handshake. The session only ever sees structured [`Frame`] values.

mod memory;

use std::time::Duration;

use async_trait::async_trait;
pub use memory::{BrokerHandle, MemoryTransport, MemoryTransportBuilder};

use crate::{
    error::TransportError,
    frame::{ChannelId, Frame, Method},
    properties::FieldTable,
};

/// Frame size assumed when a transport does not report one.
pub const DEFAULT_FRAME_MAX: u32 = 131_072;

/// Bytes of framing overhead per body frame (type, channel, size, end octet).
pub const FRAME_OVERHEAD: u32 = 8;

/// Source and sink of protocol frames for one connection.
///
/// Implementations must be cancellation-safe: dropping a pending `receive()`
/// future must not lose a frame.
#[async_trait]
pub trait FrameTransport: Send {
    /// Write one frame.
    async fn send(&mut self, frame: Frame) -> Result<(), TransportError>;

    /// Read the next frame.
    ///
    /// `None` waits indefinitely. `Ok(None)` means the timeout elapsed
    /// before a frame arrived.
    async fn receive(&mut self, timeout: Option<Duration>)
    -> Result<Option<Frame>, TransportError>;

    /// Negotiated channel limit; 0 means the protocol maximum.
    fn channel_max(&self) -> u16;

    /// Negotiated maximum frame size in bytes; 0 means unlimited.
    fn frame_max(&self) -> u32 { DEFAULT_FRAME_MAX }

    /// Properties the broker advertised during the handshake.
    fn server_properties(&self) -> FieldTable { FieldTable::new() }

    /// Hint that nothing is queued for `channel`, so any per-channel read
    /// buffers may be shrunk.
    fn release_buffers_if_idle(&mut self, _channel: ChannelId) {}
}

/// Outcome of a transport-level exchange, such as the login handshake,
/// as reported to [`crate::Session`].
#[derive(Debug)]
pub enum RpcReply {
    /// The exchange succeeded.
    Normal,
    /// The transport failed before a reply arrived.
    TransportFailure(TransportError),
    /// The broker answered with a method other than the expected reply.
    ServerException(Method),
}
