//! Canonical error and result types for the crate.
//!
//! [`SessionError`] is the single failure surface of every session operation.
//! Transport failures are wrapped rather than flattened so callers can tell a
//! dead socket from a broker-initiated close.

use std::io;

use crate::{
    frame::{ChannelId, CloseReason, FrameKind},
    message::ReturnedMessage,
};

/// Failures reported by a [`FrameTransport`](crate::transport::FrameTransport).
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Socket or allocation failure.
    #[error("transport I/O error: {0}")]
    Io(#[from] io::Error),
    /// The peer went away, or the transport was shut down.
    #[error("transport disconnected")]
    Disconnected,
}

/// Top-level error type exposed by the session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Underlying read or write failed. Not retried.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    /// An expected frame type or sequence did not occur.
    #[error("protocol violation on channel {channel}: {detail}")]
    ProtocolViolation {
        channel: ChannelId,
        detail: Violation,
    },
    /// The broker closed a channel.
    #[error("channel {channel} closed by broker: {reason}")]
    ChannelClosed {
        channel: ChannelId,
        reason: CloseReason,
    },
    /// The broker closed the whole connection.
    #[error("connection closed by broker: {reason}")]
    ConnectionClosedByBroker { reason: CloseReason },
    /// The connection is no longer usable.
    #[error("connection is closed")]
    ConnectionClosed,
    /// A publish was negatively acknowledged.
    #[error("message with delivery tag {delivery_tag} was rejected by the broker")]
    MessageNacked { delivery_tag: u64 },
    /// A mandatory or immediate publish could not be routed.
    #[error("{0}")]
    MessageReturned(Box<ReturnedMessage>),
    /// No consumer is registered under the tag.
    #[error("consumer tag not found: {0}")]
    ConsumerTagNotFound(String),
    /// The negotiated channel limit is exhausted.
    #[error("too many channels open (channel max {channel_max})")]
    TooManyChannels { channel_max: u16 },
}

impl SessionError {
    pub(crate) fn violation(channel: ChannelId, detail: Violation) -> Self {
        Self::ProtocolViolation { channel, detail }
    }

    /// Returns `true` when the error ended the connection.
    #[must_use]
    pub fn is_connection_fatal(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::ConnectionClosedByBroker { .. } | Self::ConnectionClosed
        )
    }
}

/// The specific sequencing rule a peer broke.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Violation {
    /// A content header was expected.
    #[error("expected a content header frame, received a {found} frame")]
    ExpectedHeader { found: FrameKind },
    /// A content body fragment was expected.
    #[error("expected a content body frame, received a {found} frame")]
    ExpectedBody { found: FrameKind },
    /// Body fragments exceeded the size announced by the header.
    #[error("body of {received} bytes exceeds declared size {declared}")]
    BodyOverrun { declared: u64, received: u64 },
    /// The declared body size cannot be buffered on this platform.
    #[error("declared body size {declared} cannot be buffered")]
    BodyTooLarge { declared: u64 },
    /// The broker answered an RPC with an unrelated method.
    #[error("unexpected method {id} in reply")]
    UnexpectedMethod { id: crate::frame::MethodId },
}

/// Canonical result alias used by the session's public API.
pub type Result<T> = std::result::Result<T, SessionError>;
