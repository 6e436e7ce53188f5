//! Structured frame values exchanged with the transport.
//!
//! The transport owns byte-level encoding; the session only ever sees decoded
//! [`Frame`]s. A frame is a tagged variant of method, content header or body
//! fragment, addressed to a single channel.

use std::fmt;

use bytes::Bytes;

use crate::properties::ContentHeader;

/// Numeric channel identifier. Channel 0 carries connection-level methods.
pub type ChannelId = u16;

/// Packed `class_id << 16 | method_index` identifier of a protocol method.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodId(u32);

impl MethodId {
    pub const CONNECTION_CLOSE: Self = Self::new(10, 50);
    pub const CONNECTION_CLOSE_OK: Self = Self::new(10, 51);
    pub const CHANNEL_OPEN: Self = Self::new(20, 10);
    pub const CHANNEL_OPEN_OK: Self = Self::new(20, 11);
    pub const CHANNEL_CLOSE: Self = Self::new(20, 40);
    pub const CHANNEL_CLOSE_OK: Self = Self::new(20, 41);
    pub const BASIC_CONSUME: Self = Self::new(60, 20);
    pub const BASIC_CONSUME_OK: Self = Self::new(60, 21);
    pub const BASIC_CANCEL: Self = Self::new(60, 30);
    pub const BASIC_CANCEL_OK: Self = Self::new(60, 31);
    pub const BASIC_PUBLISH: Self = Self::new(60, 40);
    pub const BASIC_RETURN: Self = Self::new(60, 50);
    pub const BASIC_DELIVER: Self = Self::new(60, 60);
    pub const BASIC_ACK: Self = Self::new(60, 80);
    pub const BASIC_NACK: Self = Self::new(60, 120);
    pub const CONFIRM_SELECT: Self = Self::new(85, 10);
    pub const CONFIRM_SELECT_OK: Self = Self::new(85, 11);

    /// Build an identifier from its class and method halves.
    #[must_use]
    pub const fn new(class_id: u16, method_index: u16) -> Self {
        Self(((class_id as u32) << 16) | method_index as u32)
    }

    /// Protocol class the method belongs to.
    #[must_use]
    pub const fn class_id(self) -> u16 { (self.0 >> 16) as u16 }

    /// Method index within its class.
    #[must_use]
    pub const fn method_index(self) -> u16 { (self.0 & 0xFFFF) as u16 }

    /// Return the packed `u32` representation.
    #[must_use]
    pub const fn as_u32(self) -> u32 { self.0 }
}

impl From<u32> for MethodId {
    fn from(value: u32) -> Self { Self(value) }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.class_id(), self.method_index())
    }
}

/// Arguments of `channel.close` and `connection.close`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CloseReason {
    /// Broker reply code, e.g. 404 for `NOT_FOUND`.
    pub reply_code: u16,
    /// Human readable text accompanying the reply code.
    pub reply_text: String,
    /// Class of the method that caused the close, or 0.
    pub class_id: u16,
    /// Method index of the method that caused the close, or 0.
    pub method_id: u16,
}

impl CloseReason {
    /// Create a close reason with no failing method attached.
    #[must_use]
    pub fn new(reply_code: u16, reply_text: impl Into<String>) -> Self {
        Self {
            reply_code,
            reply_text: reply_text.into(),
            class_id: 0,
            method_id: 0,
        }
    }

    /// Classify the reply code.
    #[must_use]
    pub fn kind(&self) -> ReplyCode { ReplyCode::from(self.reply_code) }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.reply_code, self.reply_text)?;
        if self.class_id != 0 || self.method_id != 0 {
            write!(f, " (caused by method {}.{})", self.class_id, self.method_id)?;
        }
        Ok(())
    }
}

/// Broker reply codes carried by close methods and `basic.return`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplyCode {
    ContentTooLarge,
    NoRoute,
    NoConsumers,
    ConnectionForced,
    InvalidPath,
    AccessRefused,
    NotFound,
    ResourceLocked,
    PreconditionFailed,
    FrameError,
    SyntaxError,
    CommandInvalid,
    ChannelError,
    UnexpectedFrame,
    ResourceError,
    NotAllowed,
    NotImplemented,
    InternalError,
    /// A code outside the protocol's table.
    Unknown(u16),
}

impl From<u16> for ReplyCode {
    fn from(code: u16) -> Self {
        match code {
            311 => Self::ContentTooLarge,
            312 => Self::NoRoute,
            313 => Self::NoConsumers,
            320 => Self::ConnectionForced,
            402 => Self::InvalidPath,
            403 => Self::AccessRefused,
            404 => Self::NotFound,
            405 => Self::ResourceLocked,
            406 => Self::PreconditionFailed,
            501 => Self::FrameError,
            502 => Self::SyntaxError,
            503 => Self::CommandInvalid,
            504 => Self::ChannelError,
            505 => Self::UnexpectedFrame,
            506 => Self::ResourceError,
            530 => Self::NotAllowed,
            540 => Self::NotImplemented,
            541 => Self::InternalError,
            other => Self::Unknown(other),
        }
    }
}

/// Arguments of `basic.consume`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BasicConsume {
    pub queue: String,
    /// Requested consumer tag; empty lets the broker choose one.
    pub consumer_tag: String,
    pub no_local: bool,
    pub no_ack: bool,
    pub exclusive: bool,
    pub nowait: bool,
}

/// Arguments of `basic.publish`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BasicPublish {
    pub exchange: String,
    pub routing_key: String,
    pub mandatory: bool,
    pub immediate: bool,
}

/// Arguments of `basic.return`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BasicReturn {
    pub reply_code: u16,
    pub reply_text: String,
    pub exchange: String,
    pub routing_key: String,
}

/// Arguments of `basic.deliver`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BasicDeliver {
    pub consumer_tag: String,
    pub delivery_tag: u64,
    pub redelivered: bool,
    pub exchange: String,
    pub routing_key: String,
}

/// Decoded protocol method.
///
/// Methods the session interprets have dedicated variants; everything else
/// travels as [`Method::Other`] with transport-encoded arguments.
#[derive(Clone, Debug, PartialEq)]
pub enum Method {
    ConnectionClose(CloseReason),
    ConnectionCloseOk,
    ChannelOpen,
    ChannelOpenOk,
    ChannelClose(CloseReason),
    ChannelCloseOk,
    ConfirmSelect { nowait: bool },
    ConfirmSelectOk,
    BasicConsume(BasicConsume),
    BasicConsumeOk { consumer_tag: String },
    BasicCancel { consumer_tag: String, nowait: bool },
    BasicCancelOk { consumer_tag: String },
    BasicPublish(BasicPublish),
    BasicReturn(BasicReturn),
    BasicDeliver(BasicDeliver),
    BasicAck { delivery_tag: u64, multiple: bool },
    BasicNack { delivery_tag: u64, multiple: bool, requeue: bool },
    /// Any method the session forwards without interpreting.
    Other { id: MethodId, arguments: Bytes },
}

impl Method {
    /// Identifier of this method.
    #[must_use]
    pub fn id(&self) -> MethodId {
        match self {
            Self::ConnectionClose(_) => MethodId::CONNECTION_CLOSE,
            Self::ConnectionCloseOk => MethodId::CONNECTION_CLOSE_OK,
            Self::ChannelOpen => MethodId::CHANNEL_OPEN,
            Self::ChannelOpenOk => MethodId::CHANNEL_OPEN_OK,
            Self::ChannelClose(_) => MethodId::CHANNEL_CLOSE,
            Self::ChannelCloseOk => MethodId::CHANNEL_CLOSE_OK,
            Self::ConfirmSelect { .. } => MethodId::CONFIRM_SELECT,
            Self::ConfirmSelectOk => MethodId::CONFIRM_SELECT_OK,
            Self::BasicConsume(_) => MethodId::BASIC_CONSUME,
            Self::BasicConsumeOk { .. } => MethodId::BASIC_CONSUME_OK,
            Self::BasicCancel { .. } => MethodId::BASIC_CANCEL,
            Self::BasicCancelOk { .. } => MethodId::BASIC_CANCEL_OK,
            Self::BasicPublish(_) => MethodId::BASIC_PUBLISH,
            Self::BasicReturn(_) => MethodId::BASIC_RETURN,
            Self::BasicDeliver(_) => MethodId::BASIC_DELIVER,
            Self::BasicAck { .. } => MethodId::BASIC_ACK,
            Self::BasicNack { .. } => MethodId::BASIC_NACK,
            Self::Other { id, .. } => *id,
        }
    }
}

/// Discriminant of a [`FramePayload`], used in diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameKind {
    Method,
    Header,
    Body,
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Method => "method",
            Self::Header => "header",
            Self::Body => "body",
        })
    }
}

/// Payload carried by a [`Frame`].
#[derive(Clone, Debug, PartialEq)]
pub enum FramePayload {
    Method(Method),
    Header(ContentHeader),
    Body(Bytes),
}

/// A decoded frame addressed to one channel.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    pub channel: ChannelId,
    pub payload: FramePayload,
}

impl Frame {
    /// Wrap a method for `channel`.
    #[must_use]
    pub fn method(channel: ChannelId, method: Method) -> Self {
        Self {
            channel,
            payload: FramePayload::Method(method),
        }
    }

    /// Wrap a content header for `channel`.
    #[must_use]
    pub fn header(channel: ChannelId, header: ContentHeader) -> Self {
        Self {
            channel,
            payload: FramePayload::Header(header),
        }
    }

    /// Wrap a body fragment for `channel`.
    #[must_use]
    pub fn body(channel: ChannelId, fragment: impl Into<Bytes>) -> Self {
        Self {
            channel,
            payload: FramePayload::Body(fragment.into()),
        }
    }

    #[must_use]
    pub fn kind(&self) -> FrameKind {
        match self.payload {
            FramePayload::Method(_) => FrameKind::Method,
            FramePayload::Header(_) => FrameKind::Header,
            FramePayload::Body(_) => FrameKind::Body,
        }
    }

    /// Borrow the method when this is a method frame.
    #[must_use]
    pub fn as_method(&self) -> Option<&Method> {
        match &self.payload {
            FramePayload::Method(method) => Some(method),
            _ => None,
        }
    }

    /// Identifier of the carried method, if any.
    #[must_use]
    pub fn method_id(&self) -> Option<MethodId> { self.as_method().map(Method::id) }

    /// Returns `true` when this is a method frame carrying `id`.
    #[must_use]
    pub fn is_method(&self, id: MethodId) -> bool { self.method_id() == Some(id) }

    /// Returns `true` when this frame is a method on `channel` whose id is in
    /// `expected`.
    #[must_use]
    pub fn matches(&self, channels: &[ChannelId], expected: &[MethodId]) -> bool {
        channels.contains(&self.channel)
            && self.method_id().is_some_and(|id| expected.contains(&id))
    }

    /// Consume the frame, returning its method.
    #[must_use]
    pub fn into_method(self) -> Option<Method> {
        match self.payload {
            FramePayload::Method(method) => Some(method),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(MethodId::BASIC_ACK, 60, 80)]
    #[case(MethodId::CHANNEL_CLOSE, 20, 40)]
    #[case(MethodId::CONFIRM_SELECT_OK, 85, 11)]
    fn method_id_packs_class_and_index(
        #[case] id: MethodId,
        #[case] class_id: u16,
        #[case] index: u16,
    ) {
        assert_eq!(id.class_id(), class_id);
        assert_eq!(id.method_index(), index);
        assert_eq!(id.as_u32(), (u32::from(class_id) << 16) | u32::from(index));
    }

    #[test]
    fn ack_method_has_matching_id() {
        let frame = Frame::method(
            3,
            Method::BasicAck {
                delivery_tag: 1,
                multiple: false,
            },
        );
        assert!(frame.is_method(MethodId::BASIC_ACK));
        assert!(frame.matches(&[3], &[MethodId::BASIC_NACK, MethodId::BASIC_ACK]));
        assert!(!frame.matches(&[4], &[MethodId::BASIC_ACK]));
    }

    #[test]
    fn body_frames_never_match_methods() {
        let frame = Frame::body(1, &b"abc"[..]);
        assert_eq!(frame.kind(), FrameKind::Body);
        assert_eq!(frame.method_id(), None);
        assert!(!frame.matches(&[1], &[MethodId::BASIC_DELIVER]));
    }

    #[test]
    fn other_methods_report_their_own_id() {
        let id = MethodId::new(50, 10);
        let method = Method::Other {
            id,
            arguments: Bytes::new(),
        };
        assert_eq!(method.id(), id);
        assert_eq!(id.to_string(), "50.10");
    }

    #[test]
    fn close_reason_classifies_reply_codes() {
        assert_eq!(CloseReason::new(403, "ACCESS_REFUSED").kind(), ReplyCode::AccessRefused);
        assert_eq!(CloseReason::new(530, "NOT_ALLOWED").kind(), ReplyCode::NotAllowed);
        assert_eq!(CloseReason::new(999, "?").kind(), ReplyCode::Unknown(999));
    }

    #[test]
    fn close_reason_display_mentions_failing_method() {
        let reason = CloseReason {
            reply_code: 404,
            reply_text: "NOT_FOUND - no exchange 'x'".into(),
            class_id: 60,
            method_id: 40,
        };
        assert_eq!(
            reason.to_string(),
            "404 NOT_FOUND - no exchange 'x' (caused by method 60.40)"
        );
    }
}
