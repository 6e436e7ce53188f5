//! Reassembly of a content header and its body fragments into one message.
//!
//! [`ContentAssembly`] is transport-agnostic: it is fed frames one at a time
//! by whichever component owns them (the frame queue when a delivery was
//! parked, the session when reading straight from the transport).

use bytes::BytesMut;

use crate::{
    error::{Result, SessionError, Violation},
    frame::{ChannelId, Frame, FramePayload},
    message::BasicMessage,
    properties::BasicProperties,
};

/// Partially received message content for one channel.
#[derive(Debug)]
pub struct ContentAssembly {
    channel: ChannelId,
    declared: u64,
    body: BytesMut,
    properties: BasicProperties,
}

impl ContentAssembly {
    /// Start an assembly from the content header frame.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::ProtocolViolation`] when `frame` is not a
    /// header, or when its body size cannot be buffered.
    pub fn from_header(frame: Frame) -> Result<Self> {
        let channel = frame.channel;
        let found = frame.kind();
        let FramePayload::Header(header) = frame.payload else {
            return Err(SessionError::violation(
                channel,
                Violation::ExpectedHeader { found },
            ));
        };
        let declared = header.body_size;
        let capacity = usize::try_from(declared)
            .map_err(|_| SessionError::violation(channel, Violation::BodyTooLarge { declared }))?;
        Ok(Self {
            channel,
            declared,
            body: BytesMut::with_capacity(capacity),
            properties: BasicProperties::from(&header.properties),
        })
    }

    /// Append one body fragment.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::ProtocolViolation`] when `frame` is not a body
    /// fragment or carries more bytes than the header announced.
    pub fn push(&mut self, frame: Frame) -> Result<()> {
        let found = frame.kind();
        let FramePayload::Body(fragment) = frame.payload else {
            return Err(SessionError::violation(
                self.channel,
                Violation::ExpectedBody { found },
            ));
        };
        let received = self.received() + fragment.len() as u64;
        if received > self.declared {
            return Err(SessionError::violation(
                self.channel,
                Violation::BodyOverrun {
                    declared: self.declared,
                    received,
                },
            ));
        }
        self.body.extend_from_slice(&fragment);
        Ok(())
    }

    /// Bytes received so far.
    #[must_use]
    pub fn received(&self) -> u64 { self.body.len() as u64 }

    /// Returns `true` once the declared body size has been received.
    #[must_use]
    pub fn is_complete(&self) -> bool { self.received() >= self.declared }

    /// Finish the assembly.
    #[must_use]
    pub fn into_message(self) -> BasicMessage {
        BasicMessage {
            body: self.body.freeze(),
            properties: self.properties,
        }
    }
}
