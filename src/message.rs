//! Application-level message values produced and consumed by the session.

use std::fmt;

use bytes::Bytes;

use crate::{frame::ChannelId, properties::BasicProperties};

/// A message body together with its properties.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BasicMessage {
    pub body: Bytes,
    pub properties: BasicProperties,
}

impl BasicMessage {
    /// Create a message with `body` and no properties set.
    #[must_use]
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self {
            body: body.into(),
            properties: BasicProperties::default(),
        }
    }

    /// Set the `reply-to` property.
    #[must_use]
    pub fn with_reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.properties.reply_to = Some(reply_to.into());
        self
    }

    /// Set the `correlation-id` property.
    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.properties.correlation_id = Some(correlation_id.into());
        self
    }

    /// Replace all properties.
    #[must_use]
    pub fn with_properties(mut self, properties: BasicProperties) -> Self {
        self.properties = properties;
        self
    }
}

/// A message delivered to a consumer.
#[derive(Clone, Debug, PartialEq)]
pub struct Envelope {
    pub message: BasicMessage,
    pub consumer_tag: String,
    pub delivery_tag: u64,
    pub redelivered: bool,
    pub exchange: String,
    pub routing_key: String,
    /// Channel the delivery arrived on.
    pub channel: ChannelId,
}

/// A published message the broker could not route and sent back.
#[derive(Clone, Debug, PartialEq)]
pub struct ReturnedMessage {
    pub message: BasicMessage,
    pub reply_code: u16,
    pub reply_text: String,
    pub exchange: String,
    pub routing_key: String,
}

impl fmt::Display for ReturnedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Message returned. Reply code: {} {}",
            self.reply_code, self.reply_text
        )
    }
}
