//! Content header properties.
//!
//! The transport decodes a content header into [`RawProperties`]: a presence
//! flag word plus every field's raw value. [`BasicProperties`] is the
//! application-facing view where each property is present only if its flag
//! bit was set.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Class id of the `basic` class, the only content-bearing class in use.
pub const BASIC_CLASS_ID: u16 = 60;

/// Presence bits of the `basic` property flag word.
pub mod flags {
    pub const CONTENT_TYPE: u16 = 1 << 15;
    pub const CONTENT_ENCODING: u16 = 1 << 14;
    pub const HEADERS: u16 = 1 << 13;
    pub const DELIVERY_MODE: u16 = 1 << 12;
    pub const PRIORITY: u16 = 1 << 11;
    pub const CORRELATION_ID: u16 = 1 << 10;
    pub const REPLY_TO: u16 = 1 << 9;
    pub const EXPIRATION: u16 = 1 << 8;
    pub const MESSAGE_ID: u16 = 1 << 7;
    pub const TIMESTAMP: u16 = 1 << 6;
    pub const TYPE: u16 = 1 << 5;
    pub const USER_ID: u16 = 1 << 4;
    pub const APP_ID: u16 = 1 << 3;
    pub const CLUSTER_ID: u16 = 1 << 2;
}

/// Decoded field-table value.
///
/// Encoding and decoding of tables belongs to the transport; this is only the
/// in-memory shape.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    LongString(String),
    Bytes(Vec<u8>),
    Timestamp(u64),
    Array(Vec<FieldValue>),
    Table(FieldTable),
    Void,
}

impl FieldValue {
    /// Interpret the value as UTF-8 text, if it is string-like.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::LongString(s) => Some(s),
            Self::Bytes(bytes) => std::str::from_utf8(bytes).ok(),
            _ => None,
        }
    }
}

/// Ordered key/value table, used for message headers and server properties.
pub type FieldTable = BTreeMap<String, FieldValue>;

/// Properties exactly as decoded by the transport.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawProperties {
    /// Presence bits, see [`flags`].
    pub flags: u16,
    pub content_type: String,
    pub content_encoding: String,
    pub headers: FieldTable,
    pub delivery_mode: u8,
    pub priority: u8,
    pub correlation_id: String,
    pub reply_to: String,
    pub expiration: String,
    pub message_id: String,
    pub timestamp: u64,
    pub kind: String,
    pub user_id: String,
    pub app_id: String,
    pub cluster_id: String,
}

impl RawProperties {
    fn has(&self, flag: u16) -> bool { self.flags & flag != 0 }
}

/// Content header frame payload.
#[derive(Clone, Debug, PartialEq)]
pub struct ContentHeader {
    pub class_id: u16,
    /// Total body length announced for the following body frames.
    pub body_size: u64,
    pub properties: RawProperties,
}

impl ContentHeader {
    /// Header for a `basic` content body of `body_size` bytes.
    #[must_use]
    pub fn basic(body_size: u64, properties: RawProperties) -> Self {
        Self {
            class_id: BASIC_CLASS_ID,
            body_size,
            properties,
        }
    }
}

/// Message properties, each present only when set.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BasicProperties {
    pub content_type: Option<String>,
    pub content_encoding: Option<String>,
    pub headers: Option<FieldTable>,
    /// 1 for transient, 2 for persistent.
    pub delivery_mode: Option<u8>,
    pub priority: Option<u8>,
    pub correlation_id: Option<String>,
    pub reply_to: Option<String>,
    pub expiration: Option<String>,
    pub message_id: Option<String>,
    pub timestamp: Option<u64>,
    /// The protocol's `type` property.
    pub kind: Option<String>,
    pub user_id: Option<String>,
    pub app_id: Option<String>,
    pub cluster_id: Option<String>,
}

fn flagged<T: Clone>(raw: &RawProperties, flag: u16, value: &T) -> Option<T> {
    raw.has(flag).then(|| value.clone())
}

impl From<&RawProperties> for BasicProperties {
    fn from(raw: &RawProperties) -> Self {
        Self {
            content_type: flagged(raw, flags::CONTENT_TYPE, &raw.content_type),
            content_encoding: flagged(raw, flags::CONTENT_ENCODING, &raw.content_encoding),
            headers: flagged(raw, flags::HEADERS, &raw.headers),
            delivery_mode: flagged(raw, flags::DELIVERY_MODE, &raw.delivery_mode),
            priority: flagged(raw, flags::PRIORITY, &raw.priority),
            correlation_id: flagged(raw, flags::CORRELATION_ID, &raw.correlation_id),
            reply_to: flagged(raw, flags::REPLY_TO, &raw.reply_to),
            expiration: flagged(raw, flags::EXPIRATION, &raw.expiration),
            message_id: flagged(raw, flags::MESSAGE_ID, &raw.message_id),
            timestamp: flagged(raw, flags::TIMESTAMP, &raw.timestamp),
            kind: flagged(raw, flags::TYPE, &raw.kind),
            user_id: flagged(raw, flags::USER_ID, &raw.user_id),
            app_id: flagged(raw, flags::APP_ID, &raw.app_id),
            cluster_id: flagged(raw, flags::CLUSTER_ID, &raw.cluster_id),
        }
    }
}

fn set<T: Clone>(flags: &mut u16, flag: u16, source: Option<&T>, target: &mut T) {
    if let Some(value) = source {
        *flags |= flag;
        *target = value.clone();
    }
}

impl From<&BasicProperties> for RawProperties {
    fn from(props: &BasicProperties) -> Self {
        let mut raw = RawProperties::default();
        let mut bits = 0;
        set(&mut bits, flags::CONTENT_TYPE, props.content_type.as_ref(), &mut raw.content_type);
        set(
            &mut bits,
            flags::CONTENT_ENCODING,
            props.content_encoding.as_ref(),
            &mut raw.content_encoding,
        );
        set(&mut bits, flags::HEADERS, props.headers.as_ref(), &mut raw.headers);
        set(&mut bits, flags::DELIVERY_MODE, props.delivery_mode.as_ref(), &mut raw.delivery_mode);
        set(&mut bits, flags::PRIORITY, props.priority.as_ref(), &mut raw.priority);
        set(
            &mut bits,
            flags::CORRELATION_ID,
            props.correlation_id.as_ref(),
            &mut raw.correlation_id,
        );
        set(&mut bits, flags::REPLY_TO, props.reply_to.as_ref(), &mut raw.reply_to);
        set(&mut bits, flags::EXPIRATION, props.expiration.as_ref(), &mut raw.expiration);
        set(&mut bits, flags::MESSAGE_ID, props.message_id.as_ref(), &mut raw.message_id);
        set(&mut bits, flags::TIMESTAMP, props.timestamp.as_ref(), &mut raw.timestamp);
        set(&mut bits, flags::TYPE, props.kind.as_ref(), &mut raw.kind);
        set(&mut bits, flags::USER_ID, props.user_id.as_ref(), &mut raw.user_id);
        set(&mut bits, flags::APP_ID, props.app_id.as_ref(), &mut raw.app_id);
        set(&mut bits, flags::CLUSTER_ID, props.cluster_id.as_ref(), &mut raw.cluster_id);
        raw.flags = bits;
        raw
    }
}
