#![doc(html_root_url = "https://docs.rs/amqp-session/latest")]
//! Public API for the `amqp-session` library.
//!
//! This crate provides the client session layer of an AMQP 0-9-1 style
//! protocol: channel multiplexing over one connection, request/reply
//! sequencing with out-of-order frames parked for later, publisher-confirm
//! tracking, content reassembly and consumer bookkeeping. Frame encoding and
//! socket I/O live behind the [`FrameTransport`] trait.

pub mod broker_version;
pub mod channel;
pub mod config;
pub mod consumer;
pub mod content;
pub mod error;
pub mod frame;
pub mod frame_queue;
pub mod message;
pub mod metrics;
pub mod properties;
pub mod session;
pub mod transport;

pub use broker_version::BrokerVersion;
pub use channel::{Availability, ChannelPool, ChannelState};
pub use config::SessionConfig;
pub use error::{Result, SessionError, TransportError, Violation};
pub use frame::{ChannelId, CloseReason, Frame, FramePayload, Method, MethodId, ReplyCode};
pub use message::{BasicMessage, Envelope, ReturnedMessage};
pub use properties::{BasicProperties, ContentHeader, FieldTable, FieldValue};
pub use session::{ConsumeOptions, PublishOptions, PublishToken, Session, SessionBuilder};
pub use transport::{FrameTransport, MemoryTransport, RpcReply};
