//! Utilities for driving an [`amqp_session::Session`] against a scripted
//! broker during tests.
//!
//! [`ScriptedTransport`] replays broker frames in order and records what the
//! session sends, so tests can assert on both sides of an exchange without a
//! running broker.
//!
//! ```rust
//! use amqp_session::{RpcReply, Session};
//! use amqp_session_testing::{ScriptedTransport, frames};
//!
//! # async fn example() -> amqp_session::Result<()> {
//! let transport = ScriptedTransport::with_frames(frames::open_replies(1, true));
//! let mut session = Session::builder()
//!     .establish(transport, RpcReply::Normal)
//!     .await?;
//! let channel = session.acquire_channel().await?;
//! assert_eq!(channel, 1);
//! # Ok(())
//! # }
//! ```

pub mod frames;
pub mod logging;
mod scripted;

use amqp_session::{RpcReply, Session};
pub use logging::{LoggerHandle, logger};
pub use scripted::ScriptedTransport;

/// Establish a session over `transport` with a successful login.
///
/// # Panics
///
/// Panics if establishment fails, which only happens for failed logins.
pub async fn establish(transport: ScriptedTransport, confirms: bool) -> Session<ScriptedTransport> {
    Session::builder()
        .publisher_confirms(confirms)
        .establish(transport, RpcReply::Normal)
        .await
        .expect("establish scripted session")
}
