//! Session configuration.
//!
//! [`SessionConfig`] can be built in code through
//! [`crate::session::SessionBuilder`] or deserialized from any serde format.
//! Missing fields take their defaults.

use serde::Deserialize;

/// Pseudo-queue name the broker reserves for direct reply-to.
pub const DEFAULT_DIRECT_REPLY_QUEUE: &str = "amq.rabbitmq.reply-to";

/// Behaviour switches for a [`crate::Session`].
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Put every opened channel into confirm mode and wait for the broker's
    /// verdict after each publish.
    pub publisher_confirms: bool,
    /// Queue name that triggers a direct reply-to subscription when used as a
    /// message's `reply_to`.
    pub direct_reply_queue: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            publisher_confirms: true,
            direct_reply_queue: DEFAULT_DIRECT_REPLY_QUEUE.to_owned(),
        }
    }
}
