//! Metric helpers for `amqp-session`.
//!
//! This module defines metric names and simple helper functions
//! wrapping the [`metrics`](https://docs.rs/metrics) crate. Without the
//! `metrics` feature every helper compiles to a no-op.

#[cfg(feature = "metrics")]
use metrics::counter;

/// Name of the counter tracking frames read from the transport.
pub const FRAMES_RECEIVED: &str = "amqp_session_frames_received_total";
/// Name of the counter tracking frames parked in the frame queue.
pub const FRAMES_PARKED: &str = "amqp_session_frames_parked_total";
/// Name of the counter tracking RPCs issued.
pub const RPCS_TOTAL: &str = "amqp_session_rpcs_total";
/// Name of the counter tracking publisher-confirm outcomes.
pub const CONFIRMS_TOTAL: &str = "amqp_session_confirms_total";
/// Name of the counter tracking channels opened on the broker.
pub const CHANNELS_OPENED: &str = "amqp_session_channels_opened_total";

/// Outcome of a publisher-confirm wait.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfirmOutcome {
    /// The broker acknowledged the message.
    Ack,
    /// The broker rejected the message.
    Nack,
    /// The message was returned as unroutable.
    Return,
}

impl ConfirmOutcome {
    /// Label value recorded under the `outcome` key.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ConfirmOutcome::Ack => "ack",
            ConfirmOutcome::Nack => "nack",
            ConfirmOutcome::Return => "return",
        }
    }
}

/// Record a frame read from the transport.
pub fn inc_frames_received() {
    #[cfg(feature = "metrics")]
    counter!(FRAMES_RECEIVED).increment(1);
}

/// Record a frame parked for later consumption.
pub fn inc_frames_parked() {
    #[cfg(feature = "metrics")]
    counter!(FRAMES_PARKED).increment(1);
}

/// Record an RPC sent to the broker.
pub fn inc_rpcs() {
    #[cfg(feature = "metrics")]
    counter!(RPCS_TOTAL).increment(1);
}

/// Record the outcome of a publisher-confirm wait.
pub fn inc_confirms(outcome: ConfirmOutcome) {
    #[cfg(feature = "metrics")]
    counter!(CONFIRMS_TOTAL, "outcome" => outcome.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = outcome;
}

/// Record a channel opened on the broker.
pub fn inc_channels_opened() {
    #[cfg(feature = "metrics")]
    counter!(CHANNELS_OPENED).increment(1);
}
