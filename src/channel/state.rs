//! Per-channel bookkeeping.

use crate::frame::CloseReason;

/// Availability of a channel slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Availability {
    /// Not open on the broker; the slot is reusable capacity.
    #[default]
    Closed,
    /// Open and idle, ready to be handed out.
    Open,
    /// Open and checked out by an operation or a consumer.
    Used,
}

/// State tracked for one channel id.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChannelState {
    pub availability: Availability,
    /// Highest delivery tag accounted for by publisher confirms.
    pub last_delivery_tag: u64,
    /// Confirms already covered by an earlier cumulative ack.
    pub unconsumed_ack: u64,
    /// Consumer tag of the direct reply-to subscription on this channel.
    pub direct_reply_tag: Option<String>,
    /// Incremented on every close. A checkout taken under an older
    /// generation no longer owns the channel.
    pub generation: u64,
    /// Reason given for the most recent close, if one was reported.
    pub close_reason: Option<CloseReason>,
    /// Confirms still due for publishes whose wait was abandoned.
    pub owed_confirms: u64,
}

impl ChannelState {
    pub(crate) fn with_availability(availability: Availability) -> Self {
        Self {
            availability,
            ..Self::default()
        }
    }

    /// The state of this slot after a close: bookkeeping discarded, the
    /// generation advanced and `reason` remembered.
    pub(crate) fn closed(&self, reason: Option<CloseReason>) -> Self {
        Self {
            generation: self.generation.wrapping_add(1),
            close_reason: reason,
            ..Self::default()
        }
    }

    /// Record a publisher-confirm ack.
    ///
    /// Returns `false` when the tag does not advance past the last recorded
    /// one. When the ack jumps ahead by more than one, the skipped confirms
    /// are banked in [`Self::unconsumed_ack`].
    pub fn record_ack(&mut self, delivery_tag: u64) -> bool {
        if delivery_tag <= self.last_delivery_tag {
            return false;
        }
        let diff = delivery_tag - self.last_delivery_tag;
        self.last_delivery_tag = delivery_tag;
        if diff > 1 {
            self.unconsumed_ack = diff - 1;
        }
        true
    }

    /// Consume one banked confirm, if any.
    pub fn take_banked_ack(&mut self) -> bool {
        if self.unconsumed_ack == 0 {
            return false;
        }
        self.unconsumed_ack -= 1;
        true
    }
}
