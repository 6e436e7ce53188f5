//! Channel id allocation and reuse.
//!
//! [`ChannelPool`] tracks the availability of every channel id the session has
//! ever used. Slot 0 is a permanent `Used` sentinel because channel 0 carries
//! connection-level methods. Opening a channel on the broker is the session's
//! job; the pool only decides which id to hand out.

mod state;

use log::warn;
pub use state::{Availability, ChannelState};

use crate::{
    error::{Result, SessionError},
    frame::{ChannelId, CloseReason},
};

/// Channel limit applied when the broker negotiates 0 ("no limit").
pub const PROTOCOL_CHANNEL_MAX: u16 = u16::MAX;

/// Availability table for all channel ids.
#[derive(Debug)]
pub struct ChannelPool {
    channels: Vec<ChannelState>,
    last_used: ChannelId,
}

impl Default for ChannelPool {
    fn default() -> Self { Self::new() }
}

impl ChannelPool {
    /// Create a pool holding only the connection sentinel.
    #[must_use]
    pub fn new() -> Self {
        Self {
            channels: vec![ChannelState::with_availability(Availability::Used)],
            last_used: 0,
        }
    }

    /// Check out an already open channel, preferring the most recently
    /// released one.
    pub fn checkout_open(&mut self) -> Option<ChannelId> {
        let id = if self.availability(self.last_used) == Some(Availability::Open) {
            self.last_used
        } else {
            let index = self
                .channels
                .iter()
                .position(|state| state.availability == Availability::Open)?;
            ChannelId::try_from(index).ok()?
        };
        self.set_availability(id, Availability::Used);
        Some(id)
    }

    /// Pick the id for a channel about to be opened: the first `Closed` slot,
    /// else a new slot past the end of the table.
    ///
    /// The slot stays `Closed` until [`Self::set_availability`] records the
    /// outcome of the open handshake.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::TooManyChannels`] when every id up to
    /// `channel_max` is in use. A `channel_max` of 0 means
    /// [`PROTOCOL_CHANNEL_MAX`].
    pub fn reserve(&mut self, channel_max: u16) -> Result<ChannelId> {
        if let Some(index) = self
            .channels
            .iter()
            .position(|state| state.availability == Availability::Closed)
        {
            return ChannelId::try_from(index)
                .map_err(|_| SessionError::TooManyChannels { channel_max });
        }

        let limit = if channel_max == 0 {
            PROTOCOL_CHANNEL_MAX
        } else {
            channel_max
        };
        let next = self.channels.len();
        if next > usize::from(limit) {
            return Err(SessionError::TooManyChannels { channel_max: limit });
        }
        self.channels.push(ChannelState::default());
        ChannelId::try_from(next).map_err(|_| SessionError::TooManyChannels { channel_max: limit })
    }

    /// Return a channel to the pool and remember it for the next checkout.
    pub fn release(&mut self, id: ChannelId) {
        if id == 0 {
            warn!("ignoring release of the connection channel");
            return;
        }
        match self.state_mut(id) {
            Some(state) if state.availability != Availability::Closed => {
                state.availability = Availability::Open;
                self.last_used = id;
            }
            Some(_) => warn!("ignoring release of closed channel: channel={id}"),
            None => warn!("ignoring release of unknown channel: channel={id}"),
        }
    }

    /// Mark `id` closed, discarding its confirm and reply-to bookkeeping.
    pub fn close(&mut self, id: ChannelId) { self.close_with_reason(id, None); }

    /// Mark `id` closed and remember why.
    ///
    /// The slot's generation advances, so any checkout taken before the close
    /// can be recognised as stale.
    pub fn close_with_reason(&mut self, id: ChannelId, reason: Option<CloseReason>) {
        if id == 0 {
            return;
        }
        if let Some(state) = self.state_mut(id) {
            *state = state.closed(reason);
        }
    }

    /// Mark every channel closed.
    pub fn close_all(&mut self) {
        for state in self.channels.iter_mut().skip(1) {
            *state = state.closed(None);
        }
    }

    /// Returns `true` while `id` is checked out under `generation`.
    #[must_use]
    pub fn is_held(&self, id: ChannelId, generation: u64) -> bool {
        self.state(id).is_some_and(|state| {
            state.generation == generation && state.availability == Availability::Used
        })
    }

    /// Returns `true` unless the slot is `Closed` or unknown.
    #[must_use]
    pub fn is_open(&self, id: ChannelId) -> bool {
        self.availability(id)
            .is_some_and(|availability| availability != Availability::Closed)
    }

    #[must_use]
    pub fn availability(&self, id: ChannelId) -> Option<Availability> {
        self.state(id).map(|state| state.availability)
    }

    pub(crate) fn set_availability(&mut self, id: ChannelId, availability: Availability) {
        if let Some(state) = self.state_mut(id) {
            state.availability = availability;
        }
    }

    #[must_use]
    pub fn state(&self, id: ChannelId) -> Option<&ChannelState> {
        self.channels.get(usize::from(id))
    }

    pub fn state_mut(&mut self, id: ChannelId) -> Option<&mut ChannelState> {
        self.channels.get_mut(usize::from(id))
    }

    /// Number of slots, including the sentinel.
    #[must_use]
    pub fn len(&self) -> usize { self.channels.len() }

    /// Always `false`: the sentinel slot is never removed.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.channels.is_empty() }
}
