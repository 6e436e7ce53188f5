//! Channel acquisition, release and the close handshakes.

use log::{debug, warn};

use super::Session;
use crate::{
    channel::Availability,
    error::Result,
    frame::{ChannelId, CloseReason, Frame, Method, MethodId},
    metrics,
    transport::FrameTransport,
};

/// Reply code sent with a client-initiated close.
const REPLY_SUCCESS: u16 = 200;

impl<T: FrameTransport> Session<T> {
    /// Check out a channel for one operation.
    ///
    /// Prefers the most recently released channel, then any other open one,
    /// and only then opens a new channel on the broker.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SessionError::ConnectionClosed`] when disconnected,
    /// [`crate::SessionError::TooManyChannels`] when the channel limit is
    /// exhausted, or any error from the open handshake.
    pub async fn acquire_channel(&mut self) -> Result<ChannelId> {
        self.check_is_connected()?;
        if let Some(id) = self.pool.checkout_open() {
            return Ok(id);
        }
        let id = self.pool.reserve(self.transport.channel_max())?;
        self.open_channel(id).await?;
        Ok(id)
    }

    /// Open `id` on the broker and, with publisher confirms enabled, put it
    /// into confirm mode. The slot is `Used` once `channel.open-ok` arrives.
    async fn open_channel(&mut self, id: ChannelId) -> Result<()> {
        self.do_rpc(id, Method::ChannelOpen, &[MethodId::CHANNEL_OPEN_OK])
            .await?;
        self.pool.set_availability(id, Availability::Used);
        metrics::inc_channels_opened();
        if self.config.publisher_confirms {
            self.do_rpc(
                id,
                Method::ConfirmSelect { nowait: false },
                &[MethodId::CONFIRM_SELECT_OK],
            )
            .await?;
        }
        debug!(
            "channel opened: channel={id}, confirms={}",
            self.config.publisher_confirms
        );
        Ok(())
    }

    /// Return a checked-out channel to the pool.
    pub fn release_channel(&mut self, id: ChannelId) { self.pool.release(id); }

    /// Returns `true` unless channel `id` is closed or was never allocated.
    #[must_use]
    pub fn is_channel_open(&self, id: ChannelId) -> bool { self.pool.is_open(id) }

    /// Complete a broker-initiated channel close: mark the channel closed
    /// with `reason`, forget its consumers and parked frames, and acknowledge
    /// the close.
    ///
    /// A failure to send `channel.close-ok` is logged, not returned.
    pub async fn finish_close_channel(&mut self, id: ChannelId, reason: &CloseReason) {
        self.mark_channel_closed(id, reason);
        if let Err(error) = self
            .transport
            .send(Frame::method(id, Method::ChannelCloseOk))
            .await
        {
            warn!("failed to send channel.close-ok: channel={id}, error={error}");
        }
    }

    /// Complete a broker-initiated connection close: mark the session
    /// disconnected and acknowledge the close.
    ///
    /// A failure to send `connection.close-ok` is logged, not returned.
    pub async fn finish_close_connection(&mut self) {
        self.mark_disconnected();
        if let Err(error) = self
            .transport
            .send(Frame::method(0, Method::ConnectionCloseOk))
            .await
        {
            warn!("failed to send connection.close-ok: error={error}");
        }
    }

    /// Close channel `id` from the client side.
    ///
    /// Closing a channel that is not open is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SessionError::ConnectionClosed`] when disconnected or
    /// any error from the close handshake. The channel is closed locally
    /// either way.
    pub async fn close_channel(&mut self, id: ChannelId) -> Result<()> {
        self.check_is_connected()?;
        if id == 0 || !self.pool.is_open(id) {
            return Ok(());
        }
        let reason = CloseReason::new(REPLY_SUCCESS, "OK");
        let reply = self
            .do_rpc(
                id,
                Method::ChannelClose(reason.clone()),
                &[MethodId::CHANNEL_CLOSE_OK],
            )
            .await;
        self.mark_channel_closed(id, &reason);
        reply.map(|_| ())
    }

    /// Close the connection from the client side.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SessionError::ConnectionClosed`] when already
    /// disconnected, or any error from the close handshake. The session is
    /// disconnected either way.
    pub async fn close(&mut self) -> Result<()> {
        self.check_is_connected()?;
        let reply = self
            .do_rpc(
                0,
                Method::ConnectionClose(CloseReason::new(REPLY_SUCCESS, "OK")),
                &[MethodId::CONNECTION_CLOSE_OK],
            )
            .await;
        self.mark_disconnected();
        reply.map(|_| ())
    }

    /// Let the transport shrink its buffers for `id` when nothing is parked
    /// for it.
    pub(super) fn maybe_release_buffers(&mut self, id: ChannelId) {
        if !self.queue.has_frames_for(id) {
            self.transport.release_buffers_if_idle(id);
        }
    }

    fn mark_channel_closed(&mut self, id: ChannelId, reason: &CloseReason) {
        self.pool.close_with_reason(id, Some(reason.clone()));
        self.consumers.remove_channel(id);
        self.queue.discard_channel(id);
    }

    fn mark_disconnected(&mut self) {
        self.connected = false;
        self.pool.close_all();
        self.consumers.clear();
    }
}
