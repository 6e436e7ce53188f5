//! Request/reply exchanges and the frame wait loop.
//!
//! Every frame read from the transport is first checked for a broker-initiated
//! close; frames that do not satisfy the current wait are parked in the frame
//! queue for whichever operation asks for them later.

use std::time::Duration;

use log::{debug, warn};
use tokio::time::Instant;
use tracing::Instrument;

use super::Session;
use crate::{
    error::{Result, SessionError, TransportError, Violation},
    frame::{ChannelId, Frame, Method, MethodId},
    metrics,
    transport::{FrameTransport, RpcReply},
};

impl<T: FrameTransport> Session<T> {
    /// Send `method` on `channel` without waiting for a reply.
    pub(crate) async fn send_method(&mut self, channel: ChannelId, method: Method) -> Result<()> {
        self.transport.send(Frame::method(channel, method)).await?;
        Ok(())
    }

    /// Send `request` on `channel` and wait for one of `expected` on the same
    /// channel.
    ///
    /// Parked frames are consulted before the transport. The wait has no
    /// timeout.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::ChannelClosed`] or
    /// [`SessionError::ConnectionClosedByBroker`] when a close arrives first,
    /// and [`SessionError::Transport`] when the transport fails.
    pub async fn do_rpc(
        &mut self,
        channel: ChannelId,
        request: Method,
        expected: &[MethodId],
    ) -> Result<Frame> {
        self.check_is_connected()?;
        let span = tracing::debug_span!("session.rpc", channel, method = %request.id());
        async move {
            self.send_method(channel, request).await?;
            metrics::inc_rpcs();
            let reply = self.wait_for_method(&[channel], expected, None).await?;
            required(reply)
        }
        .instrument(span)
        .await
    }

    /// Read one frame from the transport.
    ///
    /// `None` blocks until a frame arrives. An elapsed timeout yields
    /// `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Transport`] when the read fails or when an
    /// unbounded read ends without a frame.
    pub async fn next_frame_from_broker(&mut self, timeout: Option<Duration>) -> Result<Option<Frame>> {
        match self.transport.receive(timeout).await? {
            Some(frame) => {
                metrics::inc_frames_received();
                Ok(Some(frame))
            }
            None if timeout.is_none() => Err(TransportError::Disconnected.into()),
            None => Ok(None),
        }
    }

    /// Wait for a method frame on one of `channels` whose id is in
    /// `expected`.
    ///
    /// # Errors
    ///
    /// See [`Self::do_rpc`]; a malformed parked delivery is reported as
    /// [`SessionError::ProtocolViolation`].
    pub async fn wait_for_method(
        &mut self,
        channels: &[ChannelId],
        expected: &[MethodId],
        timeout: Option<Duration>,
    ) -> Result<Option<Frame>> {
        self.wait_for(|frame| frame.matches(channels, expected), timeout)
            .await
    }

    /// Wait for the next frame of any kind on `channel`.
    ///
    /// # Errors
    ///
    /// See [`Self::wait_for_method`].
    pub async fn next_frame_on_channel(
        &mut self,
        channel: ChannelId,
        timeout: Option<Duration>,
    ) -> Result<Option<Frame>> {
        self.wait_for(|frame| frame.channel == channel, timeout)
            .await
    }

    /// Take the first parked frame matching `wanted`, or read until one
    /// arrives, parking everything else. The deadline is fixed on entry and
    /// the remaining time recomputed before each read.
    async fn wait_for(
        &mut self,
        wanted: impl Fn(&Frame) -> bool,
        timeout: Option<Duration>,
    ) -> Result<Option<Frame>> {
        if let Some(frame) = self.queue.take_first(&wanted) {
            return Ok(Some(frame));
        }

        let deadline = timeout.map(|limit| Instant::now() + limit);
        loop {
            let remaining = deadline.map(|at| at.saturating_duration_since(Instant::now()));
            let Some(frame) = self.next_frame_from_broker(remaining).await? else {
                return Ok(None);
            };
            self.check_frame_for_close(&frame).await?;
            if wanted(&frame) {
                return Ok(Some(frame));
            }
            debug!(
                "parking frame: channel={}, kind={}",
                frame.channel,
                frame.kind()
            );
            self.queue.push(frame)?;
            if deadline.is_some_and(|at| Instant::now() >= at) {
                return Ok(None);
            }
        }
    }

    /// Perform the close handshake if `frame` is a broker-initiated close.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::ChannelClosed`] for `channel.close` and
    /// [`SessionError::ConnectionClosedByBroker`] for `connection.close`.
    pub async fn check_frame_for_close(&mut self, frame: &Frame) -> Result<()> {
        match frame.as_method() {
            Some(Method::ChannelClose(reason)) => {
                let channel = frame.channel;
                let reason = reason.clone();
                warn!("channel closed by broker: channel={channel}, reason={reason}");
                self.finish_close_channel(channel, &reason).await;
                Err(SessionError::ChannelClosed { channel, reason })
            }
            Some(Method::ConnectionClose(reason)) => {
                let reason = reason.clone();
                warn!("connection closed by broker: reason={reason}");
                self.finish_close_connection().await;
                Err(SessionError::ConnectionClosedByBroker { reason })
            }
            _ => Ok(()),
        }
    }

    /// Map the outcome of a transport-level exchange onto the session.
    ///
    /// # Errors
    ///
    /// [`RpcReply::TransportFailure`] becomes [`SessionError::Transport`]. A
    /// server close performs the matching handshake and becomes
    /// [`SessionError::ChannelClosed`] or
    /// [`SessionError::ConnectionClosedByBroker`]; any other server method is
    /// a [`SessionError::ProtocolViolation`].
    pub async fn check_rpc_reply(&mut self, channel: ChannelId, reply: RpcReply) -> Result<()> {
        match reply {
            RpcReply::Normal => Ok(()),
            RpcReply::TransportFailure(error) => Err(error.into()),
            RpcReply::ServerException(Method::ChannelClose(reason)) => {
                self.finish_close_channel(channel, &reason).await;
                Err(SessionError::ChannelClosed { channel, reason })
            }
            RpcReply::ServerException(Method::ConnectionClose(reason)) => {
                self.finish_close_connection().await;
                Err(SessionError::ConnectionClosedByBroker { reason })
            }
            RpcReply::ServerException(other) => Err(SessionError::violation(
                channel,
                Violation::UnexpectedMethod { id: other.id() },
            )),
        }
    }
}

/// Unwrap the result of an unbounded wait.
///
/// Unbounded reads never time out, so a missing frame means the transport
/// went away.
pub(super) fn required(frame: Option<Frame>) -> Result<Frame> {
    frame.ok_or(SessionError::Transport(TransportError::Disconnected))
}
