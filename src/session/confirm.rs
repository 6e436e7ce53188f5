//! Publishing and publisher-confirm tracking.
//!
//! On a confirm-mode channel every publish is answered by exactly one of:
//!
//! - `basic.ack`, possibly cumulative over earlier publishes;
//! - `basic.nack`;
//! - `basic.return` with the message content, followed by `basic.ack`;
//! - a channel or connection close.
//!
//! A cumulative ack banks the publishes it skipped over, so that many later
//! waits succeed without reading the transport.
//!
//! A wait cut short by anything other than its own channel closing leaves the
//! confirm owed on the channel. The channel is released, and the next wait on
//! it settles the owed confirms before its own.

use log::{debug, warn};

use super::{Session, rpc::required};
use crate::{
    channel::ChannelState,
    error::{Result, SessionError, Violation},
    frame::{BasicPublish, ChannelId, Frame, Method, MethodId},
    message::{BasicMessage, ReturnedMessage},
    metrics::{self, ConfirmOutcome},
    properties::{ContentHeader, RawProperties},
    transport::{FRAME_OVERHEAD, FrameTransport},
};

const CONFIRM_REPLIES: [MethodId; 3] = [
    MethodId::BASIC_ACK,
    MethodId::BASIC_NACK,
    MethodId::BASIC_RETURN,
];

/// Flags sent with `basic.publish`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PublishOptions {
    /// Return the message if no queue is bound to receive it.
    pub mandatory: bool,
    /// Return the message if no consumer can take it immediately.
    pub immediate: bool,
}

/// A publish that has been sent but not yet confirmed.
///
/// Holds the channel checked out for the publish until it is passed to
/// [`Session::publish_end`]. The token only owns the channel for the
/// generation it was issued under; once the channel closes the token is
/// stale.
#[must_use = "pass the token to `publish_end` to release its channel"]
#[derive(Debug, PartialEq, Eq)]
pub struct PublishToken {
    channel: ChannelId,
    generation: u64,
}

impl PublishToken {
    /// Channel the message was published on.
    #[must_use]
    pub fn channel(&self) -> ChannelId { self.channel }
}

impl<T: FrameTransport> Session<T> {
    /// Publish `message` and wait for the broker's verdict.
    ///
    /// # Errors
    ///
    /// See [`Self::publish_begin`] and [`Self::publish_end`].
    pub async fn basic_publish(
        &mut self,
        exchange: &str,
        routing_key: &str,
        message: &BasicMessage,
        options: PublishOptions,
    ) -> Result<()> {
        let token = self
            .publish_begin(exchange, routing_key, message, options)
            .await?;
        self.publish_end(token).await
    }

    /// Send `basic.publish`, the content header and the body on a checked-out
    /// channel.
    ///
    /// When the message's `reply_to` names the direct reply-to queue, the
    /// channel is first subscribed to it.
    ///
    /// # Errors
    ///
    /// Returns any error from acquiring the channel, subscribing or sending.
    pub async fn publish_begin(
        &mut self,
        exchange: &str,
        routing_key: &str,
        message: &BasicMessage,
        options: PublishOptions,
    ) -> Result<PublishToken> {
        let channel = self.acquire_channel().await?;
        let generation = self.pool.state(channel).map_or(0, |state| state.generation);

        if message
            .properties
            .reply_to
            .as_deref()
            .is_some_and(|reply_to| reply_to == self.config.direct_reply_queue)
        {
            self.subscribe_direct_reply(channel).await?;
        }

        self.send_method(
            channel,
            Method::BasicPublish(BasicPublish {
                exchange: exchange.to_owned(),
                routing_key: routing_key.to_owned(),
                mandatory: options.mandatory,
                immediate: options.immediate,
            }),
        )
        .await?;
        self.send_content(channel, message).await?;
        debug!(
            "published: channel={channel}, exchange={exchange}, routing_key={routing_key}, \
             bytes={}",
            message.body.len()
        );
        Ok(PublishToken {
            channel,
            generation,
        })
    }

    /// Consumer tag of the direct reply-to subscription on the token's
    /// channel, if it has one.
    #[must_use]
    pub fn direct_reply_token(&self, token: &PublishToken) -> Option<&str> {
        self.pool
            .state(token.channel)
            .and_then(|state| state.direct_reply_tag.as_deref())
    }

    /// Finish a publish: wait for its confirm when publisher confirms are
    /// enabled, then release the channel.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::MessageNacked`], [`SessionError::MessageReturned`],
    /// or a close or transport error observed while waiting. A token whose
    /// channel was closed after the publish yields
    /// [`SessionError::ChannelClosed`] without touching the channel.
    pub async fn publish_end(&mut self, token: PublishToken) -> Result<()> {
        self.check_is_connected()?;
        if !self.pool.is_held(token.channel, token.generation) {
            return Err(self.stale_token(&token));
        }
        if self.config.publisher_confirms {
            self.await_publish_confirm(token.channel).await
        } else {
            self.finish_confirm(token.channel);
            Ok(())
        }
    }

    /// Wait for the broker's verdict on the latest publish on `channel`.
    ///
    /// Confirms owed by earlier abandoned waits are settled first. Every exit
    /// path releases the channel unless the channel itself was closed; a
    /// failed wait leaves its confirm owed.
    ///
    /// # Errors
    ///
    /// See [`Self::publish_end`].
    pub async fn await_publish_confirm(&mut self, channel: ChannelId) -> Result<()> {
        let generation = self.pool.state(channel).map(|state| state.generation);
        let outcome = self.confirm_latest(channel).await;
        if outcome.is_err()
            && generation.is_some_and(|generation| self.pool.is_held(channel, generation))
        {
            self.defer_confirm(channel);
        }
        outcome
    }

    async fn confirm_latest(&mut self, channel: ChannelId) -> Result<()> {
        self.settle_owed_confirms(channel).await?;
        if self
            .pool
            .state_mut(channel)
            .is_some_and(|state| state.take_banked_ack())
        {
            metrics::inc_confirms(ConfirmOutcome::Ack);
            self.finish_confirm(channel);
            return Ok(());
        }

        let reply = self
            .wait_for_method(&[channel], &CONFIRM_REPLIES, None)
            .await?;
        match required(reply)?.into_method() {
            Some(Method::BasicAck { delivery_tag, .. }) => {
                self.record_ack(channel, delivery_tag);
                metrics::inc_confirms(ConfirmOutcome::Ack);
                self.finish_confirm(channel);
                Ok(())
            }
            Some(Method::BasicNack { delivery_tag, .. }) => {
                // A multiple nack covers several publishes but fails only this one.
                if let Some(state) = self.pool.state_mut(channel) {
                    state.last_delivery_tag = delivery_tag;
                }
                metrics::inc_confirms(ConfirmOutcome::Nack);
                self.finish_confirm(channel);
                Err(SessionError::MessageNacked { delivery_tag })
            }
            Some(Method::BasicReturn(returned)) => {
                let message = self.read_content(channel).await?;
                let ack = self
                    .wait_for_method(&[channel], &[MethodId::BASIC_ACK], None)
                    .await?;
                if let Some(Method::BasicAck { delivery_tag, .. }) = required(ack)?.as_method() {
                    self.record_ack(channel, *delivery_tag);
                }
                metrics::inc_confirms(ConfirmOutcome::Return);
                self.finish_confirm(channel);
                Err(SessionError::MessageReturned(Box::new(ReturnedMessage {
                    message,
                    reply_code: returned.reply_code,
                    reply_text: returned.reply_text,
                    exchange: returned.exchange,
                    routing_key: returned.routing_key,
                })))
            }
            other => Err(SessionError::violation(
                channel,
                Violation::UnexpectedMethod {
                    id: other.map_or(MethodId::BASIC_ACK, |method| method.id()),
                },
            )),
        }
    }

    /// Consume the confirms owed on `channel` by earlier abandoned waits.
    async fn settle_owed_confirms(&mut self, channel: ChannelId) -> Result<()> {
        while self
            .pool
            .state(channel)
            .is_some_and(|state| state.owed_confirms > 0)
        {
            if !self
                .pool
                .state_mut(channel)
                .is_some_and(ChannelState::take_banked_ack)
            {
                let reply = self
                    .wait_for_method(&[channel], &CONFIRM_REPLIES, None)
                    .await?;
                match required(reply)?.into_method() {
                    Some(Method::BasicAck { delivery_tag, .. }) => {
                        self.record_ack(channel, delivery_tag);
                    }
                    Some(Method::BasicNack { delivery_tag, .. }) => {
                        if let Some(state) = self.pool.state_mut(channel) {
                            state.last_delivery_tag = delivery_tag;
                        }
                    }
                    Some(Method::BasicReturn(_)) => {
                        self.read_content(channel).await?;
                        let ack = self
                            .wait_for_method(&[channel], &[MethodId::BASIC_ACK], None)
                            .await?;
                        if let Some(Method::BasicAck { delivery_tag, .. }) =
                            required(ack)?.as_method()
                        {
                            self.record_ack(channel, *delivery_tag);
                        }
                    }
                    _ => {}
                }
            }
            if let Some(state) = self.pool.state_mut(channel) {
                state.owed_confirms = state.owed_confirms.saturating_sub(1);
            }
            debug!("settled owed confirm: channel={channel}");
        }
        Ok(())
    }

    /// Leave the pending confirm owed on `channel` and hand the channel back.
    fn defer_confirm(&mut self, channel: ChannelId) {
        if let Some(state) = self.pool.state_mut(channel) {
            state.owed_confirms += 1;
        }
        warn!("confirm wait abandoned, confirm left owed: channel={channel}");
        self.release_channel(channel);
        self.maybe_release_buffers(channel);
    }

    fn stale_token(&self, token: &PublishToken) -> SessionError {
        let channel = token.channel;
        let reason = self
            .pool
            .state(channel)
            .and_then(|state| state.close_reason.clone())
            .unwrap_or_default();
        debug!("publish token outlived its channel: channel={channel}, reason={reason}");
        SessionError::ChannelClosed { channel, reason }
    }

    /// Apply ack bookkeeping for `delivery_tag` on `channel`.
    fn record_ack(&mut self, channel: ChannelId, delivery_tag: u64) {
        let Some(state) = self.pool.state_mut(channel) else {
            return;
        };
        if !state.record_ack(delivery_tag) {
            warn!(
                "ignoring duplicate or out-of-order ack: channel={channel}, \
                 delivery_tag={delivery_tag}, last_delivery_tag={}",
                state.last_delivery_tag
            );
        }
    }

    fn finish_confirm(&mut self, channel: ChannelId) {
        self.release_channel(channel);
        self.maybe_release_buffers(channel);
    }

    /// Send the content header and the body, split to fit the frame limit.
    async fn send_content(&mut self, channel: ChannelId, message: &BasicMessage) -> Result<()> {
        let body = &message.body;
        let header = ContentHeader::basic(
            body.len() as u64,
            RawProperties::from(&message.properties),
        );
        self.transport.send(Frame::header(channel, header)).await?;

        let fragment = fragment_size(self.transport.frame_max());
        let mut offset = 0;
        while offset < body.len() {
            let end = body.len().min(offset.saturating_add(fragment));
            self.transport
                .send(Frame::body(channel, body.slice(offset..end)))
                .await?;
            offset = end;
        }
        Ok(())
    }
}

/// Largest body fragment that fits in one frame; 0 means unlimited.
fn fragment_size(frame_max: u32) -> usize {
    if frame_max == 0 {
        return usize::MAX;
    }
    let payload = frame_max.saturating_sub(FRAME_OVERHEAD).max(1);
    usize::try_from(payload).unwrap_or(usize::MAX)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::fragment_size;

    #[rstest]
    #[case(0, usize::MAX)]
    #[case(131_072, 131_064)]
    #[case(4096, 4088)]
    #[case(9, 1)]
    #[case(8, 1)]
    fn fragment_size_leaves_room_for_framing(#[case] frame_max: u32, #[case] expected: usize) {
        assert_eq!(fragment_size(frame_max), expected);
    }
}
