//! Consumers, direct reply-to and message polling.

use std::time::Duration;

use log::debug;

use super::Session;
use crate::{
    channel::Availability,
    error::{Result, SessionError, Violation},
    frame::{BasicConsume, ChannelId, Frame, Method, MethodId},
    message::Envelope,
    transport::FrameTransport,
};

/// Settings for [`Session::basic_consume`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConsumeOptions {
    /// Requested consumer tag; empty lets the broker choose one.
    pub consumer_tag: String,
    pub no_local: bool,
    pub no_ack: bool,
    pub exclusive: bool,
}

impl<T: FrameTransport> Session<T> {
    /// Subscribe `channel` to the direct reply-to pseudo-queue.
    ///
    /// Does nothing when the channel already holds a subscription.
    ///
    /// # Errors
    ///
    /// Returns any error from the `basic.consume` exchange.
    pub async fn subscribe_direct_reply(&mut self, channel: ChannelId) -> Result<()> {
        if self
            .pool
            .state(channel)
            .is_some_and(|state| state.direct_reply_tag.is_some())
        {
            return Ok(());
        }

        let consume = BasicConsume {
            queue: self.config.direct_reply_queue.clone(),
            consumer_tag: String::new(),
            no_local: true,
            no_ack: true,
            exclusive: true,
            nowait: false,
        };
        let reply = self
            .do_rpc(
                channel,
                Method::BasicConsume(consume),
                &[MethodId::BASIC_CONSUME_OK],
            )
            .await?;
        let tag = consumer_tag(channel, reply)?;
        self.maybe_release_buffers(channel);

        debug!("subscribed to direct reply-to: channel={channel}, consumer_tag={tag}");
        self.consumers.add(tag.clone(), channel);
        if let Some(state) = self.pool.state_mut(channel) {
            state.direct_reply_tag = Some(tag);
        }
        Ok(())
    }

    /// Start a consumer on `queue` using a dedicated channel.
    ///
    /// The channel stays checked out until [`Self::basic_cancel`].
    ///
    /// # Errors
    ///
    /// Returns any error from acquiring the channel or the `basic.consume`
    /// exchange.
    pub async fn basic_consume(&mut self, queue: &str, options: ConsumeOptions) -> Result<String> {
        let channel = self.acquire_channel().await?;
        let consume = BasicConsume {
            queue: queue.to_owned(),
            consumer_tag: options.consumer_tag,
            no_local: options.no_local,
            no_ack: options.no_ack,
            exclusive: options.exclusive,
            nowait: false,
        };
        let reply = self
            .do_rpc(
                channel,
                Method::BasicConsume(consume),
                &[MethodId::BASIC_CONSUME_OK],
            )
            .await
            .and_then(|frame| consumer_tag(channel, frame));

        match reply {
            Ok(tag) => {
                debug!("consumer started: channel={channel}, queue={queue}, consumer_tag={tag}");
                self.consumers.add(tag.clone(), channel);
                Ok(tag)
            }
            Err(error) => {
                if self.pool.availability(channel) == Some(Availability::Used) {
                    self.release_channel(channel);
                }
                Err(error)
            }
        }
    }

    /// Stop the consumer registered under `tag` and release its channel.
    ///
    /// Cancelling a direct reply-to subscription leaves the channel with
    /// whichever operation holds it.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::ConsumerTagNotFound`] for an unknown tag, or
    /// any error from the `basic.cancel` exchange.
    pub async fn basic_cancel(&mut self, tag: &str) -> Result<()> {
        self.check_is_connected()?;
        let channel = self.consumers.channel(tag)?;
        self.do_rpc(
            channel,
            Method::BasicCancel {
                consumer_tag: tag.to_owned(),
                nowait: false,
            },
            &[MethodId::BASIC_CANCEL_OK],
        )
        .await?;
        self.consumers.remove(tag)?;
        let direct_reply = match self
            .pool
            .state_mut(channel)
            .filter(|state| state.direct_reply_tag.as_deref() == Some(tag))
        {
            Some(state) => {
                state.direct_reply_tag = None;
                true
            }
            None => false,
        };
        // A direct reply-to subscription never owns its channel; the publish
        // that checked it out does.
        if !direct_reply {
            self.release_channel(channel);
        }
        self.maybe_release_buffers(channel);
        Ok(())
    }

    /// Wait up to `timeout` for a delivery to one of `tags`, or to any
    /// registered consumer when `tags` is empty.
    ///
    /// Completed deliveries parked during earlier waits are returned first.
    /// Returns `Ok(None)` when the timeout elapses or no consumer is
    /// registered.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::ConsumerTagNotFound`] for an unknown tag, and
    /// any close, transport or protocol error observed while waiting.
    pub async fn consume_message(
        &mut self,
        tags: &[&str],
        timeout: Option<Duration>,
    ) -> Result<Option<Envelope>> {
        self.check_is_connected()?;
        let channels = if tags.is_empty() {
            self.consumers.channels()
        } else {
            tags.iter()
                .map(|tag| self.consumers.channel(tag))
                .collect::<Result<Vec<_>>>()?
        };
        if channels.is_empty() {
            return Ok(None);
        }

        if let Some(envelope) = self.queue.pop_delivered(&channels) {
            return Ok(Some(envelope));
        }

        let Some(frame) = self
            .wait_for_method(&channels, &[MethodId::BASIC_DELIVER], timeout)
            .await?
        else {
            return Ok(None);
        };
        let channel = frame.channel;
        let Some(Method::BasicDeliver(deliver)) = frame.into_method() else {
            return Err(SessionError::violation(
                channel,
                Violation::UnexpectedMethod {
                    id: MethodId::BASIC_DELIVER,
                },
            ));
        };
        let message = self.read_content(channel).await?;
        Ok(Some(Envelope {
            message,
            consumer_tag: deliver.consumer_tag,
            delivery_tag: deliver.delivery_tag,
            redelivered: deliver.redelivered,
            exchange: deliver.exchange,
            routing_key: deliver.routing_key,
            channel,
        }))
    }
}

/// Extract the consumer tag from a `basic.consume-ok` reply.
fn consumer_tag(channel: ChannelId, reply: Frame) -> Result<String> {
    match reply.into_method() {
        Some(Method::BasicConsumeOk { consumer_tag }) => Ok(consumer_tag),
        other => Err(SessionError::violation(
            channel,
            Violation::UnexpectedMethod {
                id: other.map_or(MethodId::BASIC_CONSUME_OK, |method| method.id()),
            },
        )),
    }
}
