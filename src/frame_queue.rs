//! Parking area for frames read ahead of the operation that needs them.
//!
//! Frames land here when they arrive for a channel or method other than the
//! one currently awaited. Relative order is preserved per channel; frames of
//! different channels may interleave. Each push re-checks the frame's channel
//! for a fully received `basic.deliver` and promotes it to the delivered list
//! so message-polling APIs can pick it up without touching the transport.

use std::collections::VecDeque;

use crate::{
    content::ContentAssembly,
    error::{Result, SessionError, Violation},
    frame::{ChannelId, Frame, FrameKind, FramePayload, Method, MethodId},
    message::Envelope,
};

/// Ordered buffer of unconsumed frames plus the completed deliveries
/// extracted from it.
#[derive(Debug, Default)]
pub struct FrameQueue {
    frames: VecDeque<Frame>,
    delivered: VecDeque<Envelope>,
}

impl FrameQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Append a frame, promoting a delivery on its channel if one is now
    /// complete.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::ProtocolViolation`] when the frames queued after
    /// a `basic.deliver` are not a header followed by body fragments.
    pub fn push(&mut self, frame: Frame) -> Result<()> {
        let channel = frame.channel;
        self.frames.push_back(frame);
        crate::metrics::inc_frames_parked();

        while let Some(positions) = self.complete_delivery(channel)? {
            let envelope = self.extract_delivery(channel, &positions)?;
            log::debug!(
                "promoted delivery: channel={channel}, delivery_tag={}",
                envelope.delivery_tag
            );
            self.delivered.push_back(envelope);
        }
        Ok(())
    }

    /// Remove and return the first frame satisfying `predicate`.
    pub fn take_first(&mut self, predicate: impl FnMut(&Frame) -> bool) -> Option<Frame> {
        let index = self.frames.iter().position(predicate)?;
        self.frames.remove(index)
    }

    /// Remove the first method frame on one of `channels` whose id is in
    /// `expected`.
    pub fn take_method(&mut self, channels: &[ChannelId], expected: &[MethodId]) -> Option<Frame> {
        self.take_first(|frame| frame.matches(channels, expected))
    }

    /// Remove the first frame of any kind on `channel`.
    pub fn take_on_channel(&mut self, channel: ChannelId) -> Option<Frame> {
        self.take_first(|frame| frame.channel == channel)
    }

    /// Returns `true` if any frame for `channel` is still parked.
    #[must_use]
    pub fn has_frames_for(&self, channel: ChannelId) -> bool {
        self.frames.iter().any(|frame| frame.channel == channel)
    }

    /// Pop the oldest completed delivery on one of `channels`.
    pub fn pop_delivered(&mut self, channels: &[ChannelId]) -> Option<Envelope> {
        let index = self
            .delivered
            .iter()
            .position(|envelope| channels.contains(&envelope.channel))?;
        self.delivered.remove(index)
    }

    /// Number of parked frames.
    #[must_use]
    pub fn len(&self) -> usize { self.frames.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.frames.is_empty() }

    /// Number of completed deliveries waiting to be polled.
    #[must_use]
    pub fn delivered_len(&self) -> usize { self.delivered.len() }

    /// Drop every parked frame and delivery belonging to `channel`.
    pub(crate) fn discard_channel(&mut self, channel: ChannelId) {
        self.frames.retain(|frame| frame.channel != channel);
        self.delivered.retain(|envelope| envelope.channel != channel);
    }

    /// Locate a fully received delivery on `channel`, returning the queue
    /// positions of its deliver, header and body frames in order.
    fn complete_delivery(&self, channel: ChannelId) -> Result<Option<Vec<usize>>> {
        let mut on_channel = self
            .frames
            .iter()
            .enumerate()
            .filter(|(_, frame)| frame.channel == channel);
        let Some((deliver, _)) = on_channel
            .by_ref()
            .find(|(_, frame)| frame.is_method(MethodId::BASIC_DELIVER))
        else {
            return Ok(None);
        };

        let Some((header_at, header)) = on_channel.next() else {
            return Ok(None);
        };
        let FramePayload::Header(header) = &header.payload else {
            return Err(SessionError::violation(
                channel,
                Violation::ExpectedHeader {
                    found: header.kind(),
                },
            ));
        };

        let mut positions = vec![deliver, header_at];
        let mut received = 0u64;
        while received < header.body_size {
            let Some((index, frame)) = on_channel.next() else {
                return Ok(None);
            };
            let FramePayload::Body(fragment) = &frame.payload else {
                return Err(SessionError::violation(
                    channel,
                    Violation::ExpectedBody {
                        found: frame.kind(),
                    },
                ));
            };
            received += fragment.len() as u64;
            positions.push(index);
        }
        Ok(Some(positions))
    }

    /// Remove the frames at `positions` (ascending) and reassemble them.
    fn extract_delivery(&mut self, channel: ChannelId, positions: &[usize]) -> Result<Envelope> {
        let mut frames: Vec<Frame> = positions
            .iter()
            .rev()
            .filter_map(|&index| self.frames.remove(index))
            .collect();
        frames.reverse();
        let mut frames = frames.into_iter();

        let deliver = match frames.next().and_then(Frame::into_method) {
            Some(Method::BasicDeliver(deliver)) => deliver,
            other => {
                let id = other.map_or(MethodId::BASIC_DELIVER, |method| method.id());
                return Err(SessionError::violation(channel, Violation::UnexpectedMethod { id }));
            }
        };
        let header = frames.next().ok_or_else(|| {
            SessionError::violation(
                channel,
                Violation::ExpectedHeader {
                    found: FrameKind::Method,
                },
            )
        })?;
        let mut assembly = ContentAssembly::from_header(header)?;
        for fragment in frames {
            assembly.push(fragment)?;
        }

        Ok(Envelope {
            message: assembly.into_message(),
            consumer_tag: deliver.consumer_tag,
            delivery_tag: deliver.delivery_tag,
            redelivered: deliver.redelivered,
            exchange: deliver.exchange,
            routing_key: deliver.routing_key,
            channel,
        })
    }
}
