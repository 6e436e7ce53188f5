//! Builders for the broker frames tests script most often.

use amqp_session::{
    ChannelId,
    CloseReason,
    Frame,
    Method,
    frame::{BasicDeliver, BasicReturn},
    properties::{ContentHeader, RawProperties},
};
use bytes::Bytes;

/// `channel.open-ok`, followed by `confirm.select-ok` when `confirms` is set.
#[must_use]
pub fn open_replies(channel: ChannelId, confirms: bool) -> Vec<Frame> {
    let mut frames = vec![Frame::method(channel, Method::ChannelOpenOk)];
    if confirms {
        frames.push(Frame::method(channel, Method::ConfirmSelectOk));
    }
    frames
}

#[must_use]
pub fn ack(channel: ChannelId, delivery_tag: u64) -> Frame {
    Frame::method(
        channel,
        Method::BasicAck {
            delivery_tag,
            multiple: false,
        },
    )
}

/// A cumulative ack covering every tag up to `delivery_tag`.
#[must_use]
pub fn ack_multiple(channel: ChannelId, delivery_tag: u64) -> Frame {
    Frame::method(
        channel,
        Method::BasicAck {
            delivery_tag,
            multiple: true,
        },
    )
}

#[must_use]
pub fn nack(channel: ChannelId, delivery_tag: u64, multiple: bool) -> Frame {
    Frame::method(
        channel,
        Method::BasicNack {
            delivery_tag,
            multiple,
            requeue: false,
        },
    )
}

#[must_use]
pub fn consume_ok(channel: ChannelId, consumer_tag: &str) -> Frame {
    Frame::method(
        channel,
        Method::BasicConsumeOk {
            consumer_tag: consumer_tag.to_owned(),
        },
    )
}

#[must_use]
pub fn cancel_ok(channel: ChannelId, consumer_tag: &str) -> Frame {
    Frame::method(
        channel,
        Method::BasicCancelOk {
            consumer_tag: consumer_tag.to_owned(),
        },
    )
}

#[must_use]
pub fn deliver(channel: ChannelId, consumer_tag: &str, delivery_tag: u64) -> Frame {
    Frame::method(
        channel,
        Method::BasicDeliver(BasicDeliver {
            consumer_tag: consumer_tag.to_owned(),
            delivery_tag,
            redelivered: false,
            exchange: "amq.direct".into(),
            routing_key: "jobs".into(),
        }),
    )
}

#[must_use]
pub fn basic_return(
    channel: ChannelId,
    reply_code: u16,
    reply_text: &str,
    exchange: &str,
    routing_key: &str,
) -> Frame {
    Frame::method(
        channel,
        Method::BasicReturn(BasicReturn {
            reply_code,
            reply_text: reply_text.to_owned(),
            exchange: exchange.to_owned(),
            routing_key: routing_key.to_owned(),
        }),
    )
}

/// A content header with no properties set.
#[must_use]
pub fn header(channel: ChannelId, body_size: u64) -> Frame {
    Frame::header(channel, ContentHeader::basic(body_size, RawProperties::default()))
}

#[must_use]
pub fn body(channel: ChannelId, fragment: &'static [u8]) -> Frame {
    Frame::body(channel, Bytes::from_static(fragment))
}

/// A header announcing the total size of `fragments`, then one body frame per
/// fragment.
#[must_use]
pub fn content(channel: ChannelId, fragments: &[&'static [u8]]) -> Vec<Frame> {
    let size: usize = fragments.iter().map(|fragment| fragment.len()).sum();
    let mut frames = vec![header(channel, size as u64)];
    frames.extend(fragments.iter().map(|&fragment| body(channel, fragment)));
    frames
}

#[must_use]
pub fn channel_close(channel: ChannelId, reply_code: u16, reply_text: &str) -> Frame {
    Frame::method(
        channel,
        Method::ChannelClose(CloseReason::new(reply_code, reply_text)),
    )
}

#[must_use]
pub fn connection_close(reply_code: u16, reply_text: &str) -> Frame {
    Frame::method(
        0,
        Method::ConnectionClose(CloseReason::new(reply_code, reply_text)),
    )
}
