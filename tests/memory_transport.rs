//! End-to-end tests driving a session over `MemoryTransport` against a
//! spawned fake broker.

use std::{collections::HashMap, time::Duration};

use amqp_session::{
    BasicMessage,
    ChannelId,
    ConsumeOptions,
    Frame,
    FramePayload,
    Method,
    MemoryTransport,
    PublishOptions,
    RpcReply,
    Session,
    SessionError,
    TransportError,
    transport::BrokerHandle,
};
use amqp_session_testing::frames;
use tokio::task::JoinHandle;

/// Answers opens, confirm selects, consumes and closes. Every body frame is
/// treated as a complete publish and acked. A consumer on `jobs` receives one
/// message.
async fn run_broker(mut broker: BrokerHandle) {
    let mut delivery_tags: HashMap<ChannelId, u64> = HashMap::new();
    while let Some(frame) = broker.recv().await {
        let channel = frame.channel;
        let mut closing = false;
        let replies = match frame.payload {
            FramePayload::Method(Method::ChannelOpen) => {
                vec![Frame::method(channel, Method::ChannelOpenOk)]
            }
            FramePayload::Method(Method::ConfirmSelect { .. }) => {
                vec![Frame::method(channel, Method::ConfirmSelectOk)]
            }
            FramePayload::Method(Method::BasicConsume(consume)) => {
                let tag = format!("amq.ctag-{channel}");
                let mut replies = vec![frames::consume_ok(channel, &tag)];
                if consume.queue == "jobs" {
                    replies.push(frames::deliver(channel, &tag, 1));
                    replies.extend(frames::content(channel, &[&b"job-1"[..]]));
                }
                replies
            }
            FramePayload::Method(Method::ConnectionClose(_)) => {
                closing = true;
                vec![Frame::method(0, Method::ConnectionCloseOk)]
            }
            FramePayload::Body(_) => {
                let tag = delivery_tags.entry(channel).or_default();
                *tag += 1;
                vec![frames::ack(channel, *tag)]
            }
            _ => Vec::new(),
        };
        for reply in replies {
            if broker.send(reply).await.is_err() {
                return;
            }
        }
        if closing {
            return;
        }
    }
}

async fn connect() -> (Session<MemoryTransport>, JoinHandle<()>) {
    let (transport, broker) = MemoryTransport::pair();
    let task = tokio::spawn(run_broker(broker));
    let session = Session::builder()
        .establish(transport, RpcReply::Normal)
        .await
        .expect("establish");
    (session, task)
}

#[tokio::test]
async fn publish_and_consume_over_memory_transport() {
    let (mut session, broker) = connect().await;

    for _ in 0..3 {
        session
            .basic_publish(
                "amq.direct",
                "jobs",
                &BasicMessage::new(&b"payload"[..]),
                PublishOptions::default(),
            )
            .await
            .expect("publish confirmed");
    }
    assert_eq!(
        session.channel_state(1).map(|state| state.last_delivery_tag),
        Some(3)
    );

    let tag = session
        .basic_consume("jobs", ConsumeOptions::default())
        .await
        .expect("consume");
    assert_eq!(tag, "amq.ctag-1");
    let envelope = session
        .consume_message(&[tag.as_str()], Some(Duration::from_secs(5)))
        .await
        .expect("poll")
        .expect("delivery");
    assert_eq!(&envelope.message.body[..], b"job-1");
    assert_eq!(envelope.channel, 1);

    session.close().await.expect("close");
    assert!(!session.is_connected());
    broker.await.expect("broker task");
}

#[tokio::test(start_paused = true)]
async fn idle_consumer_times_out() {
    let (mut session, _broker) = connect().await;
    let tag = session
        .basic_consume("idle", ConsumeOptions::default())
        .await
        .expect("consume");

    let polled = session
        .consume_message(&[tag.as_str()], Some(Duration::from_secs(30)))
        .await
        .expect("timeout");

    assert!(polled.is_none());
    assert!(session.is_connected());
}

#[tokio::test]
async fn vanished_broker_is_a_transport_error() {
    let (transport, broker) = MemoryTransport::pair();
    drop(broker);
    let mut session = Session::builder()
        .establish(transport, RpcReply::Normal)
        .await
        .expect("establish");

    let err = session.acquire_channel().await.expect_err("no broker");

    assert!(matches!(
        err,
        SessionError::Transport(TransportError::Disconnected)
    ));
}
