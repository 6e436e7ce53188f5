//! Tests for request/reply sequencing and the frame queue under interleaving.

use std::time::Duration;

use amqp_session::{
    CloseReason,
    Frame,
    Method,
    MethodId,
    RpcReply,
    SessionError,
    TransportError,
    Violation,
};
use amqp_session_testing::{ScriptedTransport, establish, frames};
use bytes::Bytes;

const QUEUE_DECLARE: MethodId = MethodId::new(50, 10);
const QUEUE_DECLARE_OK: MethodId = MethodId::new(50, 11);

fn other(id: MethodId, arguments: &'static [u8]) -> Method {
    Method::Other {
        id,
        arguments: Bytes::from_static(arguments),
    }
}

#[tokio::test]
async fn opaque_methods_round_trip_through_do_rpc() {
    let reply = Frame::method(1, other(QUEUE_DECLARE_OK, b"q-1"));
    let mut session = establish(ScriptedTransport::with_frames([reply.clone()]), true).await;

    let frame = session
        .do_rpc(1, other(QUEUE_DECLARE, b"declare"), &[QUEUE_DECLARE_OK])
        .await
        .expect("rpc");

    assert_eq!(frame, reply);
    assert_eq!(
        session.transport().sent(),
        &[Frame::method(1, other(QUEUE_DECLARE, b"declare"))]
    );
}

#[tokio::test]
async fn frames_for_other_channels_are_parked_in_order() {
    let script = [
        frames::ack(3, 1),
        frames::ack(2, 1),
        frames::ack(3, 2),
        Frame::method(2, Method::ConfirmSelectOk),
    ];
    let mut session = establish(ScriptedTransport::with_frames(script), true).await;

    session
        .do_rpc(
            2,
            Method::ConfirmSelect { nowait: false },
            &[MethodId::CONFIRM_SELECT_OK],
        )
        .await
        .expect("rpc");

    assert_eq!(session.frame_queue().len(), 3);
    let reads = session.transport().reads();

    let first = session
        .next_frame_on_channel(3, None)
        .await
        .expect("parked frame")
        .expect("frame present");
    let second = session
        .next_frame_on_channel(3, None)
        .await
        .expect("parked frame")
        .expect("frame present");
    assert_eq!((first, second), (frames::ack(3, 1), frames::ack(3, 2)));
    assert_eq!(session.transport().reads(), reads);
    assert!(session.frame_queue().has_frames_for(2));
}

#[tokio::test]
async fn parked_reply_satisfies_a_later_rpc_without_reading() {
    let script = [
        Frame::method(4, Method::ChannelOpenOk),
        Frame::method(2, Method::ChannelOpenOk),
    ];
    let mut session = establish(ScriptedTransport::with_frames(script), true).await;

    session
        .do_rpc(2, Method::ChannelOpen, &[MethodId::CHANNEL_OPEN_OK])
        .await
        .expect("channel 2");
    let reads = session.transport().reads();
    session
        .do_rpc(4, Method::ChannelOpen, &[MethodId::CHANNEL_OPEN_OK])
        .await
        .expect("channel 4");

    assert_eq!(session.transport().reads(), reads);
    assert!(session.frame_queue().is_empty());
}

#[tokio::test]
async fn close_on_an_unrelated_channel_aborts_the_wait() {
    let script = [frames::channel_close(5, 406, "PRECONDITION_FAILED")];
    let mut session = establish(ScriptedTransport::with_frames(script), true).await;

    let err = session
        .do_rpc(2, Method::ChannelOpen, &[MethodId::CHANNEL_OPEN_OK])
        .await
        .expect_err("close observed");

    assert!(matches!(
        err,
        SessionError::ChannelClosed { channel: 5, ref reason }
            if reason.kind() == amqp_session::ReplyCode::PreconditionFailed
    ));
    assert!(
        session
            .transport()
            .sent()
            .contains(&Frame::method(5, Method::ChannelCloseOk))
    );
}

#[tokio::test]
async fn bounded_wait_returns_none_and_keeps_unrelated_frames() {
    let mut session = establish(ScriptedTransport::with_frames([frames::ack(2, 1)]), true).await;

    let frame = session
        .wait_for_method(&[1], &[MethodId::BASIC_ACK], Some(Duration::from_millis(10)))
        .await
        .expect("bounded wait");

    assert_eq!(frame, None);
    assert_eq!(session.frame_queue().len(), 1);
}

#[tokio::test]
async fn bounded_read_timeout_is_not_an_error() {
    let mut session = establish(ScriptedTransport::new(), true).await;
    let frame = session
        .next_frame_from_broker(Some(Duration::from_millis(5)))
        .await
        .expect("timeout");
    assert_eq!(frame, None);
}

#[tokio::test]
async fn unbounded_read_without_frames_is_a_disconnect() {
    let mut session = establish(ScriptedTransport::new(), true).await;
    let err = session
        .do_rpc(1, Method::ChannelOpen, &[MethodId::CHANNEL_OPEN_OK])
        .await
        .expect_err("script exhausted");
    assert!(matches!(
        err,
        SessionError::Transport(TransportError::Disconnected)
    ));
}

#[tokio::test]
async fn send_failure_surfaces_as_transport_error() {
    let mut session = establish(ScriptedTransport::new(), true).await;
    session.transport_mut().fail_sends(true);
    let err = session
        .do_rpc(1, Method::ChannelOpen, &[MethodId::CHANNEL_OPEN_OK])
        .await
        .expect_err("send failed");
    assert!(matches!(err, SessionError::Transport(_)));
}

#[tokio::test]
async fn normal_reply_is_accepted() {
    let mut session = establish(ScriptedTransport::new(), true).await;
    session
        .check_rpc_reply(1, RpcReply::Normal)
        .await
        .expect("normal");
    assert!(session.transport().sent().is_empty());
}

#[tokio::test]
async fn server_channel_close_reply_runs_the_handshake() {
    let mut session = establish(ScriptedTransport::new(), true).await;
    let reason = CloseReason::new(403, "ACCESS_REFUSED");

    let err = session
        .check_rpc_reply(3, RpcReply::ServerException(Method::ChannelClose(reason)))
        .await
        .expect_err("channel closed");

    assert!(matches!(err, SessionError::ChannelClosed { channel: 3, .. }));
    assert_eq!(
        session.transport().sent(),
        &[Frame::method(3, Method::ChannelCloseOk)]
    );
    assert!(session.is_connected());
}

#[tokio::test]
async fn unexpected_server_method_is_a_protocol_violation() {
    let mut session = establish(ScriptedTransport::new(), true).await;
    let err = session
        .check_rpc_reply(
            1,
            RpcReply::ServerException(Method::BasicCancelOk {
                consumer_tag: "x".into(),
            }),
        )
        .await
        .expect_err("violation");
    assert!(matches!(
        err,
        SessionError::ProtocolViolation {
            channel: 1,
            detail: Violation::UnexpectedMethod {
                id: MethodId::BASIC_CANCEL_OK
            }
        }
    ));
}
