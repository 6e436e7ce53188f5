//! Tests for channel acquisition, reuse and the close handshakes.

use amqp_session::{Availability, CloseReason, Frame, Method, SessionError};
use amqp_session_testing::{LoggerHandle, ScriptedTransport, establish, frames, logger};
use log::Level;
use rstest::rstest;
use serial_test::serial;

#[rstest]
#[case(true)]
#[case(false)]
#[tokio::test]
async fn acquire_opens_a_channel(#[case] confirms: bool) {
    let transport = ScriptedTransport::with_frames(frames::open_replies(1, confirms));
    let mut session = establish(transport, confirms).await;

    let channel = session.acquire_channel().await.expect("acquire");

    assert_eq!(channel, 1);
    let mut expected = vec![Frame::method(1, Method::ChannelOpen)];
    if confirms {
        expected.push(Frame::method(1, Method::ConfirmSelect { nowait: false }));
    }
    assert_eq!(session.transport().sent(), expected.as_slice());
    assert_eq!(
        session.channel_state(1).map(|state| state.availability),
        Some(Availability::Used)
    );
}

#[tokio::test]
async fn released_channel_is_reused_without_reopening() {
    let transport = ScriptedTransport::with_frames(frames::open_replies(1, true));
    let mut session = establish(transport, true).await;

    let first = session.acquire_channel().await.expect("acquire");
    session.release_channel(first);
    let sent = session.transport().sent().len();
    let second = session.acquire_channel().await.expect("reacquire");

    assert_eq!(first, second);
    assert_eq!(session.transport().sent().len(), sent);
}

#[tokio::test]
async fn checked_out_channels_are_distinct() {
    let mut script = frames::open_replies(1, true);
    script.extend(frames::open_replies(2, true));
    let mut session = establish(ScriptedTransport::with_frames(script), true).await;

    let a = session.acquire_channel().await.expect("first");
    let b = session.acquire_channel().await.expect("second");

    assert_eq!((a, b), (1, 2));
}

#[tokio::test]
async fn channel_max_limits_new_channels() {
    let transport = ScriptedTransport::with_frames(frames::open_replies(1, true)).channel_max(1);
    let mut session = establish(transport, true).await;

    session.acquire_channel().await.expect("first channel");
    let err = session.acquire_channel().await.expect_err("limit reached");

    assert!(matches!(err, SessionError::TooManyChannels { channel_max: 1 }));
}

#[tokio::test]
async fn broker_refusing_open_leaves_channel_closed() {
    let transport =
        ScriptedTransport::with_frames([frames::channel_close(1, 504, "CHANNEL_ERROR")]);
    let mut session = establish(transport, true).await;

    let err = session.acquire_channel().await.expect_err("open refused");

    assert!(matches!(
        err,
        SessionError::ChannelClosed { channel: 1, ref reason } if reason.reply_code == 504
    ));
    assert!(!session.is_channel_open(1));
    assert_eq!(
        session.transport().sent().last(),
        Some(&Frame::method(1, Method::ChannelCloseOk))
    );
    assert!(session.is_connected());
}

#[tokio::test]
async fn client_close_channel_frees_the_id() {
    let mut script = frames::open_replies(1, false);
    script.push(Frame::method(1, Method::ChannelCloseOk));
    script.extend(frames::open_replies(1, false));
    let mut session = establish(ScriptedTransport::with_frames(script), false).await;

    let channel = session.acquire_channel().await.expect("acquire");
    session.close_channel(channel).await.expect("close channel");
    assert!(!session.is_channel_open(channel));
    assert!(session.transport().sent().contains(&Frame::method(
        1,
        Method::ChannelClose(CloseReason::new(200, "OK"))
    )));

    let reopened = session.acquire_channel().await.expect("reopen");
    assert_eq!(reopened, channel);
    assert_eq!(session.transport().remaining(), 0);
}

#[tokio::test]
async fn closing_an_unopened_channel_is_a_no_op() {
    let mut session = establish(ScriptedTransport::new(), true).await;
    session.close_channel(7).await.expect("no-op");
    assert!(session.transport().sent().is_empty());
}

#[tokio::test]
async fn client_close_disconnects() {
    let transport = ScriptedTransport::with_frames([Frame::method(0, Method::ConnectionCloseOk)]);
    let mut session = establish(transport, true).await;

    session.close().await.expect("close");

    assert!(!session.is_connected());
    assert!(matches!(
        session.acquire_channel().await,
        Err(SessionError::ConnectionClosed)
    ));
    assert!(matches!(session.close().await, Err(SessionError::ConnectionClosed)));
}

#[tokio::test]
async fn broker_connection_close_disconnects() {
    let transport =
        ScriptedTransport::with_frames([frames::connection_close(320, "CONNECTION_FORCED")]);
    let mut session = establish(transport, true).await;

    let err = session.acquire_channel().await.expect_err("connection closed");

    assert!(matches!(err, SessionError::ConnectionClosedByBroker { .. }));
    assert!(err.is_connection_fatal());
    assert!(!session.is_connected());
    assert_eq!(
        session.transport().sent().last(),
        Some(&Frame::method(0, Method::ConnectionCloseOk))
    );
    assert!(matches!(
        session.consume_message(&[], None).await,
        Err(SessionError::ConnectionClosed)
    ));
}

#[tokio::test]
async fn failed_close_ok_send_still_reports_the_close() {
    let transport =
        ScriptedTransport::with_frames([frames::connection_close(320, "CONNECTION_FORCED")]);
    let mut session = establish(transport, true).await;
    session.transport_mut().fail_sends(true);

    let err = session
        .next_frame_on_channel(0, None)
        .await
        .expect_err("close observed");

    assert!(matches!(err, SessionError::ConnectionClosedByBroker { .. }));
    assert!(!session.is_connected());
}

#[rstest]
#[serial(session_logs)]
#[tokio::test]
async fn releasing_the_connection_channel_is_logged(mut logger: LoggerHandle) {
    let mut session = establish(ScriptedTransport::new(), true).await;
    logger.drain();

    session.release_channel(0);
    session.release_channel(42);

    let warnings = logger.messages_at(Level::Warn);
    assert!(
        warnings
            .iter()
            .any(|message| message.contains("connection channel")),
        "missing sentinel warning: {warnings:?}"
    );
    assert!(
        warnings
            .iter()
            .any(|message| message.contains("unknown channel: channel=42")),
        "missing unknown channel warning: {warnings:?}"
    );
}
