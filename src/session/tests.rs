//! Unit tests for session establishment.

use rstest::rstest;

use super::{Session, SessionBuilder};
use crate::{
    broker_version::BrokerVersion,
    config::SessionConfig,
    error::{SessionError, TransportError, Violation},
    frame::{CloseReason, Frame, Method, MethodId},
    properties::{FieldTable, FieldValue},
    transport::{MemoryTransport, RpcReply},
};

#[test]
fn builder_setters_override_defaults() {
    let builder = Session::builder()
        .publisher_confirms(false)
        .direct_reply_queue("reply.local");
    assert_eq!(
        builder.config,
        SessionConfig {
            publisher_confirms: false,
            direct_reply_queue: "reply.local".into(),
        }
    );
}

#[tokio::test]
async fn establish_reads_broker_version() {
    let mut properties = FieldTable::new();
    properties.insert("version".into(), FieldValue::LongString("3.13.1".into()));
    let (transport, _broker) = MemoryTransport::builder()
        .server_properties(properties)
        .build();

    let session = SessionBuilder::new()
        .establish(transport, RpcReply::Normal)
        .await
        .expect("establish");
    assert!(session.is_connected());
    assert_eq!(session.broker_version(), BrokerVersion::new(3, 13, 1));
}

#[tokio::test]
async fn login_refusal_acknowledges_connection_close() {
    let (transport, mut broker) = MemoryTransport::pair();
    let reason = CloseReason::new(403, "ACCESS_REFUSED");

    let err = SessionBuilder::new()
        .establish(
            transport,
            RpcReply::ServerException(Method::ConnectionClose(reason.clone())),
        )
        .await
        .expect_err("login refused");

    assert!(matches!(err, SessionError::ConnectionClosedByBroker { reason: r } if r == reason));
    assert_eq!(
        broker.recv().await,
        Some(Frame::method(0, Method::ConnectionCloseOk))
    );
}

#[rstest]
#[case(RpcReply::TransportFailure(TransportError::Disconnected))]
#[case(RpcReply::ServerException(Method::ChannelOpenOk))]
#[tokio::test]
async fn failed_login_is_mapped(#[case] reply: RpcReply) {
    let expect_violation = matches!(reply, RpcReply::ServerException(_));
    let (transport, _broker) = MemoryTransport::pair();

    let err = SessionBuilder::new()
        .establish(transport, reply)
        .await
        .expect_err("login failed");

    if expect_violation {
        assert!(matches!(
            err,
            SessionError::ProtocolViolation {
                channel: 0,
                detail: Violation::UnexpectedMethod {
                    id: MethodId::CHANNEL_OPEN_OK
                }
            }
        ));
    } else {
        assert!(matches!(
            err,
            SessionError::Transport(TransportError::Disconnected)
        ));
    }
}
