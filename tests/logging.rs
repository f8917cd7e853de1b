//! Lifecycle log output of `Connection`.

use log::Level;
use muxframe::{CancellationToken, Connection, CorrelationId, MessageType};
use muxframe_testing::{FramePeer, LoggerHandle, logger, memory_socket_pair, recv_expect};
use rstest::rstest;
use serial_test::serial;

#[rstest]
#[serial(connection_logs)]
#[tokio::test]
async fn open_and_close_are_logged(mut logger: LoggerHandle) {
    let (local, _remote) = memory_socket_pair();
    let conn = Connection::new(local);
    let id = conn.id().to_string();

    conn.dispose().await;

    let info = logger.messages_at(Level::Info);
    let opened = info
        .iter()
        .position(|m| m.starts_with("connection opened") && m.contains(&id));
    let closed = info
        .iter()
        .position(|m| m.starts_with("connection closed") && m.contains("termination=disposed"));
    assert!(
        matches!((opened, closed), (Some(o), Some(c)) if o < c),
        "lifecycle messages missing or out of order: {info:?}"
    );
}

#[rstest]
#[serial(connection_logs)]
#[tokio::test]
async fn protocol_violation_is_logged_as_warning(mut logger: LoggerHandle) {
    let (local, remote) = memory_socket_pair();
    let conn = Connection::new(local);
    let peer = FramePeer::new(remote);

    peer.send_raw(vec![9_u8; 32]).await;
    conn.completion().wait().await;

    assert!(logger.logged(Level::Warn, "connection loop failed"));
}

#[rstest]
#[serial(connection_logs)]
#[tokio::test]
async fn failed_pending_calls_are_reported(mut logger: LoggerHandle) {
    let (local, remote) = memory_socket_pair();
    let conn = Connection::new(local);
    let mut peer = FramePeer::new(remote);

    let call = tokio::spawn({
        let conn = conn.clone();
        async move { conn.request_response("unanswered", CancellationToken::new()).await }
    });
    recv_expect!(peer.next_frame());
    conn.dispose().await;
    assert!(call.await.expect("call task panicked").is_err());

    assert!(logger.logged(Level::Info, "failed pending requests on close"));
}

#[rstest]
#[serial(connection_logs)]
#[tokio::test]
async fn stray_response_is_not_logged_above_debug(mut logger: LoggerHandle) {
    let (local, remote) = memory_socket_pair();
    let conn = Connection::new(local);
    let mut peer = FramePeer::new(remote);

    peer.send_frame(MessageType::Response, CorrelationId::new_random(), b"late")
        .await;
    peer.send_frame(MessageType::Request, CorrelationId::new_random(), b"ping")
        .await;
    recv_expect!(peer.next_frame());
    conn.dispose().await;

    assert!(logger.messages_at(Level::Warn).is_empty());
}
