#![cfg(feature = "metrics")]
//! Metrics recorded by a running connection.
//!
//! Each test drives a connection on a current-thread runtime under
//! `metrics_util::debugging::DebuggingRecorder`.

use bytes::Bytes;
use muxframe::{
    Connection,
    CorrelationId,
    MAX_PAYLOAD_LEN,
    MessageType,
    Payload,
    metrics::{ERRORS_TOTAL, FRAMES_PROCESSED},
};
use muxframe_testing::{FramePeer, memory_socket_pair, metrics::capture, recv_expect};
use rstest::rstest;

#[rstest]
#[case("inbound")]
#[case("outbound")]
fn echoed_request_counts_one_frame_each_way(#[case] direction: &str) {
    let recorded = capture(|| async {
        let (local, remote) = memory_socket_pair();
        let conn = Connection::new(local);
        let mut peer = FramePeer::new(remote);

        peer.send_frame(MessageType::Request, CorrelationId::new_random(), b"ping")
            .await;
        recv_expect!(peer.next_frame());
        conn.dispose().await;
    });

    assert_eq!(
        recorded.counter(FRAMES_PROCESSED, &[("direction", direction)]),
        1
    );
}

#[test]
fn oversized_handler_output_is_counted() {
    let recorded = capture(|| async {
        let (local, remote) = memory_socket_pair();
        let conn = Connection::builder(local)
            .handler(|_request: Bytes| async { Payload::from(vec![0; MAX_PAYLOAD_LEN + 1]) })
            .build()
            .expect("default config is valid");
        let mut peer = FramePeer::new(remote);

        peer.send_frame(MessageType::Request, CorrelationId::new_random(), b"big")
            .await;
        assert!(peer.next_frame().await.is_none());
        conn.dispose().await;
    });

    assert_eq!(
        recorded.counter(ERRORS_TOTAL, &[("kind", "oversized_response")]),
        1
    );
}

#[test]
fn protocol_violation_is_counted_by_kind() {
    let recorded = capture(|| async {
        let (local, remote) = memory_socket_pair();
        let conn = Connection::new(local);
        let peer = FramePeer::new(remote);

        peer.send_raw(vec![9_u8; 32]).await;
        conn.completion().wait().await;
    });

    assert_eq!(
        recorded.counter(ERRORS_TOTAL, &[("kind", "protocol_violation")]),
        1
    );
}

#[rstest]
#[case(1)]
#[case(3)]
fn dropped_writes_accumulate(#[case] count: u64) {
    let recorded = capture(|| async move { muxframe::metrics::inc_dropped(count) });

    assert_eq!(recorded.counter(muxframe::REQUESTS_DROPPED, &[]), count);
}

#[test]
fn connection_gauge_returns_to_zero_after_teardown() {
    let recorded = capture(|| async {
        let (local, _remote) = memory_socket_pair();
        Connection::new(local).dispose().await;
    });

    assert_eq!(recorded.gauge(muxframe::CONNECTIONS_ACTIVE), Some(0.0));
}
