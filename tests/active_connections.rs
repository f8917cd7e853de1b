//! Process-wide count of open connections.
//!
//! The count is global, so every test here runs serially.

use muxframe::{Connection, active_connection_count};
use muxframe_testing::memory_socket_pair;
use rstest::rstest;
use serial_test::serial;

#[rstest]
#[serial]
#[tokio::test]
async fn count_tracks_open_connections() {
    let before = active_connection_count();
    let (left, right) = memory_socket_pair();
    let client = Connection::new(left);
    let server = Connection::new(right);
    assert_eq!(active_connection_count(), before + 2);

    client.dispose().await;
    server.completion().wait().await;
    assert_eq!(active_connection_count(), before);
}

#[rstest]
#[serial]
#[tokio::test]
async fn failed_connection_releases_its_slot() {
    let before = active_connection_count();
    let (local, remote) = memory_socket_pair();
    let conn = Connection::new(local);
    assert_eq!(active_connection_count(), before + 1);

    drop(remote);
    assert!(!conn.completion().wait().await.is_clean());
    assert_eq!(active_connection_count(), before);
}
