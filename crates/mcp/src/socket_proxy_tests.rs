use std::time::Duration;

use tempfile::tempdir;
use tf_core::McpName;
use tokio_util::sync::CancellationToken;

use super::*;

fn test_name(s: &str) -> McpName {
    McpName::new(s)
}

#[tokio::test]
async fn owned_proxy_starts_accepts_and_stops() {
    let dir = tempdir().unwrap();
    let proxy = Arc::new(SocketProxy::new_owned(
        test_name("cat-echo"),
        dir.path(),
        "cat".to_string(),
        vec![],
        vec![],
        CancellationToken::new(),
    ));

    proxy.start().await.unwrap();
    assert_eq!(proxy.status().await, ProxyStatus::Running);
    assert!(socket_alive(proxy.socket_path(), LIVENESS_TIMEOUT).await);

    proxy.stop().await.unwrap();
    assert_eq!(proxy.status().await, ProxyStatus::Stopped);
    assert!(!proxy.socket_path().exists());
}

#[tokio::test]
async fn stop_is_idempotent() {
    let dir = tempdir().unwrap();
    let proxy = Arc::new(SocketProxy::new_owned(
        test_name("cat-echo"),
        dir.path(),
        "cat".to_string(),
        vec![],
        vec![],
        CancellationToken::new(),
    ));
    proxy.start().await.unwrap();
    proxy.stop().await.unwrap();
    proxy.stop().await.unwrap();
}

#[tokio::test]
async fn client_round_trips_a_line_through_the_child() {
    let dir = tempdir().unwrap();
    let proxy = Arc::new(SocketProxy::new_owned(
        test_name("cat-echo"),
        dir.path(),
        "cat".to_string(),
        vec![],
        vec![],
        CancellationToken::new(),
    ));
    proxy.start().await.unwrap();

    let mut stream = UnixStream::connect(proxy.socket_path()).await.unwrap();
    stream
        .write_all(br#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#)
        .await
        .unwrap();
    stream.write_all(b"\n").await.unwrap();

    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    tokio::time::timeout(Duration::from_secs(2), reader.read_line(&mut line))
        .await
        .expect("timed out waiting for echo")
        .unwrap();

    assert_eq!(line.trim(), r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#);

    proxy.stop().await.unwrap();
}

#[tokio::test]
async fn two_clients_each_receive_only_their_own_reply() {
    let dir = tempdir().unwrap();
    let proxy = Arc::new(SocketProxy::new_owned(
        test_name("cat-echo"),
        dir.path(),
        "cat".to_string(),
        vec![],
        vec![],
        CancellationToken::new(),
    ));
    proxy.start().await.unwrap();

    let (read_a, mut write_a) = UnixStream::connect(proxy.socket_path()).await.unwrap().into_split();
    let (read_b, mut write_b) = UnixStream::connect(proxy.socket_path()).await.unwrap().into_split();
    let mut reader_a = BufReader::new(read_a);
    let mut reader_b = BufReader::new(read_b);

    write_a
        .write_all(br#"{"jsonrpc":"2.0","id":"a","method":"ping"}"#)
        .await
        .unwrap();
    write_a.write_all(b"\n").await.unwrap();

    let mut line_a = String::new();
    tokio::time::timeout(Duration::from_secs(2), reader_a.read_line(&mut line_a))
        .await
        .expect("timed out waiting for client a's reply")
        .unwrap();
    assert_eq!(line_a.trim(), r#"{"jsonrpc":"2.0","id":"a","method":"ping"}"#);

    write_b
        .write_all(br#"{"jsonrpc":"2.0","id":"b","method":"ping"}"#)
        .await
        .unwrap();
    write_b.write_all(b"\n").await.unwrap();

    let mut line_b = String::new();
    tokio::time::timeout(Duration::from_secs(2), reader_b.read_line(&mut line_b))
        .await
        .expect("timed out waiting for client b's reply")
        .unwrap();
    assert_eq!(line_b.trim(), r#"{"jsonrpc":"2.0","id":"b","method":"ping"}"#);

    // Client A's reply already arrived before B even sent its request, so
    // nothing further should show up on A's connection.
    let mut spurious = String::new();
    let extra = tokio::time::timeout(Duration::from_millis(200), reader_a.read_line(&mut spurious)).await;
    assert!(extra.is_err(), "client a received an unexpected extra line: {spurious:?}");

    assert!(proxy.request_map.lock().is_empty());

    proxy.stop().await.unwrap();
}

#[tokio::test]
async fn notification_without_id_is_broadcast_to_every_client() {
    let dir = tempdir().unwrap();
    let proxy = Arc::new(SocketProxy::new_owned(
        test_name("cat-echo"),
        dir.path(),
        "cat".to_string(),
        vec![],
        vec![],
        CancellationToken::new(),
    ));
    proxy.start().await.unwrap();

    let (read_a, mut write_a) = UnixStream::connect(proxy.socket_path()).await.unwrap().into_split();
    let (read_b, _write_b) = UnixStream::connect(proxy.socket_path()).await.unwrap().into_split();
    let mut reader_a = BufReader::new(read_a);
    let mut reader_b = BufReader::new(read_b);

    // Let the accept loop register both connections before the notification
    // round-trips through the child.
    tokio::time::sleep(Duration::from_millis(50)).await;

    write_a
        .write_all(br#"{"jsonrpc":"2.0","method":"notify"}"#)
        .await
        .unwrap();
    write_a.write_all(b"\n").await.unwrap();

    let mut line_a = String::new();
    tokio::time::timeout(Duration::from_secs(2), reader_a.read_line(&mut line_a))
        .await
        .expect("timed out waiting for broadcast on a")
        .unwrap();
    assert_eq!(line_a.trim(), r#"{"jsonrpc":"2.0","method":"notify"}"#);

    let mut line_b = String::new();
    tokio::time::timeout(Duration::from_secs(2), reader_b.read_line(&mut line_b))
        .await
        .expect("timed out waiting for broadcast on b")
        .unwrap();
    assert_eq!(line_b.trim(), r#"{"jsonrpc":"2.0","method":"notify"}"#);

    proxy.stop().await.unwrap();
}

#[tokio::test]
async fn spawn_failure_cleans_up_any_stale_socket_file() {
    let dir = tempdir().unwrap();
    let proxy = Arc::new(SocketProxy::new_owned(
        test_name("nonexistent-binary"),
        dir.path(),
        "definitely-not-a-real-binary-xyz".to_string(),
        vec![],
        vec![],
        CancellationToken::new(),
    ));

    let err = proxy.start().await.unwrap_err();
    assert!(matches!(err, SocketProxyError::SpawnFailure { .. }));
}

#[tokio::test]
async fn external_proxy_start_and_stop_are_no_ops_on_process_state() {
    let dir = tempdir().unwrap();
    let socket_path = dir.path().join("external.sock");
    let proxy = Arc::new(SocketProxy::new_external(test_name("external"), socket_path.clone()));
    assert!(proxy.is_external());
    assert_eq!(proxy.status().await, ProxyStatus::Running);
    proxy.start().await.unwrap();
    proxy.stop().await.unwrap();
    assert_eq!(proxy.status().await, ProxyStatus::Stopped);
}

#[tokio::test]
async fn socket_alive_is_false_for_missing_path() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("nope.sock");
    assert!(!socket_alive(&missing, LIVENESS_TIMEOUT).await);
}

#[test]
fn socket_path_for_derives_expected_name() {
    let dir = std::path::Path::new("/tmp");
    let path = SocketProxy::socket_path_for(dir, "jira");
    assert_eq!(path, std::path::PathBuf::from("/tmp/agentdeck-mcp-jira.sock"));
}
