//! Loopback client/server integration: one daemon task per test, real TCP
//! on 127.0.0.1, temp directories on both sides.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;
use tokio::net::TcpListener;

use ferry::error::Error;
use ferry::history::{Direction, TransferLog, TransferStatus};
use ferry::logger::NoopLogger;
use ferry::server::{serve_on, ServerContext};
use ferry::session::Session;
use ferry::transfer::CancelFlag;

async fn start_server(root: &Path, history: Option<Arc<TransferLog>>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let ctx = ServerContext {
        root: root.to_path_buf(),
        logger: Arc::new(NoopLogger),
        history,
    };
    tokio::spawn(async move {
        let _ = serve_on(listener, ctx).await;
    });
    addr
}

async fn connect(addr: SocketAddr) -> Session {
    Session::connect("127.0.0.1", addr.port(), CancelFlag::new())
        .await
        .unwrap()
}

#[tokio::test]
async fn list_on_empty_root_is_empty_not_an_error() {
    let server_dir = TempDir::new().unwrap();
    let addr = start_server(server_dir.path(), None).await;

    let mut session = connect(addr).await;
    assert!(session.list().await.unwrap().is_empty());
    session.exit().await.unwrap();
}

#[tokio::test]
async fn upload_then_list_then_download_round_trips() {
    let server_dir = TempDir::new().unwrap();
    let client_dir = TempDir::new().unwrap();
    let addr = start_server(server_dir.path(), None).await;

    // 1500 bytes: exercises the 1024/476 chunk split both directions.
    let body: Vec<u8> = (0..1500u32).map(|i| (i * 7 % 256) as u8).collect();
    let local = client_dir.path().join("payload.bin");
    std::fs::write(&local, &body).unwrap();

    let mut session = connect(addr).await;
    let sent = session.upload(&local, |_| {}).await.unwrap();
    assert_eq!(sent, 1500);

    assert_eq!(session.list().await.unwrap(), vec!["payload.bin".to_string()]);
    assert_eq!(std::fs::read(server_dir.path().join("payload.bin")).unwrap(), body);

    let dest = client_dir.path().join("copy.bin");
    let got = session.download("payload.bin", &dest, |_| {}).await.unwrap();
    assert_eq!(got, 1500);
    assert_eq!(std::fs::read(&dest).unwrap(), body);

    session.exit().await.unwrap();
}

#[tokio::test]
async fn sequence_list_then_download_small_file() {
    let server_dir = TempDir::new().unwrap();
    let client_dir = TempDir::new().unwrap();
    std::fs::write(server_dir.path().join("a.txt"), b"hello").unwrap();
    std::fs::write(server_dir.path().join("b.bin"), [0u8; 32]).unwrap();
    let addr = start_server(server_dir.path(), None).await;

    let mut session = connect(addr).await;
    assert_eq!(
        session.list().await.unwrap(),
        vec!["a.txt".to_string(), "b.bin".to_string()]
    );

    let dest = client_dir.path().join("a.txt");
    let got = session.download("a.txt", &dest, |_| {}).await.unwrap();
    assert_eq!(got, 5);
    assert_eq!(std::fs::read(&dest).unwrap(), b"hello");
    session.exit().await.unwrap();
}

#[tokio::test]
async fn download_of_missing_file_creates_nothing_locally() {
    let server_dir = TempDir::new().unwrap();
    let client_dir = TempDir::new().unwrap();
    let addr = start_server(server_dir.path(), None).await;

    let mut session = connect(addr).await;
    let dest = client_dir.path().join("ghost.txt");
    match session.download("ghost.txt", &dest, |_| {}).await {
        Err(Error::NotFound(name)) => assert_eq!(name, "ghost.txt"),
        other => panic!("expected not-found, got {other:?}"),
    }
    assert!(!dest.exists());

    // The in-band failure leaves the session usable.
    assert!(session.list().await.unwrap().is_empty());
    session.exit().await.unwrap();
}

#[tokio::test]
async fn upload_of_invalid_path_creates_nothing_on_server() {
    let server_dir = TempDir::new().unwrap();
    let addr = start_server(server_dir.path(), None).await;

    let mut session = connect(addr).await;
    match session.upload(Path::new("/no/such/file.dat"), |_| {}).await {
        Err(Error::InvalidLocalFile(_)) => {}
        other => panic!("expected invalid local file, got {other:?}"),
    }

    // Session continues and the server root is still empty.
    assert!(session.list().await.unwrap().is_empty());
    session.exit().await.unwrap();
}

#[tokio::test]
async fn download_of_traversal_name_is_refused() {
    let server_dir = TempDir::new().unwrap();
    let client_dir = TempDir::new().unwrap();
    let addr = start_server(server_dir.path(), None).await;

    let mut session = connect(addr).await;
    let dest = client_dir.path().join("stolen");
    match session.download("../../etc/passwd", &dest, |_| {}).await {
        Err(Error::NotFound(_)) => {}
        other => panic!("expected not-found for traversal name, got {other:?}"),
    }
    assert!(!dest.exists());
    session.exit().await.unwrap();
}

#[tokio::test]
async fn zero_byte_file_round_trips() {
    let server_dir = TempDir::new().unwrap();
    let client_dir = TempDir::new().unwrap();
    std::fs::write(server_dir.path().join("empty"), b"").unwrap();
    let addr = start_server(server_dir.path(), None).await;

    let mut session = connect(addr).await;
    let dest = client_dir.path().join("empty");
    assert_eq!(session.download("empty", &dest, |_| {}).await.unwrap(), 0);
    assert_eq!(std::fs::read(&dest).unwrap().len(), 0);
    session.exit().await.unwrap();
}

#[tokio::test]
async fn history_records_completed_transfers() {
    let server_dir = TempDir::new().unwrap();
    let client_dir = TempDir::new().unwrap();
    let history_path = server_dir.path().join("history.jsonl");
    let history = Arc::new(TransferLog::new(&history_path));
    let addr = start_server(server_dir.path(), Some(Arc::clone(&history))).await;

    let local = client_dir.path().join("logged.txt");
    std::fs::write(&local, b"some contents").unwrap();

    let mut session = connect(addr).await;
    session.upload(&local, |_| {}).await.unwrap();
    let dest = client_dir.path().join("logged-copy.txt");
    session.download("logged.txt", &dest, |_| {}).await.unwrap();
    session.exit().await.unwrap();

    let entries = history.read_log().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].direction, Direction::Upload);
    assert_eq!(entries[0].status, TransferStatus::Completed);
    assert_eq!(entries[0].bytes, 13);
    assert_eq!(entries[1].direction, Direction::Download);
    assert_eq!(entries[1].bytes, 13);
    // Both operations happened on the one connection.
    assert_eq!(entries[0].session_id, entries[1].session_id);
}

#[tokio::test]
async fn dropped_connection_does_not_poison_the_server() {
    let server_dir = TempDir::new().unwrap();
    std::fs::write(server_dir.path().join("still-here.txt"), b"x").unwrap();
    let addr = start_server(server_dir.path(), None).await;

    // First client vanishes without an EXIT frame.
    let session = connect(addr).await;
    drop(session);

    let mut session = connect(addr).await;
    assert_eq!(session.list().await.unwrap(), vec!["still-here.txt".to_string()]);
    session.exit().await.unwrap();
}
