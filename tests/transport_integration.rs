//! Transport tests against a loopback server

use std::sync::Arc;
use std::time::Duration;

use ignite::ai::Controller;
use ignite::core::config::{AiConfig, UserConfig};
use ignite::core::error::IgniteError;
use ignite::net::{Connection, IntentSink, Request, Response};
use ignite::session::{ProtocolState, Session};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;

const MAX_FRAME: usize = 1024 * 1024;
const WAIT: Duration = Duration::from_secs(5);

async fn listener() -> (TcpListener, std::net::SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

/// Connect a client and return it with the server side of the socket
async fn pair() -> (Connection, TcpStream) {
    let (listener, addr) = listener().await;
    let (conn, accepted) = tokio::join!(Connection::connect(addr, MAX_FRAME), listener.accept());
    (conn.unwrap(), accepted.unwrap().0)
}

fn collect_pushes(conn: &Connection) -> mpsc::UnboundedReceiver<Response> {
    let (tx, rx) = mpsc::unbounded_channel();
    conn.set_handler(Arc::new(move |resp| {
        let _ = tx.send(resp);
    }));
    rx
}

#[tokio::test]
async fn test_bad_frame_is_skipped_and_reading_continues() {
    let (conn, mut server) = pair().await;
    let mut pushes = collect_pushes(&conn);

    server
        .write_all(b"this is not json\r\n{\"paused\":true}\r\n\r\n{\"error\":[\"x\"]}\r\n")
        .await
        .unwrap();

    let first = timeout(WAIT, pushes.recv()).await.unwrap().unwrap();
    assert_eq!(first.paused, Some(true));
    let second = timeout(WAIT, pushes.recv()).await.unwrap().unwrap();
    assert_eq!(second.error, vec!["x".to_string()]);
    assert!(!conn.is_closed());
}

#[tokio::test]
async fn test_oversized_frame_is_skipped() {
    let (listener, addr) = listener().await;
    let (conn, accepted) = tokio::join!(Connection::connect(addr, 32), listener.accept());
    let conn = conn.unwrap();
    let mut server = accepted.unwrap().0;
    let mut pushes = collect_pushes(&conn);

    let big = format!("{{\"error\":[\"{}\"]}}\r\n", "y".repeat(64));
    server.write_all(big.as_bytes()).await.unwrap();
    server.write_all(b"{\"logon\":true}\r\n").await.unwrap();

    let resp = timeout(WAIT, pushes.recv()).await.unwrap().unwrap();
    assert!(resp.logon);
    assert!(resp.error.is_empty());
}

#[tokio::test]
async fn test_unterminated_flood_is_dropped_up_to_next_delimiter() {
    let (listener, addr) = listener().await;
    let (conn, accepted) = tokio::join!(Connection::connect(addr, 32), listener.accept());
    let conn = conn.unwrap();
    let mut server = accepted.unwrap().0;
    let mut pushes = collect_pushes(&conn);

    let chunk = vec![b'x'; 4096];
    for _ in 0..64 {
        server.write_all(&chunk).await.unwrap();
    }
    server.write_all(b"\r\n{\"logon\":true}\r\n").await.unwrap();

    let resp = timeout(WAIT, pushes.recv()).await.unwrap().unwrap();
    assert!(resp.logon);
    assert!(!conn.is_closed());
}

#[tokio::test]
async fn test_malformed_frame_then_update_is_applied() {
    let (conn, mut server) = pair().await;
    let session = Arc::new(Session::with_controller(
        Controller::with_seed(AiConfig::default(), 4),
        16,
    ));
    session.attach_connection(&conn);

    let update = serde_json::json!({
        "update": {"module": {"id": "town", "characters": [{"id": "a", "serial": "0"}]}}
    });
    server
        .write_all(format!("{{\"update\": [}}\r\n{}\r\n", update).as_bytes())
        .await
        .unwrap();

    timeout(WAIT, async {
        while session.world().is_none() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    let world = session.world().unwrap();
    assert_eq!(world.module_id(), "town");
    assert_eq!(world.character_count(), 1);

    conn.close();
    session.detach();
}

#[tokio::test]
async fn test_close_resolves_pending_send() {
    // The server never reads, so a large frame stalls the writer
    let (conn, _server) = pair().await;
    let big = Request::chat(&ignite::core::types::ObjectId::new("a", "0"), "z".repeat(32 * 1024 * 1024));

    let stalled = tokio::spawn({
        let conn = conn.clone();
        async move { conn.send(&big).await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    let queued = tokio::spawn({
        let conn = conn.clone();
        async move { conn.send(&Request::default()).await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!stalled.is_finished());

    conn.close();

    let stalled = timeout(WAIT, stalled).await.unwrap().unwrap();
    let queued = timeout(WAIT, queued).await.unwrap().unwrap();
    assert!(matches!(stalled, Err(IgniteError::Closed)));
    assert!(matches!(queued, Err(IgniteError::Closed)));
}

#[tokio::test]
async fn test_handler_does_not_keep_session_alive() {
    let (conn, _server) = pair().await;
    let session = Arc::new(Session::with_controller(
        Controller::with_seed(AiConfig::default(), 4),
        16,
    ));
    session.attach_connection(&conn);

    let weak = Arc::downgrade(&session);
    drop(session);
    assert!(weak.upgrade().is_none());
    conn.close();
}

#[tokio::test]
async fn test_requests_arrive_delimited_and_in_order() {
    let (conn, server) = pair().await;

    conn.send(&Request::login("npcs", "pw")).await.unwrap();
    conn.post(Request::accept(9)).unwrap();
    conn.update().await.unwrap();

    let mut lines = BufReader::new(server).lines();
    let mut got = Vec::new();
    for _ in 0..3 {
        let line = timeout(WAIT, lines.next_line()).await.unwrap().unwrap().unwrap();
        got.push(serde_json::from_str::<Request>(line.trim_end()).unwrap());
    }
    assert_eq!(got, vec![Request::login("npcs", "pw"), Request::accept(9), Request::default()]);
}

#[tokio::test]
async fn test_peer_hangup_closes_connection() {
    let (conn, server) = pair().await;
    drop(server);

    timeout(WAIT, conn.wait_closed()).await.unwrap();
    assert!(conn.is_closed());
    assert!(matches!(conn.send(&Request::default()).await, Err(IgniteError::Closed)));
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let (conn, _server) = pair().await;
    conn.close();
    conn.close();
    timeout(WAIT, conn.wait_closed()).await.unwrap();
    assert!(matches!(conn.post(Request::default()), Err(IgniteError::Closed)));
}

#[tokio::test]
async fn test_connect_failure_is_reported() {
    let (listener, addr) = listener().await;
    drop(listener);
    let err = Connection::connect(addr, MAX_FRAME).await.unwrap_err();
    assert!(matches!(err, IgniteError::Connect { .. }));
}

#[tokio::test]
async fn test_session_login_and_sync_over_tcp() {
    let (conn, server) = pair().await;
    let session = Arc::new(Session::with_controller(
        Controller::with_seed(AiConfig::default(), 4),
        16,
    ));
    session.attach_connection(&conn);
    session
        .login(&UserConfig {
            id: "npcs".into(),
            pass: "pw".into(),
        })
        .unwrap();

    let (rd, mut wr) = server.into_split();
    let mut lines = BufReader::new(rd).lines();

    let login = timeout(WAIT, lines.next_line()).await.unwrap().unwrap().unwrap();
    assert_eq!(serde_json::from_str::<Request>(&login).unwrap(), Request::login("npcs", "pw"));

    wr.write_all(b"{\"logon\":true}\r\n").await.unwrap();
    let update = timeout(WAIT, lines.next_line()).await.unwrap().unwrap().unwrap();
    assert!(serde_json::from_str::<Request>(&update).unwrap().is_empty());

    let push = serde_json::json!({
        "update": {"module": {"id": "town", "characters": [{"id": "a", "serial": "0"}]}},
        "character": [{"id": "a", "serial": "0"}]
    });
    wr.write_all(format!("{}\r\n", push).as_bytes()).await.unwrap();

    timeout(WAIT, async {
        while session.roster().len() != 1 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(session.state(), ProtocolState::Synced);

    conn.close();
    session.detach();
    assert_eq!(session.state(), ProtocolState::Disconnected);
}
