//! End-to-end tests against a real listener.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tower::ServiceExt;

use signalhub_gateway::{app_state::AppState, config, router};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

fn test_config() -> config::HubConfig {
    config::load_from_str(
        r#"
version: 1
server:
  listen: "127.0.0.1:0"
  handshake_timeout_ms: 500
limits:
  max_frame_bytes: 1024
"#,
    )
    .unwrap()
}

async fn spawn_server() -> (SocketAddr, AppState) {
    spawn_server_with(test_config()).await
}

async fn spawn_server_with(cfg: config::HubConfig) -> (SocketAddr, AppState) {
    let state = AppState::new(cfg).unwrap();
    let app = router::build_router(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, state)
}

async fn next_json(ws: &mut Client) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended")
            .expect("ws error");
        match msg {
            Message::Text(s) => return serde_json::from_str(&s).unwrap(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

async fn connect(addr: SocketAddr) -> (Client, String) {
    let (mut ws, _) = connect_async(format!("ws://{addr}/chathub")).await.unwrap();
    ws.send(Message::Text(r#"{"protocol":"json","version":1}"#.into()))
        .await
        .unwrap();
    let welcome = next_json(&mut ws).await;
    assert_eq!(welcome["type"], "welcome");
    let id = welcome["data"]["connection_id"].as_str().unwrap().to_string();
    (ws, id)
}

async fn send_json(ws: &mut Client, json: &str) {
    ws.send(Message::Text(json.to_string())).await.unwrap();
}

#[tokio::test]
async fn room_broadcast_excludes_sender() {
    let (addr, _state) = spawn_server().await;
    let (mut a, a_id) = connect(addr).await;
    let (mut b, _b_id) = connect(addr).await;

    send_json(&mut a, r#"{"v":1,"type":"join","group":"room1"}"#).await;
    assert_eq!(next_json(&mut a).await["type"], "joined");
    send_json(&mut b, r#"{"v":1,"type":"join","group":"room1"}"#).await;
    assert_eq!(next_json(&mut b).await["type"], "joined");

    send_json(
        &mut a,
        r#"{"v":1,"type":"broadcast","group":"room1","exclude_self":true,"data":"hello"}"#,
    )
    .await;
    let got = next_json(&mut b).await;
    assert_eq!(got["type"], "message");
    assert_eq!(got["from"], a_id.as_str());
    assert_eq!(got["data"], "hello");

    // A gets nothing for its own broadcast; the next frame it sees is its pong.
    send_json(&mut a, r#"{"v":1,"type":"ping","seq":1}"#).await;
    let next = next_json(&mut a).await;
    assert_eq!(next["type"], "pong");
    assert_eq!(next["seq"], 1);
}

#[tokio::test]
async fn disconnect_is_cleaned_up() {
    let (addr, state) = spawn_server().await;
    let (mut a, _) = connect(addr).await;
    let (mut c, c_id) = connect(addr).await;

    send_json(&mut c, r#"{"v":1,"type":"join","group":"g"}"#).await;
    next_json(&mut c).await;
    send_json(&mut a, r#"{"v":1,"type":"join","group":"g"}"#).await;
    next_json(&mut a).await;

    c.close(None).await.unwrap();

    let hub = state.hub();
    let mut evicted = false;
    for _ in 0..50 {
        if hub.lookup(&c_id).is_err() {
            evicted = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(evicted, "closed connection must leave the registry");
    assert_eq!(hub.members_of("g").len(), 1);

    send_json(&mut a, r#"{"v":1,"type":"broadcast","group":"g","data":1}"#).await;
    assert_eq!(next_json(&mut a).await["data"], 1);
}

#[tokio::test]
async fn bad_handshake_is_rejected() {
    let (addr, _state) = spawn_server().await;
    let (mut ws, _) = connect_async(format!("ws://{addr}/chathub")).await.unwrap();
    ws.send(Message::Text(r#"{"protocol":"json","version":9}"#.into()))
        .await
        .unwrap();
    let err = next_json(&mut ws).await;
    assert_eq!(err["type"], "error");
    assert_eq!(err["data"]["code"], "UNSUPPORTED_VERSION");
}

#[tokio::test]
async fn malformed_message_returns_error_and_keeps_session() {
    let (addr, _state) = spawn_server().await;
    let (mut a, _) = connect(addr).await;

    send_json(&mut a, r#"{"v":1,"type":"teleport"}"#).await;
    let err = next_json(&mut a).await;
    assert_eq!(err["data"]["code"], "BAD_REQUEST");

    send_json(&mut a, r#"{"v":1,"type":"ping"}"#).await;
    assert_eq!(next_json(&mut a).await["type"], "pong");
}

#[tokio::test]
async fn oversized_frame_closes_connection() {
    let (addr, _state) = spawn_server().await;
    let (mut a, _) = connect(addr).await;

    let big = format!(r#"{{"v":1,"type":"broadcast_all","data":"{}"}}"#, "x".repeat(1500));
    send_json(&mut a, &big).await;
    let err = next_json(&mut a).await;
    assert_eq!(err["data"]["code"], "PAYLOAD_TOO_LARGE");
}

#[tokio::test]
async fn greeting_cors_and_compression() {
    let state = AppState::new(test_config()).unwrap();
    let app = router::build_router(state);

    let res = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/")
                .header(header::ORIGIN, "http://example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "*"
    );
    let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"Hello World!");

    let res = app
        .oneshot(
            Request::builder()
                .uri("/")
                .header(header::ACCEPT_ENCODING, "gzip")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.headers().get(header::CONTENT_ENCODING).unwrap(), "gzip");
}

#[tokio::test]
async fn metrics_endpoint_renders() {
    let state = AppState::new(test_config()).unwrap();
    let app = router::build_router(state);
    let res = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("signalhub_connections_active"));
    assert!(text.contains("signalhub_draining 0"));
}

#[tokio::test]
async fn drain_closes_live_sessions() {
    let (addr, state) = spawn_server().await;
    let (mut a, _) = connect(addr).await;

    state.begin_drain();
    assert!(state.hub().registry().is_empty());

    let closed = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match a.next().await {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await;
    assert!(closed.is_ok(), "session must be closed by drain");
}

#[tokio::test]
async fn idle_client_gets_timeout_code() {
    let cfg = config::load_from_str(
        r#"
version: 1
server:
  listen: "127.0.0.1:0"
  ping_interval_ms: 1000
  idle_timeout_ms: 2000
"#,
    )
    .unwrap();
    let (addr, state) = spawn_server_with(cfg).await;
    let (mut a, _) = connect(addr).await;

    // Not polling the socket means no pong goes back, so the server sees silence.
    tokio::time::sleep(Duration::from_millis(2500)).await;

    let err = next_json(&mut a).await;
    assert_eq!(err["type"], "error");
    assert_eq!(err["data"]["code"], "IDLE_TIMEOUT");

    for _ in 0..50 {
        if state.hub().registry().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(state.hub().registry().is_empty());
}
