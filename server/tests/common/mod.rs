//! Shared helpers: a live server on a random port and a thin event-level
//! WebSocket client.

#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use nova_realtime::config::HeartbeatConfig;
use nova_realtime::db::{self, SqliteStore};
use nova_realtime::state::AppState;

pub type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

pub struct TestServer {
    pub base_url: String,
    pub addr: SocketAddr,
    pub store: SqliteStore,
    pub state: AppState,
}

/// Start the server on a random port with users 1..=count already present.
pub async fn start_test_server(user_count: i64) -> TestServer {
    start_test_server_with(user_count, HeartbeatConfig::default(), |state| state).await
}

/// Like [`start_test_server`], with custom keepalive timings and a hook to
/// swap collaborators in the state before the router is built.
pub async fn start_test_server_with(
    user_count: i64,
    heartbeat: HeartbeatConfig,
    configure: impl FnOnce(AppState) -> AppState,
) -> TestServer {
    let tmp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let data_dir = tmp_dir.path().to_str().unwrap().to_string();

    let pool = db::init_db(&data_dir).expect("Failed to init DB");
    {
        let conn = pool.lock().unwrap();
        for id in 1..=user_count {
            conn.execute(
                "INSERT INTO users (id, username) VALUES (?1, ?2)",
                rusqlite::params![id, format!("user{}", id)],
            )
            .expect("Failed to seed user");
        }
    }

    let store = SqliteStore::new(pool);
    let state = configure(AppState::new(store.clone(), heartbeat));
    let app = nova_realtime::routes::build_router(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
        // Keep tmp_dir alive so the data directory isn't deleted
        let _keep = tmp_dir;
    });

    TestServer {
        base_url: format!("http://{}", addr),
        addr,
        store,
        state,
    }
}

impl TestServer {
    /// Open a socket for `user_id` and wait until the server has registered it.
    pub async fn connect(&self, user_id: i64) -> WsStream {
        let before = self.state.presence.connections_for(user_id).len();
        let url = format!("ws://{}/ws?userId={}", self.addr, user_id);
        let (ws, _) = tokio_tungstenite::connect_async(&url)
            .await
            .expect("Failed to connect to WebSocket");
        self.wait_for_connections(user_id, before + 1).await;
        ws
    }

    /// Poll the registry until `user_id` holds exactly `count` connections.
    pub async fn wait_for_connections(&self, user_id: i64, count: usize) {
        for _ in 0..200 {
            if self.state.presence.connections_for(user_id).len() == count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!(
            "user {} never reached {} connections (has {})",
            user_id,
            count,
            self.state.presence.connections_for(user_id).len()
        );
    }

    pub fn http(&self, method: reqwest::Method, path: &str, user_id: i64) -> reqwest::RequestBuilder {
        reqwest::Client::new()
            .request(method, format!("{}{}", self.base_url, path))
            .header("x-user-id", user_id.to_string())
    }
}

/// Send one client event.
pub async fn emit(ws: &mut WsStream, event: &str, data: Value) {
    let frame = serde_json::json!({ "event": event, "data": data });
    ws.send(Message::text(frame.to_string()))
        .await
        .expect("Failed to send event");
}

/// Next JSON event within two seconds, skipping control frames.
pub async fn next_event(ws: &mut WsStream) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("Expected an event within timeout")
            .expect("Stream ended")
            .expect("WebSocket error");
        match msg {
            Message::Text(text) => return serde_json::from_str(text.as_str()).unwrap(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("Expected text event, got: {:?}", other),
        }
    }
}

/// Everything that arrives until the socket goes quiet for `quiet_ms`.
pub async fn drain(ws: &mut WsStream, quiet_ms: u64) -> Vec<Value> {
    let mut events = Vec::new();
    while let Ok(Some(Ok(msg))) =
        tokio::time::timeout(Duration::from_millis(quiet_ms), ws.next()).await
    {
        if let Message::Text(text) = msg {
            events.push(serde_json::from_str(text.as_str()).unwrap());
        }
    }
    events
}

/// Only the events with the given name.
pub fn named<'a>(events: &'a [Value], name: &str) -> Vec<&'a Value> {
    events.iter().filter(|e| e["event"] == name).collect()
}
