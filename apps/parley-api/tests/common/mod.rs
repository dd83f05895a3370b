use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use parley_api::config::Config;
use parley_api::coordinator::Coordinator;
use parley_api::storage::MemoryStore;
use parley_api::AppState;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Start the full application on an ephemeral port and return its address.
pub async fn spawn_app() -> SocketAddr {
    let config = Arc::new(Config {
        port: 0,
        upload_dir: PathBuf::from("uploads"),
        max_file_bytes: 1024 * 1024,
        persist_timeout_secs: 5,
    });

    let coordinator = Arc::new(Coordinator::new(
        Arc::new(MemoryStore::new()),
        config.max_file_bytes,
        Duration::from_secs(config.persist_timeout_secs),
    ));

    let state = AppState {
        coordinator,
        config: config.clone(),
    };

    let app = parley_api::routes::router(&config.upload_dir).with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind test listener");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("test server error");
    });
    addr
}

/// A connected, identified gateway client.
pub struct Client {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl Client {
    /// Open a socket without identifying.
    pub async fn open(addr: SocketAddr) -> Self {
        let (ws, _) = connect_async(format!("ws://{addr}/gateway"))
            .await
            .expect("ws connect failed");
        Self { ws }
    }

    /// Connect and identify; waits for the READY dispatch and drains the
    /// initial lobby snapshot (ROOM_INFO, USERS_LIST, ROOMS_LIST) so tests
    /// start from a quiet stream.
    pub async fn connect(addr: SocketAddr, username: &str) -> Self {
        let mut client = Self::open(addr).await;
        client.identify(username).await;
        let ready = client.next_dispatch("READY").await;
        assert_eq!(ready["username"], username);
        client.next_dispatch("ROOMS_LIST").await;
        client
    }

    pub async fn identify(&mut self, username: &str) {
        self.send_frame(json!({ "op": 2, "d": { "username": username } }))
            .await;
    }

    pub async fn request(&mut self, name: &str, data: Value) {
        self.send_frame(json!({ "op": 4, "t": name, "d": data })).await;
    }

    async fn send_frame(&mut self, frame: Value) {
        self.ws
            .send(Message::Text(frame.to_string().into()))
            .await
            .expect("ws send failed");
    }

    /// Next JSON frame of any kind.
    pub async fn next_frame(&mut self) -> Value {
        loop {
            let msg = tokio::time::timeout(RECV_TIMEOUT, self.ws.next())
                .await
                .expect("timed out waiting for frame")
                .expect("socket closed")
                .expect("ws read failed");
            match msg {
                Message::Text(text) => {
                    return serde_json::from_str(text.as_str()).expect("invalid frame json");
                }
                Message::Ping(_) | Message::Pong(_) => continue,
                Message::Close(frame) => panic!("unexpected close: {frame:?}"),
                other => panic!("unexpected frame: {other:?}"),
            }
        }
    }

    /// Skip frames until a DISPATCH named `name` arrives; returns its `d`.
    pub async fn next_dispatch(&mut self, name: &str) -> Value {
        loop {
            let frame = self.next_frame().await;
            if frame["op"] == 0 && frame["t"] == name {
                return frame["d"].clone();
            }
        }
    }

    /// Skip frames until a chat or private MESSAGE arrives, ignoring the
    /// join/leave notifications interleaved with it.
    pub async fn next_user_message(&mut self) -> Value {
        loop {
            let msg = self.next_dispatch("MESSAGE").await;
            if msg["type"] != "notification" {
                return msg;
            }
        }
    }

    /// Skip frames until the RESULT for `name` arrives; returns its `d`.
    pub async fn next_result(&mut self, name: &str) -> Value {
        loop {
            let frame = self.next_frame().await;
            if frame["op"] == 5 && frame["t"] == name {
                return frame["d"].clone();
            }
        }
    }

    /// Wait for the server to close the socket; returns the close reason.
    pub async fn expect_close(&mut self) -> String {
        loop {
            let msg = tokio::time::timeout(RECV_TIMEOUT, self.ws.next())
                .await
                .expect("timed out waiting for close");
            match msg {
                Some(Ok(Message::Close(frame))) => {
                    return frame.map(|f| f.reason.to_string()).unwrap_or_default();
                }
                Some(Ok(_)) => continue,
                // A reset without a close frame counts too.
                Some(Err(_)) | None => return String::new(),
            }
        }
    }

    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }
}
