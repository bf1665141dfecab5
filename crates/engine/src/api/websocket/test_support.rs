use super::*;

use std::{net::SocketAddr, time::Duration};

use axum::routing::get;
use tokio::net::TcpListener;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};

use crate::api::connections::ConnectionManager;
use crate::infrastructure::auth::DisabledAuth;
use crate::infrastructure::clock::SystemClock;
use crate::infrastructure::config::Limits;
use crate::infrastructure::persistence::LocationStore;
use crate::use_cases::session::{spawn_session, Session, SessionSettings};

pub(crate) type TestWs =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// A session actor over a throwaway location root.
pub(crate) struct TestServer {
    pub(crate) addr: SocketAddr,
    _dir: tempfile::TempDir,
}

pub(crate) async fn spawn_test_server(limits: Limits, open_roles: bool) -> TestServer {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = LocationStore::open(dir.path()).expect("store");
    let session = Session::new(
        SessionSettings { limits, open_roles },
        Arc::new(ConnectionManager::new(limits.max_clients)),
        Arc::new(store),
        Arc::new(DisabledAuth),
        Arc::new(SystemClock::new()),
    );
    let (handle, _task) = spawn_session(session, 64);
    let state = Arc::new(WsState {
        session: handle,
        max_message_bytes: limits.max_message_bytes,
    });
    let (addr, _server) = spawn_ws_server(state).await;
    TestServer { addr, _dir: dir }
}

pub(crate) async fn spawn_ws_server(
    state: Arc<WsState>,
) -> (SocketAddr, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");

    let router = axum::Router::new().route("/ws", get(ws_handler).with_state(state));

    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve");
    });

    (addr, handle)
}

pub(crate) async fn ws_connect(addr: SocketAddr, query: &str) -> TestWs {
    let url = format!("ws://{addr}/ws{query}");
    let (ws, _resp) = connect_async(url).await.expect("connect");
    ws
}

pub(crate) async fn ws_send_client(ws: &mut TestWs, msg: &ClientMessage) {
    let json = serde_json::to_string(msg).expect("serialize");
    ws.send(WsMessage::Text(json.into())).await.expect("send");
}

pub(crate) async fn ws_send_raw(ws: &mut TestWs, text: String) {
    ws.send(WsMessage::Text(text.into())).await.expect("send");
}

pub(crate) async fn ws_recv_server(ws: &mut TestWs) -> ServerMessage {
    loop {
        let msg = ws
            .next()
            .await
            .expect("stream open")
            .expect("valid frame");
        match msg {
            WsMessage::Text(text) => {
                return serde_json::from_str::<ServerMessage>(text.as_str()).expect("server message");
            }
            WsMessage::Binary(bin) => {
                return serde_json::from_slice::<ServerMessage>(&bin).expect("server message");
            }
            _ => {}
        }
    }
}

pub(crate) async fn ws_expect_message<F>(
    ws: &mut TestWs,
    timeout: Duration,
    mut predicate: F,
) -> ServerMessage
where
    F: FnMut(&ServerMessage) -> bool,
{
    tokio::time::timeout(timeout, async {
        loop {
            let msg = ws_recv_server(ws).await;
            if predicate(&msg) {
                return msg;
            }
        }
    })
    .await
    .expect("expected message before timeout")
}

pub(crate) async fn ws_expect_no_message_matching<F>(
    ws: &mut TestWs,
    timeout: Duration,
    mut predicate: F,
) where
    F: FnMut(&ServerMessage) -> bool,
{
    let result = tokio::time::timeout(timeout, async {
        loop {
            let msg = ws_recv_server(ws).await;
            if predicate(&msg) {
                return msg;
            }
        }
    })
    .await;
    if let Ok(msg) = result {
        panic!("unexpected message: {msg:?}");
    }
}
