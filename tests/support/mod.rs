// Shared helpers for spawning a host and driving observers in integration tests.
#![allow(dead_code)]

use bastion::domain::BlockRegistry;
use bastion::frameworks::server::router;
use bastion::interface_adapters::protocol::WireMessage;
use bastion::interface_adapters::state::AppState;
use bastion::use_cases::{AuthorityCommand, Observer, ObserverEvent, SyncMessage};
use bastion::{HostSettings, RapierBackend};
use futures_util::StreamExt;
use std::{
    io,
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::{mpsc, oneshot};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

pub type RawSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const TICK_INTERVAL: Duration = Duration::from_millis(16);
pub const WAIT_LIMIT: Duration = Duration::from_secs(5);

pub struct TestHost {
    pub addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<io::Result<()>>,
}

impl TestHost {
    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    pub fn http_url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Triggers graceful shutdown and waits for the host to exit.
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.task
            .await
            .expect("host task panicked")
            .expect("host returned an error");
    }
}

// Spawn a host on an ephemeral port inside the current test runtime. The listener is
// bound before this returns, so connections made afterwards are queued, not refused.
pub async fn spawn_host(seed: u64) -> TestHost {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral test port");
    let addr = listener.local_addr().expect("get local addr");
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let settings = HostSettings {
        seed,
        registry: Arc::new(BlockRegistry::default()),
        tick_interval: TICK_INTERVAL,
    };
    let task = tokio::spawn(bastion::run(listener, settings, async move {
        let _ = shutdown_rx.await;
    }));

    TestHost {
        addr,
        shutdown: Some(shutdown_tx),
        task,
    }
}

// An address nothing listens on.
pub async fn unused_addr() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral test port");
    listener.local_addr().expect("get local addr")
}

pub fn new_observer() -> Observer<RapierBackend> {
    Observer::new(Arc::new(BlockRegistry::default()))
}

// Pump the inbox until `done` holds or the wait limit passes; true on success.
pub async fn pump_until<F>(
    observer: &mut Observer<RapierBackend>,
    inbox: &mut mpsc::Receiver<ObserverEvent>,
    mut done: F,
) -> bool
where
    F: FnMut(&Observer<RapierBackend>) -> bool,
{
    let deadline = Instant::now() + WAIT_LIMIT;
    loop {
        observer.pump(inbox);
        if done(observer) {
            return true;
        }
        if Instant::now() >= deadline || observer.state().is_terminal() {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

// The sync routes without a world task: the test answers joins itself, so it controls
// exactly what each observer socket is subscribed to.
pub struct BareRouter {
    pub addr: SocketAddr,
    pub commands: mpsc::Receiver<AuthorityCommand>,
    task: JoinHandle<io::Result<()>>,
}

impl BareRouter {
    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }
}

impl Drop for BareRouter {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub async fn spawn_bare_router() -> BareRouter {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral test port");
    let addr = listener.local_addr().expect("get local addr");
    let (commands_tx, commands) = mpsc::channel(16);

    let app = router(Arc::new(AppState {
        commands: commands_tx,
        registry: Arc::new(BlockRegistry::default()),
    }));
    let task = tokio::spawn(async move { axum::serve(listener, app).await });

    BareRouter {
        addr,
        commands,
        task,
    }
}

pub async fn raw_connect(url: &str) -> RawSocket {
    let (socket, _response) = tokio_tungstenite::connect_async(url)
        .await
        .expect("websocket handshake");
    socket
}

pub fn wire_frame(message: &SyncMessage) -> Message {
    let text = serde_json::to_string(&WireMessage::from(message)).expect("encode wire message");
    Message::text(text)
}

// Next decodable sync message, skipping control frames.
pub async fn next_sync_message(socket: &mut RawSocket) -> Option<SyncMessage> {
    loop {
        match tokio::time::timeout(WAIT_LIMIT, socket.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => {
                let wire: WireMessage = serde_json::from_str(text.as_str()).ok()?;
                return Some(wire.into());
            }
            Ok(Some(Ok(Message::Close(_)))) | Ok(Some(Err(_))) | Ok(None) | Err(_) => return None,
            Ok(Some(Ok(_))) => {}
        }
    }
}

// Reads until the peer's close frame and returns its code.
pub async fn close_code(socket: &mut RawSocket) -> Option<CloseCode> {
    loop {
        match tokio::time::timeout(WAIT_LIMIT, socket.next()).await {
            Ok(Some(Ok(Message::Close(frame)))) => return frame.map(|f| f.code),
            Ok(Some(Ok(_))) => {}
            Ok(Some(Err(_))) | Ok(None) | Err(_) => return None,
        }
    }
}
