// Authority side of the sync socket: one task per connected observer.

use crate::interface_adapters::protocol::WireMessage;
use crate::interface_adapters::state::AppState;
use crate::use_cases::{AuthorityCommand, ObserverFeed, SyncMessage};

use axum::{
    Error,
    extract::{
        State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code},
    },
    response::IntoResponse,
};
use futures::SinkExt;
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::timeout;
use tracing::{Instrument, debug, error, info, info_span, warn};

#[derive(Debug)]
enum NetError {
    // Categorizes connection lifecycle failures so callers can decide policy.
    #[allow(dead_code)]
    Ws(axum::Error),
    #[allow(dead_code)]
    Serialization(serde_json::Error),
    AuthorityClosed,
    JoinTimeout,
}

impl From<axum::Error> for NetError {
    fn from(e: axum::Error) -> Self {
        NetError::Ws(e)
    }
}

const JOIN_TIMEOUT: Duration = Duration::from_secs(5);
const LOG_THROTTLE: Duration = Duration::from_secs(2);

static NEXT_CONN_ID: AtomicU64 = AtomicU64::new(1);

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let conn_id = NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed);
    let span = info_span!("conn", conn_id);
    serve_observer(socket, state).instrument(span).await
}

async fn serve_observer(mut socket: WebSocket, state: Arc<AppState>) {
    let feed = match bootstrap_connection(&state.commands, JOIN_TIMEOUT).await {
        Ok(feed) => feed,
        Err(e) => {
            error!(error = ?e, "failed to bootstrap connection");
            let _ = send_close_with_reason(&mut socket, close_code::ERROR, "authority unavailable")
                .await;
            return;
        }
    };

    let mut ctx = ConnCtx::new(feed.updates);
    info!(catch_up = feed.catch_up.len(), "observer connected");

    // Seed first, then the edits that rebuild the current grid.
    for message in &feed.catch_up {
        if let Err(e) = send_message(&mut socket, message, &mut ctx).await {
            warn!(error = ?e, "failed to send catch-up");
            let _ = socket.close().await;
            ctx.log_stats();
            return;
        }
    }

    if let Err(e) = run_observer_loop(&mut socket, &mut ctx).await {
        warn!(error = ?e, "observer loop exited with error");
    }
    ctx.log_stats();
    info!("observer disconnected");
}

async fn bootstrap_connection(
    commands: &mpsc::Sender<AuthorityCommand>,
    join_timeout: Duration,
) -> Result<ObserverFeed, NetError> {
    // The world task answers between ticks, so the feed starts exactly where the
    // catch-up ends. A full command queue counts against the same deadline.
    let join = async {
        let (reply_tx, reply_rx) = oneshot::channel();
        if commands
            .send(AuthorityCommand::ObserverJoined { reply: reply_tx })
            .await
            .is_err()
        {
            return Err(NetError::AuthorityClosed);
        }
        reply_rx.await.map_err(|_| NetError::AuthorityClosed)
    };

    timeout(join_timeout, join)
        .await
        .unwrap_or(Err(NetError::JoinTimeout))
}

struct ConnCtx {
    updates: broadcast::Receiver<SyncMessage>,

    msgs_in: u64,
    msgs_out: u64,
    bytes_in: u64,
    bytes_out: u64,

    last_inbound_log: Instant,

    close_frame: Option<CloseFrame>,
}

impl ConnCtx {
    fn new(updates: broadcast::Receiver<SyncMessage>) -> Self {
        Self {
            updates,
            msgs_in: 0,
            msgs_out: 0,
            bytes_in: 0,
            bytes_out: 0,
            last_inbound_log: Instant::now()
                .checked_sub(LOG_THROTTLE)
                .unwrap_or_else(Instant::now),
            close_frame: None,
        }
    }

    fn log_stats(&self) {
        debug!(
            msgs_in = self.msgs_in,
            msgs_out = self.msgs_out,
            bytes_in = self.bytes_in,
            bytes_out = self.bytes_out,
            "connection stats"
        );
    }
}

enum LoopControl {
    Continue,
    Disconnect,
}

fn should_log(last: &mut Instant) -> bool {
    if last.elapsed() >= LOG_THROTTLE {
        *last = Instant::now();
        true
    } else {
        false
    }
}

async fn send_message(
    socket: &mut WebSocket,
    message: &SyncMessage,
    ctx: &mut ConnCtx,
) -> Result<(), NetError> {
    let txt = serde_json::to_string(&WireMessage::from(message)).map_err(NetError::Serialization)?;
    let bytes = txt.len();
    socket.send(Message::Text(txt.into())).await?;
    ctx.msgs_out += 1;
    ctx.bytes_out += bytes as u64;
    Ok(())
}

async fn send_close_with_reason(
    socket: &mut WebSocket,
    code: u16,
    reason: &'static str,
) -> Result<(), NetError> {
    socket
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        })))
        .await?;
    socket.close().await.map_err(NetError::Ws)
}

async fn run_observer_loop(socket: &mut WebSocket, ctx: &mut ConnCtx) -> Result<(), NetError> {
    let mut fatal: Option<NetError> = None;

    loop {
        let disconnect = tokio::select! {
            incoming = socket.recv() => {
                matches!(handle_incoming_ws(incoming, ctx), LoopControl::Disconnect)
            }

            update = ctx.updates.recv() => {
                match update {
                    Ok(message) => {
                        let last = message == SyncMessage::Disconnected;
                        match send_message(socket, &message, ctx).await {
                            Ok(()) if last => {
                                ctx.close_frame = Some(CloseFrame {
                                    code: close_code::AWAY,
                                    reason: "authority shutting down".into(),
                                });
                                true
                            }
                            Ok(()) => false,
                            Err(e) => {
                                warn!(error = ?e, "failed to send update");
                                true
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        // Deltas are gone; the observer would drift. It can rejoin.
                        warn!(missed, "observer lagged behind updates; closing");
                        ctx.close_frame = Some(CloseFrame {
                            code: close_code::AGAIN,
                            reason: "lagged behind updates".into(),
                        });
                        true
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        fatal = Some(NetError::AuthorityClosed);
                        true
                    }
                }
            }
        };

        if disconnect {
            if let Some(frame) = ctx.close_frame.take() {
                let _ = socket.send(Message::Close(Some(frame))).await;
            }
            if let Err(err) = socket.close().await.map_err(NetError::Ws) {
                debug!(error = ?err, "socket close error");
            }
            break;
        }
    }

    match fatal {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn handle_incoming_ws(incoming: Option<Result<Message, Error>>, ctx: &mut ConnCtx) -> LoopControl {
    match incoming {
        Some(Ok(msg)) => match msg {
            Message::Text(text) => {
                // The stream is one-way; observers have nothing to say yet.
                ctx.msgs_in += 1;
                ctx.bytes_in += text.len() as u64;
                if should_log(&mut ctx.last_inbound_log) {
                    debug!(bytes = text.len(), "ignoring observer text frame");
                }
                LoopControl::Continue
            }
            Message::Binary(_) => {
                ctx.close_frame = Some(CloseFrame {
                    code: close_code::UNSUPPORTED,
                    reason: "binary messages not supported".into(),
                });
                LoopControl::Disconnect
            }
            Message::Ping(_) | Message::Pong(_) => LoopControl::Continue,
            Message::Close(_) => LoopControl::Disconnect,
        },
        Some(Err(e)) => {
            warn!(error = %e, "websocket recv error");
            LoopControl::Disconnect
        }
        None => {
            info!("websocket closed");
            LoopControl::Disconnect
        }
    }
}
