// Observer side of the sync socket: connect-or-fail, then a reader task that feeds
// decoded messages into the observer's inbox.

use crate::interface_adapters::protocol::WireMessage;
use crate::use_cases::ObserverEvent;

use futures_util::{SinkExt, StreamExt};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

const LOG_THROTTLE: Duration = Duration::from_secs(2);

#[derive(Debug)]
pub enum ConnectError {
    Timeout { url: String },
    Handshake {
        url: String,
        source: tokio_tungstenite::tungstenite::Error,
    },
}

impl fmt::Display for ConnectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectError::Timeout { url } => write!(f, "no server found at {url} (timed out)"),
            ConnectError::Handshake { url, source } => {
                write!(f, "no server found at {url}: {source}")
            }
        }
    }
}

impl std::error::Error for ConnectError {}

/// A live connection: the inbox to pump each frame and a handle to end it.
pub struct ObserverLink {
    pub inbox: mpsc::Receiver<ObserverEvent>,
    pub handle: LinkHandle,
}

pub struct LinkHandle {
    shutdown: Arc<Notify>,
    reader: JoinHandle<()>,
}

impl LinkHandle {
    /// Closes the socket; the inbox then yields `TransportClosed`.
    pub fn disconnect(&self) {
        self.shutdown.notify_one();
    }

    pub async fn finished(self) {
        if let Err(e) = self.reader.await {
            warn!(error = %e, "observer reader task failed");
        }
    }
}

/// Bounded connect-or-fail. No retry.
pub async fn connect(
    url: &str,
    connect_timeout: Duration,
    inbox_capacity: usize,
) -> Result<ObserverLink, ConnectError> {
    let stream = match tokio::time::timeout(connect_timeout, tokio_tungstenite::connect_async(url))
        .await
    {
        Ok(Ok((stream, _response))) => stream,
        Ok(Err(source)) => {
            return Err(ConnectError::Handshake {
                url: url.to_string(),
                source,
            });
        }
        Err(_) => {
            return Err(ConnectError::Timeout {
                url: url.to_string(),
            });
        }
    };
    info!(%url, "connected to authority");

    let (inbox_tx, inbox) = mpsc::channel(inbox_capacity);
    let shutdown = Arc::new(Notify::new());
    let reader = tokio::spawn(read_frames(stream, inbox_tx, shutdown.clone()));

    Ok(ObserverLink {
        inbox,
        handle: LinkHandle { shutdown, reader },
    })
}

type SyncStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn read_frames(stream: SyncStream, inbox: mpsc::Sender<ObserverEvent>, shutdown: Arc<Notify>) {
    let (mut write, mut read) = stream.split();
    let mut frames_in: u64 = 0;
    let mut invalid: u64 = 0;
    let mut last_invalid_log = Instant::now()
        .checked_sub(LOG_THROTTLE)
        .unwrap_or_else(Instant::now);

    loop {
        tokio::select! {
            _ = shutdown.notified() => {
                let _ = write.send(Message::Close(None)).await;
                break;
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        frames_in += 1;
                        match serde_json::from_str::<WireMessage>(text.as_str()) {
                            Ok(wire) => {
                                if inbox.send(ObserverEvent::Message(wire.into())).await.is_err() {
                                    // Nobody is pumping anymore.
                                    break;
                                }
                            }
                            Err(e) => {
                                invalid += 1;
                                if should_log(&mut last_invalid_log) {
                                    warn!(error = %e, invalid, "undecodable frame dropped");
                                } else {
                                    debug!(error = %e, "undecodable frame dropped");
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Binary(_))) => {
                        invalid += 1;
                        debug!("binary frame dropped");
                    }
                    Some(Ok(Message::Close(frame))) => {
                        debug!(?frame, "authority closed the socket");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "websocket read error");
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    debug!(frames_in, invalid, "observer transport stats");
    let _ = inbox.send(ObserverEvent::TransportClosed).await;
}

fn should_log(last: &mut Instant) -> bool {
    if last.elapsed() >= LOG_THROTTLE {
        *last = Instant::now();
        true
    } else {
        false
    }
}
