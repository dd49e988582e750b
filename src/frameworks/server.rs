// Framework bootstrap for the authority (host) runtime.

use crate::domain::{BlockRegistry, World};
use crate::frameworks::config;
use crate::interface_adapters::net::{click_handler, material_handler, move_handler, ws_handler};
use crate::interface_adapters::state::AppState;
use crate::use_cases::{Authority, authority_task};

use axum::{
    Router,
    routing::{get, post},
};
use std::future::Future;
use std::net::SocketAddr;
use std::{io::Result, sync::Arc, time::Duration};
use tokio::sync::{Notify, broadcast, mpsc};
use tracing::{error, info, warn};

// How long sockets get to forward the final Disconnected before the host exits.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

pub(crate) fn init_runtime() {
    let _ = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

pub struct HostSettings {
    pub seed: u64,
    pub registry: Arc<BlockRegistry>,
    pub tick_interval: Duration,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/actions/click", post(click_handler))
        .route("/actions/move", post(move_handler))
        .route("/actions/material", post(material_handler))
        .with_state(state)
}

/// Runs the authority until `shutdown` completes: the world task, the sync socket and
/// the action routes.
pub async fn run<F>(listener: tokio::net::TcpListener, settings: HostSettings, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let address = listener.local_addr()?;

    // commands: actions and observer joins flow into the single world task.
    let (command_tx, command_rx) = mpsc::channel(config::COMMAND_CHANNEL_CAPACITY);
    // sync: deltas fan out to every observer socket.
    let (sync_tx, _sync_rx) = broadcast::channel(config::SYNC_BROADCAST_CAPACITY);

    let world = World::new(settings.seed, settings.registry.clone());
    let authority_shutdown = Arc::new(Notify::new());
    let world_task = tokio::spawn(authority_task(
        Authority::new(world, sync_tx),
        command_rx,
        settings.tick_interval,
        authority_shutdown.clone(),
    ));

    let block_types = settings.registry.len();
    let state = Arc::new(AppState {
        commands: command_tx,
        registry: settings.registry,
    });
    let app = router(state);

    tracing::info!(%address, seed = settings.seed, block_types, "listening");

    let signal = {
        let authority_shutdown = authority_shutdown.clone();
        async move {
            shutdown.await;
            info!("shutdown requested");
            authority_shutdown.notify_one();
        }
    };

    // Serve app and report errors rather than panicking
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(signal)
        .await
        .inspect_err(|e| {
            tracing::error!(error = %e, "server error");
        });

    // Stored permit; covers a serve error before the signal fired.
    authority_shutdown.notify_one();
    match world_task.await {
        Ok(authority) => {
            let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
                while authority.observer_count() > 0 {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            })
            .await;
            if drained.is_err() {
                warn!(
                    observers = authority.observer_count(),
                    "observers still connected at exit"
                );
            }
        }
        Err(e) => error!(error = %e, "world task failed"),
    }

    served
}

pub async fn run_with_config() -> Result<()> {
    init_runtime();

    let registry = config::load_block_registry().map_err(|e| {
        error!(error = %e, "failed to load block table");
        std::io::Error::other(e.to_string())
    })?;
    let settings = HostSettings {
        seed: config::world_seed(),
        registry: Arc::new(registry),
        tick_interval: config::TICK_INTERVAL,
    };

    let address = SocketAddr::from(([127, 0, 0, 1], config::http_port()));

    // Bind TCP listener with error handling
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .inspect_err(|e| {
            tracing::error!(%address, error = %e, "failed to bind");
        })?;

    run(listener, settings, ctrl_c()).await
}

pub(crate) async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        // Without a signal handler the process only stops when killed.
        error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
