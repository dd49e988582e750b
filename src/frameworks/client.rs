// Framework bootstrap for the observer (join) runtime.

use crate::domain::BlockRegistry;
use crate::frameworks::config;
use crate::frameworks::physics::RapierBackend;
use crate::frameworks::server::{ctrl_c, init_runtime};
use crate::interface_adapters::net::{ObserverLink, connect};
use crate::use_cases::{Observer, observer_task};

use std::{io::Result, sync::Arc, time::Duration};
use tracing::{error, info};

/// Connects to `url` and mirrors the authority until it disconnects or ctrl-c.
/// A failed connect leaves the observer in `ConnectFailed`; there is no retry.
pub async fn run_observer(
    url: &str,
    registry: Arc<BlockRegistry>,
    connect_timeout: Duration,
) -> Observer<RapierBackend> {
    let mut observer = Observer::new(registry);

    let ObserverLink { inbox, handle } =
        match connect(url, connect_timeout, config::OBSERVER_INBOX_CAPACITY).await {
            Ok(link) => link,
            Err(e) => {
                error!(error = %e, "no server found");
                observer.connect_failed();
                return observer;
            }
        };
    observer.connected();

    let frame_loop = observer_task(
        observer,
        inbox,
        config::FRAME_INTERVAL,
        config::SUMMARY_EVERY_FRAMES,
    );
    tokio::pin!(frame_loop);

    let observer = tokio::select! {
        observer = &mut frame_loop => observer,
        _ = ctrl_c() => {
            info!("disconnecting");
            // The reader reports TransportClosed once the socket is closed.
            handle.disconnect();
            (&mut frame_loop).await
        }
    };
    handle.finished().await;

    info!(state = ?observer.state(), "observer stopped");
    observer
}

pub async fn run_observer_with_config(url: Option<String>) -> Result<()> {
    init_runtime();

    let registry = config::load_block_registry().map_err(|e| {
        error!(error = %e, "failed to load block table");
        std::io::Error::other(e.to_string())
    })?;
    let url = url.unwrap_or_else(config::server_url);

    run_observer(&url, Arc::new(registry), config::connect_timeout()).await;
    Ok(())
}
