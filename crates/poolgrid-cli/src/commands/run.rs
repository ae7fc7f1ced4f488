//! `poolgrid run` keeps the pool registry in step with the cluster spec.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, warn};

use poolgrid_autoscale::{NodePoolProvider, RefreshOutcome};
use poolgrid_core::PoolgridConfig;
use poolgrid_state::StateStore;

pub async fn run(config: &PoolgridConfig, store: StateStore) -> anyhow::Result<()> {
    let provider = Arc::new(NodePoolProvider::from_store(config, store));
    let interval = config.refresh_interval();
    info!(
        cluster = %config.cluster_key(),
        provider = provider.name(),
        "poolgrid starting"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("shutdown signal received"),
            Err(e) => error!(error = %e, "failed to listen for Ctrl-C"),
        }
        let _ = shutdown_tx.send(true);
    });

    refresh_loop(provider, interval, shutdown_rx).await;
    info!("poolgrid stopped");
    Ok(())
}

/// Refresh immediately, then every `interval` until shutdown.
pub async fn refresh_loop(
    provider: Arc<NodePoolProvider>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(interval_secs = interval.as_secs(), "pool refresh loop started");
    loop {
        refresh_once(&provider);
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown.changed() => {
                info!("pool refresh loop shutting down");
                break;
            }
        }
    }
}

fn refresh_once(provider: &NodePoolProvider) {
    match provider.refresh() {
        Ok(RefreshOutcome::Updated { generation, pools }) => {
            for pool in provider.pools() {
                info!(generation, pools, pool = %pool.debug(), "autoscaled pool");
            }
        }
        Ok(RefreshOutcome::UpToDate) => {}
        // Keep serving the previous pool list.
        Err(e) => warn!(error = %e, "pool registry refresh failed"),
    }
}
