use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{info, warn};

use kubelet_storage_exporter::{
    load_config, summary_endpoint, CollectorOptions, Config, Metrics, MetricsCollector,
    MetricsOptions, SummaryClient,
};

/// How long in-flight scrapes may take to finish after shutdown.
const SERVER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = load_config()?;
    init_tracing(&cfg);
    info!(
        port = cfg.port,
        debug = cfg.debug,
        json = cfg.json_log,
        interval = ?cfg.interval,
        timeout = ?cfg.timeout,
        node = %cfg.node_name,
        cert = %cfg.cert_file,
        key = %cfg.key_file,
        api = %cfg.k8s_local_api,
        "config"
    );
    if cfg.node_name.is_empty() {
        warn!("LSE_NODE_NAME is not set; API status gauges will carry an empty node label");
    }

    let metrics = Arc::new(
        Metrics::new(MetricsOptions {
            prefix: cfg.metrics_prefix.clone(),
            uid_label: cfg.uid_label,
            stale_cycles: cfg.stale_cycles,
        })
        .context("failed to create metrics registry")?,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    let mut server = tokio::spawn(kubelet_storage_exporter::server::serve(
        addr,
        metrics.clone(),
        wait_for_shutdown(shutdown_rx.clone()),
    ));

    let client = SummaryClient::new(
        summary_endpoint(&cfg.k8s_local_api),
        &cfg.cert_file,
        &cfg.key_file,
        cfg.timeout,
    );
    let collector = MetricsCollector::new(
        client,
        metrics,
        CollectorOptions {
            interval: cfg.interval,
            node_name: cfg.node_name.clone(),
        },
    );

    let signals = tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    tokio::select! {
        _ = collector.run(wait_for_shutdown(shutdown_rx)) => {}
        res = &mut server => {
            // The server only returns early when it could not start or crashed.
            signals.abort();
            return res.context("metrics server task panicked")?;
        }
    }

    signals.abort();
    match tokio::time::timeout(SERVER_DRAIN_TIMEOUT, server).await {
        Ok(res) => res.context("metrics server task panicked")??,
        Err(_) => warn!(timeout = ?SERVER_DRAIN_TIMEOUT, "metrics server did not drain in time"),
    }
    info!("exporter stopped");
    Ok(())
}

async fn wait_for_shutdown(mut rx: watch::Receiver<bool>) {
    while !*rx.borrow() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        Err(_) => {
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_tracing(cfg: &Config) {
    let default_level = if cfg.debug { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    let _ = if cfg.json_log {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
