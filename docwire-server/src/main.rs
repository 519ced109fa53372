//! docwire server.
//!
//! Configuration is read from environment variables, a `.env` file in the
//! working directory is loaded first.
use std::net::SocketAddr;

use docwire::{Config, Handler, Listener, Metrics, Pool, PoolConfig};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    info!(mode = %config.mode, listen = %config.listen_addr, "Configuration loaded");

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            info!("Stopping...");
            shutdown.cancel();
        }
    });

    let prometheus = install_metrics(&config.debug_addr, shutdown.clone())?;
    let metrics = Metrics::new();

    let pool = Pool::connect_lazy_with(PoolConfig::from_env(&config)?);
    let handler = Handler::new(pool.clone(), metrics);

    let result = match Listener::bind(config, handler).await {
        Ok(listener) => listener.run(shutdown.clone()).await,
        Err(err) => Err(err),
    };

    pool.close().await;
    shutdown.cancel();

    match &result {
        Ok(()) => info!("Listener stopped"),
        Err(err) => error!("Listener stopped: {err}"),
    }

    info!("Metrics:\n{}", prometheus.render());

    result.map_err(Into::into)
}

/// Install the recorder and serve it on `addr` until `shutdown`.
fn install_metrics(addr: &str, shutdown: CancellationToken) -> Result<PrometheusHandle, Box<dyn std::error::Error>> {
    let addr: SocketAddr = addr.parse().map_err(|err| format!("invalid debug address {addr:?}: {err}"))?;

    let (recorder, exporter) = PrometheusBuilder::new().with_http_listener(addr).build()?;
    let handle = recorder.handle();
    metrics::set_global_recorder(recorder).map_err(|err| format!("failed to install metrics recorder: {err}"))?;

    tokio::spawn(async move {
        tokio::select! {
            () = shutdown.cancelled() => {},
            result = exporter => {
                if let Err(err) = result {
                    error!("Metrics exporter stopped: {err:?}");
                }
            },
        }
    });

    info!("Serving metrics on http://{addr}/metrics");
    Ok(handle)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {err}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(err) => {
                error!("Failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C"),
        () = terminate => info!("Received SIGTERM"),
    }
}
