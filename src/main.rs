use anyhow::{anyhow, Context, Result};
use grpc_prom::config::ServerConfig;
use grpc_prom::metrics::ServerMetrics;
use grpc_prom::scrape::serve_metrics;
use grpc_prom::service::DemoServer;
use prometheus::Registry;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::TcpListenerStream;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing().context("initialize tracing subscriber")?;

    if let Err(err) = run().await {
        tracing::error!(error = ?err, "fatal server error");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<()> {
    let config = ServerConfig::load().context("load configuration from environment")?;

    let extractor = config.label_extractor().context("build label extractor")?;
    let metrics = match config.buckets().context("parse histogram buckets")? {
        Some(buckets) => ServerMetrics::with_buckets(extractor, buckets),
        None => ServerMetrics::new(extractor),
    }
    .context("create server metrics")?;

    let registry = Registry::new();
    registry
        .register(Box::new(metrics.clone()))
        .context("register server metrics")?;

    info!(
        grpc = %config.grpc_addr,
        metrics = %config.metrics_addr,
        labels = ?metrics.label_names(),
        "gRPC metrics demo starting"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let metrics_task = {
        let mut rx = shutdown_rx.clone();
        let label_names = Arc::clone(metrics.label_names());
        tokio::spawn(serve_metrics(
            config.metrics_addr,
            registry,
            label_names,
            async move {
                let _ = rx.changed().await;
            },
        ))
    };

    let grpc_listener = TcpListener::bind(config.grpc_addr)
        .await
        .with_context(|| format!("bind gRPC address {}", config.grpc_addr))?;
    info!(address = %grpc_listener.local_addr()?, "gRPC server listening");

    let grpc_task = {
        let mut rx = shutdown_rx;
        let service = DemoServer::new(metrics.interceptor()).into_service();
        tokio::spawn(async move {
            tonic::transport::Server::builder()
                .add_service(service)
                .serve_with_incoming_shutdown(TcpListenerStream::new(grpc_listener), async move {
                    let _ = rx.changed().await;
                })
                .await
        })
    };

    let servers = async move {
        tokio::try_join!(join(grpc_task, "gRPC server"), join(metrics_task, "metrics server"))
            .map(|_| ())
    };
    tokio::pin!(servers);

    tokio::select! {
        res = &mut servers => {
            return res.context("server stopped unexpectedly");
        }
        res = tokio::signal::ctrl_c() => {
            if let Err(err) = res {
                warn!(error = %err, "ctrl_c listener error");
            }
            info!("Shutdown signal received, exiting");
        }
    }

    let _ = shutdown_tx.send(true);
    servers.await
}

async fn join<E>(task: JoinHandle<std::result::Result<(), E>>, what: &'static str) -> Result<()>
where
    E: std::error::Error + Send + Sync + 'static,
{
    task.await
        .with_context(|| format!("{what} task panicked"))?
        .with_context(|| format!("{what} failed"))
}

fn init_tracing() -> Result<()> {
    let env_filter =
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info,hyper=warn,tonic=warn".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(env_filter))
        .with_target(false)
        .try_init()
        .map_err(|err| anyhow!("tracing subscriber init: {err}"))
}
