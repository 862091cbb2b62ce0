use anyhow::{anyhow, Context, Result};
use grpc_prom::client::{build_metadata, connect, Poller};
use grpc_prom::config::ClientConfig;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing().context("initialize tracing subscriber")?;

    if let Err(err) = run().await {
        tracing::error!(error = ?err, "demo client stopped");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<()> {
    let config = ClientConfig::load().context("load configuration from environment")?;
    let metadata = build_metadata(&config.metadata_pairs()?)?;

    let client = connect(config.endpoint.as_str()).await?;
    let poller = Poller::new(
        client,
        config.names(),
        metadata,
        Duration::from_secs(config.interval_secs),
    );

    info!(
        endpoint = %config.endpoint,
        interval_secs = config.interval_secs,
        "calling SayHello; type n to stop"
    );

    tokio::select! {
        res = poller.run() => res,
        _ = wait_for_stop() => {
            info!("stop requested");
            Ok(())
        }
        res = tokio::signal::ctrl_c() => {
            if let Err(err) = res {
                warn!(error = %err, "ctrl_c listener error");
            }
            info!("Shutdown signal received, exiting");
            Ok(())
        }
    }
}

/// Resolves once a line reading `n` or `N` arrives on stdin.
async fn wait_for_stop() {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().eq_ignore_ascii_case("n") => return,
            Ok(Some(_)) => continue,
            // stdin closed; keep polling until Ctrl-C
            Ok(None) => return std::future::pending().await,
            Err(err) => {
                warn!(error = %err, "stdin read failed");
                return std::future::pending().await;
            }
        }
    }
}

fn init_tracing() -> Result<()> {
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(env_filter))
        .with_target(false)
        .try_init()
        .map_err(|err| anyhow!("tracing subscriber init: {err}"))
}
