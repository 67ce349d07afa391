use std::error::Error;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;

mod cli;

use toolrelay_common::RelayConfig;
use toolrelay_core::{UpstreamClientConfig, WreqUpstreamClient};
use toolrelay_router::{RelayState, relay_router};

use crate::cli::Cli;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("toolrelay failed: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn Error + Send + Sync>> {
    let config = load_config()?;
    init_tracing(config.debug);
    info!(
        host = %config.host,
        port = config.port,
        base_url = %config.base_url,
        debug = config.debug,
        first_byte_timeout_secs = config.first_byte_timeout.as_secs(),
        "config loaded"
    );

    let client = WreqUpstreamClient::new(UpstreamClientConfig::from_relay(&config))
        .context("build upstream client")?;
    let app = relay_router(RelayState::new(Arc::new(client), config.debug));

    let bind = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("bind {bind}"))?;
    info!(addr = %bind, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn load_config() -> anyhow::Result<RelayConfig> {
    let patch = Cli::parse().into_patch()?;
    patch.into_config().context("finalize relay config")
}

fn init_tracing(debug: bool) {
    let default = if debug {
        "toolrelay=debug"
    } else {
        "toolrelay=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
