// autosyncd: watches every repository listed in ~/.autosync/config.toml.

use anyhow::Context;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("starting autosync daemon");
    autosync_daemon::runtime::run_standalone().await.context("autosync daemon terminated unexpectedly")
}
