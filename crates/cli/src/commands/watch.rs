// `autosync watch`: foreground watch of one repository.

use std::future::Future;
use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use tokio::sync::watch;
use tracing::{info, warn};

use autosync_daemon::watcher::watch_repository;

use super::load_repo_config;
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Repository to watch (defaults to the current directory).
    path: Option<PathBuf>,
}

pub fn run(args: WatchArgs) -> anyhow::Result<()> {
    let format = OutputFormat::detect(false);
    let result = watch_until_interrupted(args);
    if let Err(error) = &result {
        output::print_anyhow_error(format, error);
    }
    result
}

fn watch_until_interrupted(args: WatchArgs) -> anyhow::Result<()> {
    let config = load_repo_config(args.path.as_deref())?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    runtime.block_on(async move {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(forward_interrupt(tokio::signal::ctrl_c(), shutdown_tx));
        watch_repository(config, shutdown_rx).await
    })
}

/// Request shutdown once `interrupt` fires. If the signal handler cannot be
/// installed the watch keeps running, holding the sender so the coordinator
/// does not read its closure as a shutdown.
async fn forward_interrupt(
    interrupt: impl Future<Output = std::io::Result<()>>,
    shutdown_tx: watch::Sender<bool>,
) {
    match interrupt.await {
        Ok(()) => {
            info!("watch: interrupted, shutting down");
            let _ = shutdown_tx.send(true);
        }
        Err(error) => {
            warn!(error = %error, "watch: cannot listen for ctrl-c, stop the process another way");
            std::future::pending::<()>().await;
        }
    }
}
