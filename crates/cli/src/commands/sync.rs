// `autosync sync`: one commit-and-push attempt.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;

use autosync_daemon::sync::{AutoSync, CommitOutcome, PushOutcome, SyncReport};

use super::load_repo_config;
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct SyncArgs {
    /// Repository to sync (defaults to the current directory).
    path: Option<PathBuf>,

    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

pub fn run(args: SyncArgs) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);
    let result = sync_once(args.path);
    match result {
        Ok(report) => {
            output::print_output(format, &report, format_human)?;
            Ok(())
        }
        Err(error) => {
            output::print_anyhow_error(format, &error);
            Err(error)
        }
    }
}

fn sync_once(path: Option<PathBuf>) -> anyhow::Result<SyncReport> {
    let config = load_repo_config(path.as_deref())?;
    AutoSync::from_config(&config)
        .run_once()
        .with_context(|| format!("sync failed for {}", config.root.display()))
}

fn format_human(report: &SyncReport) -> String {
    let commit = match &report.commit {
        CommitOutcome::Clean => "nothing to commit".to_string(),
        CommitOutcome::IgnoredOnly { unstaged } => {
            format!("nothing to commit ({unstaged} ignored path(s) unstaged)")
        }
        CommitOutcome::Committed { changes } => {
            let mut lines = vec![format!("committed {} change(s):", changes.len())];
            lines.extend(changes.iter().map(|change| format!("  {change}")));
            lines.join("\n")
        }
    };
    let push = match &report.push {
        PushOutcome::NoUpstream => "no upstream configured, push skipped".to_string(),
        PushOutcome::Pushed { remote, branch, attempts: 1 } => format!("pushed to {remote}/{branch}"),
        PushOutcome::Pushed { remote, branch, attempts } => {
            format!("pushed to {remote}/{branch} after {attempts} attempts")
        }
    };
    format!("{commit}\n{push}")
}
