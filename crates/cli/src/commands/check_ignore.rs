// `autosync check-ignore`: evaluate the ignore filter for paths.

use std::path::PathBuf;

use clap::Args;
use serde::Serialize;

use autosync_daemon::git::GitWorker;
use autosync_daemon::ignore::should_ignore;

use super::{absolutize, load_repo_config};
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct CheckIgnoreArgs {
    /// Paths to check, relative to the current directory.
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Repository the paths belong to (defaults to the current directory).
    #[arg(long)]
    repo: Option<PathBuf>,

    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct IgnoreVerdict {
    pub path: PathBuf,
    pub ignored: bool,
}

pub fn run(args: CheckIgnoreArgs) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);
    match check(&args) {
        Ok(verdicts) => {
            output::print_output(format, &verdicts, |v| format_human(v))?;
            Ok(())
        }
        Err(error) => {
            output::print_anyhow_error(format, &error);
            Err(error)
        }
    }
}

fn check(args: &CheckIgnoreArgs) -> anyhow::Result<Vec<IgnoreVerdict>> {
    let config = load_repo_config(args.repo.as_deref())?;
    let worker = GitWorker::from_config(&config);

    args.paths
        .iter()
        .map(|path| -> anyhow::Result<IgnoreVerdict> {
            let absolute = absolutize(path)?;
            let ignored = should_ignore(&worker, &config.root, &absolute)?;
            Ok(IgnoreVerdict { path: path.clone(), ignored })
        })
        .collect()
}

fn format_human(verdicts: &[IgnoreVerdict]) -> String {
    verdicts
        .iter()
        .map(|v| format!("{:<8} {}", if v.ignored { "ignored" } else { "synced" }, v.path.display()))
        .collect::<Vec<_>>()
        .join("\n")
}
