// `autosync config`: show the resolved configuration for a repository.

use std::path::PathBuf;

use clap::Args;

use autosync_daemon::config::RepositoryConfig;

use super::load_repo_config;
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Repository to inspect (defaults to the current directory).
    path: Option<PathBuf>,

    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

pub fn run(args: ConfigArgs) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);
    match load_repo_config(args.path.as_deref()) {
        Ok(config) => {
            output::print_output(format, &config, format_human)?;
            Ok(())
        }
        Err(error) => {
            output::print_anyhow_error(format, &error);
            Err(error)
        }
    }
}

fn format_human(config: &RepositoryConfig) -> String {
    let exec = config
        .git_exec
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "git".to_string());
    let mut lines = vec![
        format!("root:          {}", config.root.display()),
        format!("poll interval: {}s", config.poll_interval.as_secs()),
        format!("settle delay:  {}s", config.settle_delay.as_secs()),
        format!("git:           {exec}"),
    ];
    for (key, value) in &config.env {
        lines.push(format!("env:           {key}={value}"));
    }
    lines.join("\n")
}
