// Git command executor: resolves the binary, sanitizes the environment,
// injects credential hints, and retries through index lock contention.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::SystemTime;

use autosync_common::branch::BranchInfo;
use autosync_common::remote::{is_ssh_url, HostingProvider};
use autosync_common::staged::{parse_name_status, StagedChange};
use tracing::{debug, warn};

use super::backend::VcsBackend;
use super::env::{sanitized_env, ssh_agent_withheld, AmbientEnv, ProcessEnv};
use super::error::{FailureKind, GitError};
use super::lock::{lock_path_from_stderr, remove_if_stale, LockRetryPolicy};
use crate::config::RepositoryConfig;

const DEFAULT_GIT: &str = "git";
const DEFAULT_REMOTE: &str = "origin";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitCommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub code: Option<i32>,
}

/// Captured result of one external process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Spawns exactly one external process per call.
pub trait CommandExecutor: Send + Sync {
    fn execute(
        &self,
        program: &str,
        args: &[String],
        cwd: &Path,
        env: &[(String, String)],
    ) -> Result<CommandResult, std::io::Error>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessCommandExecutor;

impl CommandExecutor for ProcessCommandExecutor {
    fn execute(
        &self,
        program: &str,
        args: &[String],
        cwd: &Path,
        env: &[(String, String)],
    ) -> Result<CommandResult, std::io::Error> {
        let output = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .env_clear()
            .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .output()?;
        Ok(CommandResult {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

pub struct GitWorker<E = ProcessCommandExecutor> {
    repo_path: PathBuf,
    program: String,
    extra_env: Vec<(String, String)>,
    executor: E,
    ambient: Arc<dyn AmbientEnv>,
    lock_policy: LockRetryPolicy,
    remote_url: Mutex<Option<Option<String>>>,
    remote_pinned: bool,
    ssh_warned: AtomicBool,
}

impl GitWorker<ProcessCommandExecutor> {
    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self::with_executor(repo_path, ProcessCommandExecutor)
    }

    /// Worker for a loaded repository: alternate executable and extra
    /// environment come from the configuration.
    pub fn from_config(config: &RepositoryConfig) -> Self {
        let mut worker = Self::new(&config.root).with_env(config.env.clone());
        if let Some(exec) = &config.git_exec {
            worker = worker.with_program(exec.to_string_lossy());
        }
        worker
    }
}

impl<E: CommandExecutor> GitWorker<E> {
    pub fn with_executor(repo_path: impl Into<PathBuf>, executor: E) -> Self {
        Self {
            repo_path: repo_path.into(),
            program: DEFAULT_GIT.to_string(),
            extra_env: Vec::new(),
            executor,
            ambient: Arc::new(ProcessEnv),
            lock_policy: LockRetryPolicy::default(),
            remote_url: Mutex::new(None),
            remote_pinned: false,
            ssh_warned: AtomicBool::new(false),
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_env(mut self, env: Vec<(String, String)>) -> Self {
        self.extra_env = env;
        self
    }

    pub fn with_ambient(mut self, ambient: impl AmbientEnv + 'static) -> Self {
        self.ambient = Arc::new(ambient);
        self
    }

    pub fn with_lock_policy(mut self, policy: LockRetryPolicy) -> Self {
        self.lock_policy = policy;
        self
    }

    /// Pin the `origin` URL instead of asking git for it.
    pub fn with_remote_url(mut self, url: Option<String>) -> Self {
        self.remote_url = Mutex::new(Some(url));
        self.remote_pinned = true;
        self
    }

    /// `origin` URL, cached until the next `refresh`.
    pub fn remote_url(&self) -> Option<String> {
        if let Some(cached) = self.remote_url.lock().unwrap_or_else(PoisonError::into_inner).as_ref() {
            return cached.clone();
        }
        let url = self.lookup_remote_url();
        *self.remote_url.lock().unwrap_or_else(PoisonError::into_inner) = Some(url.clone());
        url
    }

    /// Read a single git config value; `None` when the key is unset.
    pub fn config_get(&self, key: &str) -> Result<Option<String>, GitError> {
        let output = self.run_with(args(&["config", "--get", key]), &[1])?;
        if output.code == Some(1) {
            return Ok(None);
        }
        Ok(Some(output.stdout.trim().to_string()))
    }

    /// Top level of the working tree containing `repo_path`.
    pub fn show_toplevel(&self) -> Result<PathBuf, GitError> {
        let output = self.run(args(&["rev-parse", "--show-toplevel"]))?;
        Ok(PathBuf::from(output.stdout.trim()))
    }

    /// Run `git <args>`; any non-zero exit is an error.
    pub fn run(&self, args: Vec<String>) -> Result<GitCommandOutput, GitError> {
        self.run_with(args, &[])
    }

    /// Run `git <args>`, treating exit codes in `accept` as answers rather
    /// than failures.
    ///
    /// Index lock contention is retried with exponential backoff, removing
    /// the lock first when it is older than the staleness threshold.
    pub fn run_with(
        &self,
        args: Vec<String>,
        accept: &[i32],
    ) -> Result<GitCommandOutput, GitError> {
        let env = sanitized_env(&self.extra_env, self.ambient.as_ref());
        self.warn_if_ssh_agent_withheld(&env);

        let args = self.with_credential_hint(args);
        let command = format!("{} {}", self.program, args.join(" "));
        let policy = self.lock_policy;

        let mut attempt = 1;
        loop {
            let result = self
                .executor
                .execute(&self.program, &args, &self.repo_path, &env)
                .map_err(|error| GitError::spawn(command.clone(), env.clone(), &error))?;

            if result.success || result.code.is_some_and(|code| accept.contains(&code)) {
                return Ok(GitCommandOutput {
                    stdout: result.stdout,
                    stderr: result.stderr,
                    code: result.code,
                });
            }

            let kind = FailureKind::classify(&result.stderr);
            if kind == FailureKind::IndexLocked && attempt < policy.max_attempts {
                let lock = lock_path_from_stderr(&result.stderr, &self.repo_path);
                remove_if_stale(&lock, policy.stale_after, SystemTime::now());

                let delay = policy.backoff_for(attempt);
                debug!(
                    repo = %self.repo_path.display(),
                    %command,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "git: index locked, retrying"
                );
                std::thread::sleep(delay);
                attempt += 1;
                continue;
            }

            return Err(GitError {
                kind,
                command,
                env,
                code: result.code,
                stdout: result.stdout,
                stderr: result.stderr,
                attempts: attempt,
            });
        }
    }

    fn with_credential_hint(&self, args: Vec<String>) -> Vec<String> {
        let Some(provider) = self.remote_url().as_deref().and_then(HostingProvider::detect) else {
            return args;
        };
        let mut hinted = vec!["-c".to_string(), provider.credential_helper().to_string()];
        hinted.extend(args);
        hinted
    }

    fn warn_if_ssh_agent_withheld(&self, env: &[(String, String)]) {
        if self.ssh_warned.load(Ordering::Relaxed) {
            return;
        }
        if !ssh_agent_withheld(env, self.ambient.as_ref()) {
            return;
        }
        if !self.remote_url().as_deref().is_some_and(is_ssh_url) {
            return;
        }
        if !self.ssh_warned.swap(true, Ordering::Relaxed) {
            warn!(
                repo = %self.repo_path.display(),
                "git: SSH_AUTH_SOCK is not passed to git but the remote uses SSH"
            );
        }
    }

    fn lookup_remote_url(&self) -> Option<String> {
        let env = sanitized_env(&self.extra_env, self.ambient.as_ref());
        let argv = args(&["remote", "get-url", DEFAULT_REMOTE]);
        let result = self.executor.execute(&self.program, &argv, &self.repo_path, &env).ok()?;
        if !result.success {
            return None;
        }
        let url = result.stdout.trim();
        (!url.is_empty()).then(|| url.to_string())
    }
}

impl<E: CommandExecutor> VcsBackend for GitWorker<E> {
    fn repo_root(&self) -> &Path {
        &self.repo_path
    }

    fn refresh(&self) {
        if !self.remote_pinned {
            *self.remote_url.lock().unwrap_or_else(PoisonError::into_inner) = None;
        }
    }

    fn stage_all(&self) -> Result<(), GitError> {
        self.run(args(&["add", "-A"])).map(drop)
    }

    fn has_staged_changes(&self) -> Result<bool, GitError> {
        // `diff --quiet` exits 1 when there are differences.
        let output = self.run_with(args(&["diff", "--cached", "--quiet"]), &[1])?;
        Ok(output.code == Some(1))
    }

    fn staged_changes(&self) -> Result<Vec<StagedChange>, GitError> {
        // Without --no-renames a rename is one entry keyed by its destination,
        // and the source's deletion would share that path's ignore verdict.
        let argv = args(&["diff", "--cached", "--name-status", "--no-renames", "-z"]);
        let command = format!("{} {}", self.program, argv.join(" "));
        let output = self.run(argv)?;
        parse_name_status(&output.stdout)
            .map_err(|error| GitError::unexpected_output(command, output.stdout, error.to_string()))
    }

    fn unstage_all(&self) -> Result<(), GitError> {
        self.run(args(&["reset", "-q"])).map(drop)
    }

    fn unstage_paths(&self, paths: &[String]) -> Result<(), GitError> {
        if paths.is_empty() {
            return Ok(());
        }
        let mut argv = args(&["reset", "-q", "--"]);
        argv.extend(paths.iter().cloned());
        self.run(argv).map(drop)
    }

    fn commit(&self, message: &str) -> Result<(), GitError> {
        self.run(vec!["commit".to_string(), "-q".to_string(), "-m".to_string(), message.to_string()])
            .map(drop)
    }

    fn upstream(&self) -> Result<BranchInfo, GitError> {
        let head = self.run_with(args(&["symbolic-ref", "--quiet", "--short", "HEAD"]), &[1])?;
        let branch = head.stdout.trim();
        if head.code == Some(1) || branch.is_empty() {
            return Ok(BranchInfo::default());
        }

        let remote = self.config_get(&format!("branch.{branch}.remote"))?;
        let merge = self.config_get(&format!("branch.{branch}.merge"))?;
        match (remote, merge) {
            (Some(remote), Some(merge)) => Ok(BranchInfo::from_tracking(&remote, &merge)),
            _ => Ok(BranchInfo::default()),
        }
    }

    fn fetch(&self, remote: &str) -> Result<(), GitError> {
        self.run(vec!["fetch".to_string(), remote.to_string()]).map(drop)
    }

    fn rebase(&self, onto: &str) -> Result<(), GitError> {
        self.run(vec!["rebase".to_string(), onto.to_string()]).map(drop)
    }

    fn abort_rebase(&self) -> Result<(), GitError> {
        self.run(args(&["rebase", "--abort"])).map(drop)
    }

    fn push(&self, remote: &str, branch: &str) -> Result<(), GitError> {
        self.run(vec!["push".to_string(), remote.to_string(), format!("HEAD:{branch}")]).map(drop)
    }

    fn is_ignored(&self, relative: &Path) -> Result<bool, GitError> {
        let mut argv = args(&["check-ignore", "-q", "--no-index", "--"]);
        argv.push(relative.to_string_lossy().into_owned());
        let output = self.run_with(argv, &[1])?;
        Ok(output.code == Some(0))
    }
}

fn args(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|part| part.to_string()).collect()
}
