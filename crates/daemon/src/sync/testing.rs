// Scripted `VcsBackend` for pipeline tests.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use autosync_common::branch::BranchInfo;
use autosync_common::staged::StagedChange;

use crate::git::{FailureKind, GitError, VcsBackend};

pub(crate) fn git_error(kind: FailureKind, stderr: &str) -> GitError {
    GitError {
        kind,
        command: "git scripted".to_string(),
        env: Vec::new(),
        code: Some(1),
        stdout: String::new(),
        stderr: stderr.to_string(),
        attempts: 1,
    }
}

type Script = Mutex<VecDeque<Result<(), GitError>>>;

/// Records every call as a short string (`"push origin main"`) and answers
/// from queued results. An empty queue answers `Ok`.
pub(crate) struct ScriptedBackend {
    root: PathBuf,
    pub calls: Mutex<Vec<String>>,
    pub has_staged: bool,
    pub staged: Vec<StagedChange>,
    pub ignored: Vec<String>,
    pub upstream: BranchInfo,
    pub stage_results: Script,
    pub commit_results: Script,
    pub push_results: Script,
    pub fetch_results: Script,
    pub rebase_results: Script,
}

impl ScriptedBackend {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            calls: Mutex::new(Vec::new()),
            has_staged: false,
            staged: Vec::new(),
            ignored: Vec::new(),
            upstream: BranchInfo::default(),
            stage_results: Mutex::new(VecDeque::new()),
            commit_results: Mutex::new(VecDeque::new()),
            push_results: Mutex::new(VecDeque::new()),
            fetch_results: Mutex::new(VecDeque::new()),
            rebase_results: Mutex::new(VecDeque::new()),
        }
    }

    pub fn with_staged(mut self, staged: &[(&str, &str)]) -> Self {
        self.has_staged = !staged.is_empty();
        self.staged = staged.iter().map(|(s, p)| StagedChange::new(*s, *p)).collect();
        self
    }

    pub fn with_ignored(mut self, ignored: &[&str]) -> Self {
        self.ignored = ignored.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn with_upstream(mut self, remote: &str, branch: &str) -> Self {
        self.upstream = BranchInfo {
            upstream_remote: remote.to_string(),
            upstream_branch: branch.to_string(),
        };
        self
    }

    pub fn script(queue: &Script, results: Vec<Result<(), GitError>>) {
        queue.lock().unwrap().extend(results);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn answer(queue: &Script) -> Result<(), GitError> {
        queue.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }
}

impl VcsBackend for ScriptedBackend {
    fn repo_root(&self) -> &Path {
        &self.root
    }

    fn refresh(&self) {
        self.record("refresh".into());
    }

    fn stage_all(&self) -> Result<(), GitError> {
        self.record("stage_all".into());
        Self::answer(&self.stage_results)
    }

    fn has_staged_changes(&self) -> Result<bool, GitError> {
        self.record("has_staged_changes".into());
        Ok(self.has_staged)
    }

    fn staged_changes(&self) -> Result<Vec<StagedChange>, GitError> {
        self.record("staged_changes".into());
        Ok(self.staged.clone())
    }

    fn unstage_all(&self) -> Result<(), GitError> {
        self.record("unstage_all".into());
        Ok(())
    }

    fn unstage_paths(&self, paths: &[String]) -> Result<(), GitError> {
        self.record(format!("unstage_paths {}", paths.join(",")));
        Ok(())
    }

    fn commit(&self, message: &str) -> Result<(), GitError> {
        self.record(format!("commit {message}"));
        Self::answer(&self.commit_results)
    }

    fn upstream(&self) -> Result<BranchInfo, GitError> {
        self.record("upstream".into());
        Ok(self.upstream.clone())
    }

    fn fetch(&self, remote: &str) -> Result<(), GitError> {
        self.record(format!("fetch {remote}"));
        Self::answer(&self.fetch_results)
    }

    fn rebase(&self, onto: &str) -> Result<(), GitError> {
        self.record(format!("rebase {onto}"));
        Self::answer(&self.rebase_results)
    }

    fn abort_rebase(&self) -> Result<(), GitError> {
        self.record("abort_rebase".into());
        Ok(())
    }

    fn push(&self, remote: &str, branch: &str) -> Result<(), GitError> {
        self.record(format!("push {remote} {branch}"));
        Self::answer(&self.push_results)
    }

    fn is_ignored(&self, relative: &Path) -> Result<bool, GitError> {
        Ok(self.ignored.iter().any(|p| Path::new(p) == relative))
    }
}
