// Git command execution and the version-control backend built on it.

pub mod backend;
pub mod env;
pub mod error;
pub mod lock;
pub mod worker;

pub use backend::VcsBackend;
pub use error::{FailureKind, GitError};
pub use worker::{CommandExecutor, CommandResult, GitWorker, ProcessCommandExecutor};
