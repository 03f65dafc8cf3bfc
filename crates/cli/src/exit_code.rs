// Consistent exit codes for the autosync CLI.
//
//   0 = success
//   1 = general error
//   2 = usage/argument error
//   3 = repository not found or not openable

use std::process;

use autosync_daemon::config::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    Error = 1,
    Usage = 2,
    RepoNotFound = 3,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Map an anyhow error to an exit code by inspecting the error chain.
    pub fn from_error(err: &anyhow::Error) -> Self {
        for cause in err.chain() {
            if let Some(config_err) = cause.downcast_ref::<ConfigError>() {
                return match config_err {
                    ConfigError::NotARepository { .. } => Self::RepoNotFound,
                    ConfigError::DuplicateRepo(_) | ConfigError::UnknownRepo(_) => Self::Usage,
                    _ => Self::Error,
                };
            }
        }
        Self::Error
    }
}

impl From<ExitCode> for process::ExitCode {
    fn from(code: ExitCode) -> Self {
        process::ExitCode::from(code.code() as u8)
    }
}
