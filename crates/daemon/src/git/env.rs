// Child-process environment for git invocations.
//
// Git runs with a minimal, deterministic environment: the repository's extra
// variables plus a fixed allow-list copied from the ambient environment.

use std::collections::BTreeMap;

/// Ambient variables git needs to resolve identity, config, and binaries.
pub const ALLOWED_AMBIENT_VARS: [&str; 4] = ["HOME", "PATH", "USER", "LOGNAME"];

pub const SSH_AUTH_SOCK: &str = "SSH_AUTH_SOCK";

/// Source of the parent process environment.
pub trait AmbientEnv: Send + Sync {
    fn var(&self, key: &str) -> Option<String>;
}

/// Reads the real process environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnv;

impl AmbientEnv for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// A fixed set of variables, for tests and embedding.
#[derive(Debug, Default, Clone)]
pub struct FixedEnv(BTreeMap<String, String>);

impl FixedEnv {
    pub fn new<K, V>(vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self(vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl AmbientEnv for FixedEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.0.get(key).cloned()
    }
}

/// Build the child environment: caller-supplied variables first, then the
/// allow-listed ambient ones. A caller-supplied key shadows the ambient one.
pub fn sanitized_env(extra: &[(String, String)], ambient: &dyn AmbientEnv) -> Vec<(String, String)> {
    let mut env: Vec<(String, String)> = extra.to_vec();
    for key in ALLOWED_AMBIENT_VARS {
        if env.iter().any(|(existing, _)| existing == key) {
            continue;
        }
        if let Some(value) = ambient.var(key) {
            env.push((key.to_string(), value));
        }
    }
    env
}

/// True when the parent has an SSH agent that the child will not see.
pub fn ssh_agent_withheld(child_env: &[(String, String)], ambient: &dyn AmbientEnv) -> bool {
    ambient.var(SSH_AUTH_SOCK).is_some() && !child_env.iter().any(|(key, _)| key == SSH_AUTH_SOCK)
}
