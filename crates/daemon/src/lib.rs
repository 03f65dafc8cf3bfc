// autosync-daemon library: sync engine, watcher, and daemon runtime.

pub mod activity;
pub mod config;
pub mod git;
pub mod ignore;
pub mod runtime;
pub mod sync;
pub mod watcher;
