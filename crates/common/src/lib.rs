// autosync-common: shared types for the autosync workspace

pub mod branch;
pub mod change;
pub mod remote;
pub mod staged;
