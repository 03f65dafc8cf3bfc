// Staged changes: parsing `git diff --cached --name-status -z` output.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One staged entry: the status code git reports and the affected path.
///
/// For renames and copies the path is the destination.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StagedChange {
    pub status: String,
    pub path: String,
}

impl StagedChange {
    pub fn new(status: impl Into<String>, path: impl Into<String>) -> Self {
        Self { status: status.into(), path: path.into() }
    }
}

impl fmt::Display for StagedChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.status, self.path)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NameStatusError {
    #[error("name-status entry `{status}` is missing its path")]
    MissingPath { status: String },

    #[error("empty status code in name-status output")]
    EmptyStatus,
}

/// Parse NUL-separated name-status output.
///
/// Each record is `STATUS\0PATH\0`, except renames (`R<score>`) and copies
/// (`C<score>`) which carry two paths: `STATUS\0SRC\0DST\0`.
pub fn parse_name_status(raw: &str) -> Result<Vec<StagedChange>, NameStatusError> {
    let mut fields = raw.split('\0').filter(|field| !field.is_empty());
    let mut changes = Vec::new();

    while let Some(status) = fields.next() {
        let status = status.trim();
        if status.is_empty() {
            return Err(NameStatusError::EmptyStatus);
        }

        let missing = || NameStatusError::MissingPath { status: status.to_string() };
        let mut path = fields.next().ok_or_else(missing)?;
        if has_two_paths(status) {
            path = fields.next().ok_or_else(missing)?;
        }

        changes.push(StagedChange::new(status, path));
    }

    Ok(changes)
}

fn has_two_paths(status: &str) -> bool {
    status.starts_with('R') || status.starts_with('C')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_entries() {
        let raw = "M\0b.txt\0A\0a.txt\0D\0old/gone.md\0";
        let changes = parse_name_status(raw).unwrap();
        assert_eq!(
            changes,
            vec![
                StagedChange::new("M", "b.txt"),
                StagedChange::new("A", "a.txt"),
                StagedChange::new("D", "old/gone.md"),
            ]
        );
    }

    #[test]
    fn rename_keeps_destination_path() {
        let raw = "R100\0notes/old name.md\0notes/new name.md\0";
        let changes = parse_name_status(raw).unwrap();
        assert_eq!(changes, vec![StagedChange::new("R100", "notes/new name.md")]);
    }

    #[test]
    fn copy_keeps_destination_path() {
        let raw = "C75\0a.txt\0b.txt\0M\0c.txt\0";
        let changes = parse_name_status(raw).unwrap();
        assert_eq!(changes[0], StagedChange::new("C75", "b.txt"));
        assert_eq!(changes[1], StagedChange::new("M", "c.txt"));
    }

    #[test]
    fn empty_output_has_no_changes() {
        assert!(parse_name_status("").unwrap().is_empty());
        assert!(parse_name_status("\0").unwrap().is_empty());
    }

    #[test]
    fn truncated_record_is_an_error() {
        let error = parse_name_status("M\0a.txt\0R100\0only-source.txt\0").unwrap_err();
        assert_eq!(error, NameStatusError::MissingPath { status: "R100".into() });
    }

    #[test]
    fn display_joins_status_and_path() {
        assert_eq!(StagedChange::new("A", "a.txt").to_string(), "A a.txt");
    }
}
