//! Snapshot reading: files the game rewrites wholesale.
//!
//! `Status.json`, `Market.json`, `NavRoute.json` and `Cargo.json` each hold a
//! single JSON object. Every poll reads the whole file and compares its
//! fingerprint with the last content handed downstream.

use std::{
    io::{self, Read},
    path::{Path, PathBuf},
};

use serde_json::Value;
use tracing::{debug, warn};

use crate::fingerprint::fingerprint;

use super::{RetryPolicy, TailError, TailState, open_shared, strip_bom};

/// What one snapshot poll found.
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotUpdate {
    /// Same content as last time.
    Unchanged,

    /// Missing, empty, locked, or malformed this cycle.
    Unavailable,

    /// New content, parsed.
    Changed(Value),
}

/// Re-reads one snapshot file, reporting changes only.
#[derive(Debug)]
pub struct SnapshotTailer {
    state: TailState,
    retry: RetryPolicy,
}

impl SnapshotTailer {
    pub fn new(path: impl Into<PathBuf>, retry: RetryPolicy) -> Self {
        Self {
            state: TailState::new(path),
            retry,
        }
    }

    /// Forgets the last fingerprint, so the next successful read reports a change.
    pub fn reset(&mut self) {
        self.state.last_content_hash = None;
    }

    pub fn poll(&mut self) -> Result<SnapshotUpdate, TailError> {
        let path = &self.state.file_path;
        let content = match self.retry.run(|| read_snapshot(path)) {
            Ok(Some(content)) => content,
            Ok(None) => {
                debug!(file = %path.display(), "snapshot empty or locked after retries");
                return Ok(SnapshotUpdate::Unavailable);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(SnapshotUpdate::Unavailable);
            }
            Err(e) => return Err(e.into()),
        };

        let print = fingerprint(&content);
        if self.state.last_content_hash.as_deref() == Some(print.as_str()) {
            return Ok(SnapshotUpdate::Unchanged);
        }

        match serde_json::from_slice::<Value>(strip_bom(&content)) {
            Ok(value) if value.is_object() => {
                self.state.last_content_hash = Some(print);
                Ok(SnapshotUpdate::Changed(value))
            }
            Ok(_) => {
                warn!(file = %path.display(), "snapshot is not a JSON object; skipping");
                Ok(SnapshotUpdate::Unavailable)
            }
            Err(e) => {
                warn!(file = %path.display(), error = %e, "malformed snapshot; skipping");
                Ok(SnapshotUpdate::Unavailable)
            }
        }
    }
}

/// Reads the whole file. An empty file is reported as `UnexpectedEof` so the
/// retry policy treats it as the writer caught mid-rewrite.
fn read_snapshot(path: &Path) -> io::Result<Vec<u8>> {
    let mut file = open_shared(path)?;
    let mut content = Vec::new();
    file.read_to_end(&mut content)?;
    if content.iter().all(u8::is_ascii_whitespace) {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "snapshot file is empty",
        ));
    }
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::{fs, time::Duration};

    use tempfile::TempDir;

    fn tailer(path: &Path) -> SnapshotTailer {
        SnapshotTailer::new(
            path,
            RetryPolicy {
                attempts: 2,
                delay: Duration::from_millis(1),
            },
        )
    }

    #[test]
    fn reports_change_then_unchanged() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Status.json");
        fs::write(&path, r#"{"Flags":16}"#).unwrap();

        let mut t = tailer(&path);
        let SnapshotUpdate::Changed(value) = t.poll().unwrap() else {
            panic!("expected a change");
        };
        assert_eq!(value["Flags"], 16);

        assert_eq!(t.poll().unwrap(), SnapshotUpdate::Unchanged);
        assert_eq!(t.poll().unwrap(), SnapshotUpdate::Unchanged);
    }

    #[test]
    fn rewrite_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Status.json");
        fs::write(&path, r#"{"Flags":16}"#).unwrap();

        let mut t = tailer(&path);
        t.poll().unwrap();
        fs::write(&path, r#"{"Flags":24}"#).unwrap();

        assert!(matches!(t.poll().unwrap(), SnapshotUpdate::Changed(v) if v["Flags"] == 24));
    }

    #[test]
    fn empty_file_is_unavailable_not_empty_state() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Market.json");
        fs::write(&path, "").unwrap();

        let mut t = tailer(&path);
        assert_eq!(t.poll().unwrap(), SnapshotUpdate::Unavailable);

        fs::write(&path, r#"{"MarketID":1}"#).unwrap();
        assert!(matches!(t.poll().unwrap(), SnapshotUpdate::Changed(_)));
    }

    #[test]
    fn missing_file_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let mut t = tailer(&dir.path().join("NavRoute.json"));

        assert_eq!(t.poll().unwrap(), SnapshotUpdate::Unavailable);
    }

    #[test]
    fn malformed_content_is_skipped_and_retried() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Cargo.json");
        fs::write(&path, r#"{"Inventory":["#).unwrap();

        let mut t = tailer(&path);
        assert_eq!(t.poll().unwrap(), SnapshotUpdate::Unavailable);

        fs::write(&path, r#"{"Inventory":[]}"#).unwrap();
        assert!(matches!(t.poll().unwrap(), SnapshotUpdate::Changed(_)));
    }

    #[test]
    fn reset_reports_same_content_again() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Status.json");
        fs::write(&path, "\u{feff}{\"Flags\":1}").unwrap();

        let mut t = tailer(&path);
        assert!(matches!(t.poll().unwrap(), SnapshotUpdate::Changed(_)));
        t.reset();
        assert!(matches!(t.poll().unwrap(), SnapshotUpdate::Changed(_)));
    }
}
