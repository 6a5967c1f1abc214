//! File tailing: follow the journal as it grows and re-read snapshot files.
//!
//! Two contracts live here:
//!
//! - [`JournalTailer`] follows an append-only journal directory. It remembers
//!   a byte offset, yields only complete lines, and switches to a newer file
//!   when the game rotates its journal.
//! - [`SnapshotTailer`] re-reads a single JSON file that the game rewrites
//!   wholesale (`Status.json`, `Market.json`, ...) and reports a change only
//!   when the content fingerprint moves.
//!
//! Both open files with shared access since the game keeps writing while we
//! read, and both retry transient lock failures through [`RetryPolicy`].

mod journal;
mod retry;
mod snapshot;

use std::{io, path::PathBuf};

use serde::Serialize;

pub use journal::JournalTailer;
pub use retry::RetryPolicy;
pub use snapshot::{SnapshotTailer, SnapshotUpdate};

/// Errors that abandon a single poll. The poll loop logs them and tries again
/// next cycle.
#[derive(Debug, thiserror::Error)]
pub enum TailError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Read position for one watched file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TailState {
    pub file_path: PathBuf,

    /// Bytes consumed so far. Always sits just past a newline.
    pub byte_offset: u64,

    /// Fingerprint of the last content handed downstream.
    /// `None` for append-only files, which track position by offset alone.
    pub last_content_hash: Option<String>,
}

impl TailState {
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
            byte_offset: 0,
            last_content_hash: None,
        }
    }
}

/// Strips a leading UTF-8 byte order mark.
fn strip_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes)
}

/// Opens a file for reading without blocking the game's writer.
#[cfg(windows)]
fn open_shared(path: &std::path::Path) -> io::Result<std::fs::File> {
    use std::os::windows::fs::OpenOptionsExt;

    // FILE_SHARE_READ | FILE_SHARE_WRITE | FILE_SHARE_DELETE
    std::fs::OpenOptions::new()
        .read(true)
        .share_mode(0x1 | 0x2 | 0x4)
        .open(path)
}

/// Opens a file for reading without blocking the game's writer.
#[cfg(not(windows))]
fn open_shared(path: &std::path::Path) -> io::Result<std::fs::File> {
    std::fs::File::open(path)
}
