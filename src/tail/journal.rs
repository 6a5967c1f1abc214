//! Journal tailing: follow the newest `Journal.*.log` in a directory.
//!
//! Journal file names embed a sortable timestamp and sequence number, so the
//! lexicographically last name is the current file. Names that don't fit
//! that shape are flagged once and left out rather than risk misordering.

use std::{
    collections::HashSet,
    ffi::OsString,
    fs,
    io::{self, Read, Seek, SeekFrom},
    path::{Path, PathBuf},
};

use tracing::{debug, info, warn};

use super::{RetryPolicy, TailError, TailState, open_shared, strip_bom};

const PREFIX: &str = "Journal.";
const SUFFIX: &str = ".log";

/// Polls to wait on an old journal that can't be drained before switching
/// to the new one regardless.
const MAX_DRAIN_DEFERRALS: u32 = 20;

/// Lines gathered by one poll.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TailBatch {
    /// Complete lines in file order.
    pub lines: Vec<String>,

    /// Whether the poll switched to a newer journal file.
    pub rotated: bool,
}

/// Follows the current journal file in a directory.
#[derive(Debug)]
pub struct JournalTailer {
    dir: PathBuf,
    retry: RetryPolicy,
    state: Option<TailState>,
    flagged: HashSet<OsString>,
    deferred_drains: u32,
}

impl JournalTailer {
    pub fn new(dir: impl Into<PathBuf>, retry: RetryPolicy) -> Self {
        Self {
            dir: dir.into(),
            retry,
            state: None,
            flagged: HashSet::new(),
            deferred_drains: 0,
        }
    }

    /// The file currently tracked, with its offset.
    pub fn state(&self) -> Option<&TailState> {
        self.state.as_ref()
    }

    /// Forgets the tracked file and offset. The next poll starts fresh.
    pub fn reset(&mut self) {
        self.state = None;
        self.flagged.clear();
        self.deferred_drains = 0;
    }

    /// Returns the lines appended since the last poll.
    ///
    /// When a newer journal file has appeared, any complete lines left unread
    /// in the old file are drained first, then tailing switches to the new
    /// file from offset zero. If the old file can't be read this poll, the
    /// switch waits for a later poll so its tail isn't lost. After
    /// `MAX_DRAIN_DEFERRALS` failed polls, or once the old file is gone, the
    /// switch happens anyway.
    pub fn poll(&mut self) -> Result<TailBatch, TailError> {
        let Some(latest) = self.latest_journal()? else {
            return Ok(TailBatch::default());
        };

        let mut batch = TailBatch::default();
        if let Some(state) = self.state.as_mut().filter(|s| s.file_path != latest) {
            let drained = match read_new_lines(state, &self.retry) {
                Ok(drained) => drained,
                Err(TailError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                    warn!(file = %state.file_path.display(), "rotated journal vanished before it was drained");
                    Some(Vec::new())
                }
                Err(e) => {
                    warn!(file = %state.file_path.display(), error = %e, "could not drain rotated journal");
                    None
                }
            };
            match drained {
                Some(lines) => batch.lines = lines,
                None if self.deferred_drains < MAX_DRAIN_DEFERRALS => {
                    self.deferred_drains += 1;
                    debug!(
                        file = %state.file_path.display(),
                        deferrals = self.deferred_drains,
                        "rotated journal not drained; switching later"
                    );
                    return Ok(batch);
                }
                None => {
                    warn!(file = %state.file_path.display(), "giving up on draining rotated journal");
                }
            }
            self.deferred_drains = 0;
            info!(
                from = %state.file_path.display(),
                to = %latest.display(),
                "journal rotated"
            );
            *state = TailState::new(latest.clone());
            batch.rotated = true;
        }

        let state = self.state.get_or_insert_with(|| {
            info!(file = %latest.display(), "tracking journal");
            TailState::new(latest)
        });
        batch.lines.extend(read_new_lines(state, &self.retry)?.unwrap_or_default());
        Ok(batch)
    }

    /// Finds the lexicographically last journal file in the directory.
    fn latest_journal(&mut self) -> Result<Option<PathBuf>, TailError> {
        let mut latest: Option<OsString> = None;
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type().is_ok_and(|t| t.is_file()) {
                continue;
            }
            let name = entry.file_name();
            let Some(text) = name.to_str() else {
                continue;
            };
            if !text.starts_with(PREFIX) || !text.ends_with(SUFFIX) {
                continue;
            }
            if !is_sortable(text) {
                if self.flagged.insert(name.clone()) {
                    warn!(file = text, "journal name is not sortable; ignoring it");
                }
                continue;
            }
            if latest.as_ref().is_none_or(|current| name > *current) {
                latest = Some(name);
            }
        }
        Ok(latest.map(|name| self.dir.join(name)))
    }
}

/// Whether a journal file name has the sortable `Journal.<stamp>[.<seq>].log`
/// shape: digits, dashes, `T`, and dots, starting with a digit.
fn is_sortable(name: &str) -> bool {
    // `Journal.log` matches both affixes but has no stem between them.
    let Some(stem) = name.strip_prefix(PREFIX).and_then(|rest| rest.strip_suffix(SUFFIX)) else {
        return false;
    };
    stem.starts_with(|c: char| c.is_ascii_digit())
        && stem
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '-' | 'T' | '.'))
}

/// Reads complete lines past the state's offset and advances it.
///
/// A trailing partial line stays unread so it comes back whole next time.
/// A file shorter than the offset was truncated and is read from the start.
/// Returns `None` when the file stayed locked through every retry.
fn read_new_lines(state: &mut TailState, retry: &RetryPolicy) -> Result<Option<Vec<String>>, TailError> {
    let offset = state.byte_offset;
    let Some((start, bytes)) = retry.run(|| read_from(&state.file_path, offset))? else {
        warn!(
            file = %state.file_path.display(),
            attempts = retry.attempts,
            "journal stayed locked; no lines this poll"
        );
        return Ok(None);
    };
    if start < offset {
        warn!(file = %state.file_path.display(), offset, "journal truncated; reading from start");
    }

    let Some(last_newline) = bytes.iter().rposition(|&b| b == b'\n') else {
        state.byte_offset = start;
        return Ok(Some(Vec::new()));
    };
    state.byte_offset = start + last_newline as u64 + 1;

    let lines = split_lines(&bytes[..last_newline]);
    debug!(file = %state.file_path.display(), count = lines.len(), offset = state.byte_offset, "read journal lines");
    Ok(Some(lines))
}

/// Reads from `offset` to the end of the file, or from zero if the file is
/// now shorter than `offset`. Returns where the read started.
fn read_from(path: &Path, offset: u64) -> io::Result<(u64, Vec<u8>)> {
    let mut file = open_shared(path)?;
    let len = file.metadata()?.len();
    let start = if len < offset { 0 } else { offset };
    file.seek(SeekFrom::Start(start))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    Ok((start, bytes))
}

fn split_lines(bytes: &[u8]) -> Vec<String> {
    bytes
        .split(|&b| b == b'\n')
        .map(|line| strip_bom(line.strip_suffix(b"\r").unwrap_or(line)))
        .filter(|line| !line.iter().all(u8::is_ascii_whitespace))
        .map(|line| String::from_utf8_lossy(line).into_owned())
        .collect()
}
