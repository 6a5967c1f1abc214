//! Local persistence for reconstructed state.
//!
//! Everything lives under one data directory:
//!
//! ```text
//! <root>/
//!   exploration.sqlite   # systems + bodies, written by the background writer
//!   ledger.json          # dedup hashes and last-processed watermark
//!   mining.jsonl         # append-only archive of finished mining sessions
//!   carrier.json         # last known fleet carrier state
//! ```

mod carrier;
mod ledger;
mod mining;
mod systems;
mod writer;

use std::{fs, io, path::PathBuf};

pub use ledger::DedupLedger;
pub use systems::ExplorationStore;
pub use writer::{PersistenceWriter, WriterConfig};

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("corrupt data: {0}")]
    Corrupt(String),

    #[error("background write failed: {0}")]
    Write(String),

    #[error("background writer stopped")]
    WriterStopped,
}

pub type Result<T> = core::result::Result<T, StorageError>;

/// The data directory and the files in it.
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    /// Creates a new storage instance rooted at the given directory.
    ///
    /// The directory is created if it doesn't exist.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Returns the default storage root: `~/.starlog/`.
    pub fn default_root() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".starlog"))
    }

    /// Opens (creating if needed) the exploration database.
    pub fn open_exploration(&self) -> Result<ExplorationStore> {
        ExplorationStore::open(self.root.join("exploration.sqlite"))
    }

    /// Writes pretty JSON through a temporary file so readers never see a
    /// half-written document.
    fn write_json_atomic(&self, name: &str, value: &impl serde::Serialize) -> Result<()> {
        let path = self.root.join(name);
        let tmp = self.root.join(format!("{name}.tmp"));
        fs::write(&tmp, serde_json::to_string_pretty(value)?)?;
        fs::rename(tmp, path)?;
        Ok(())
    }

    /// Reads a JSON document, or `None` if the file doesn't exist.
    fn read_json<T: serde::de::DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        match fs::read_to_string(self.root.join(name)) {
            Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
