//! Journal history.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// One line of human-readable journal history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalHistoryEntry {
    pub timestamp: Timestamp,
    pub event: String,
    pub summary: String,
    pub star_system: Option<String>,
}
