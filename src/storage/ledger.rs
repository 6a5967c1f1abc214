//! Dedup ledger: which journal lines have already been processed.
//!
//! A bounded FIFO set of line fingerprints plus a watermark timestamp, so a
//! restart that re-reads the current journal from the top doesn't republish
//! what it already handled.

use std::collections::{HashSet, VecDeque};

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use super::{Result, Storage};

const LEDGER_FILE: &str = "ledger.json";

/// Bounded set of processed-line fingerprints.
///
/// Membership is O(1). Past capacity the oldest fingerprint is evicted first.
#[derive(Debug, Clone)]
pub struct DedupLedger {
    capacity: usize,
    order: VecDeque<String>,
    members: HashSet<String>,
    last_processed: Option<Timestamp>,
}

/// On-disk form of the ledger.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LedgerFile {
    /// Oldest first.
    hashes: Vec<String>,
    last_processed: Option<Timestamp>,
}

impl DedupLedger {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity),
            members: HashSet::with_capacity(capacity),
            last_processed: None,
        }
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.members.contains(hash)
    }

    /// Records a fingerprint. Returns `false` if it was already present.
    pub fn insert(&mut self, hash: String) -> bool {
        if self.members.contains(&hash) {
            return false;
        }
        while self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.members.remove(&oldest);
            }
        }
        self.members.insert(hash.clone());
        self.order.push_back(hash);
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Timestamp of the newest line processed so far.
    pub fn last_processed(&self) -> Option<Timestamp> {
        self.last_processed
    }

    /// Moves the watermark forward. Older timestamps are ignored.
    pub fn advance(&mut self, at: Timestamp) {
        if self.last_processed.is_none_or(|current| at > current) {
            self.last_processed = Some(at);
        }
    }

    fn from_file(file: LedgerFile, capacity: usize) -> Self {
        let mut ledger = Self::new(capacity);
        let skip = file.hashes.len().saturating_sub(ledger.capacity);
        for hash in file.hashes.into_iter().skip(skip) {
            ledger.insert(hash);
        }
        ledger.last_processed = file.last_processed;
        ledger
    }

    fn to_file(&self) -> LedgerFile {
        LedgerFile {
            hashes: self.order.iter().cloned().collect(),
            last_processed: self.last_processed,
        }
    }
}

impl Storage {
    /// Loads the ledger, or an empty one if none has been saved yet.
    ///
    /// A saved ledger larger than `capacity` keeps its newest entries.
    pub fn load_ledger(&self, capacity: usize) -> Result<DedupLedger> {
        let file = self.read_json::<LedgerFile>(LEDGER_FILE)?.unwrap_or_default();
        Ok(DedupLedger::from_file(file, capacity))
    }

    pub fn save_ledger(&self, ledger: &DedupLedger) -> Result<()> {
        self.write_json_atomic(LEDGER_FILE, &ledger.to_file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    fn test_storage() -> (TempDir, Storage) {
        let dir = TempDir::new().unwrap();
        let storage = Storage::new(dir.path().join("data")).unwrap();
        (dir, storage)
    }

    #[test]
    fn insert_reports_duplicates() {
        let mut ledger = DedupLedger::new(10);

        assert!(ledger.insert("a".into()));
        assert!(!ledger.insert("a".into()));
        assert!(ledger.contains("a"));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn evicts_oldest_past_capacity() {
        let mut ledger = DedupLedger::new(5000);
        for i in 0..5001 {
            ledger.insert(format!("hash-{i}"));
            assert!(ledger.len() <= 5000);
        }

        assert_eq!(ledger.len(), 5000);
        assert!(!ledger.contains("hash-0"));
        assert!(ledger.contains("hash-1"));
        assert!(ledger.contains("hash-5000"));
    }

    #[test]
    fn watermark_only_moves_forward() {
        let mut ledger = DedupLedger::new(1);
        let early = Timestamp::new(100, 0).unwrap();
        let late = Timestamp::new(200, 0).unwrap();

        ledger.advance(late);
        ledger.advance(early);

        assert_eq!(ledger.last_processed(), Some(late));
    }

    #[test]
    fn save_and_load_round_trip() {
        let (_dir, storage) = test_storage();
        let mut ledger = DedupLedger::new(3);
        ledger.insert("a".into());
        ledger.insert("b".into());
        ledger.advance(Timestamp::new(1_700_000_000, 0).unwrap());
        storage.save_ledger(&ledger).unwrap();

        let loaded = storage.load_ledger(3).unwrap();
        assert!(loaded.contains("a"));
        assert!(loaded.contains("b"));
        assert_eq!(loaded.last_processed(), ledger.last_processed());
    }

    #[test]
    fn saved_file_is_indented_json() {
        let (dir, storage) = test_storage();
        let mut ledger = DedupLedger::new(3);
        ledger.insert("a".into());
        storage.save_ledger(&ledger).unwrap();

        let text = std::fs::read_to_string(dir.path().join("data").join(LEDGER_FILE)).unwrap();
        assert!(text.contains("\n  \"hashes\""));
    }

    #[test]
    fn load_into_smaller_capacity_keeps_newest() {
        let (_dir, storage) = test_storage();
        let mut ledger = DedupLedger::new(10);
        for hash in ["a", "b", "c", "d"] {
            ledger.insert(hash.into());
        }
        storage.save_ledger(&ledger).unwrap();

        let loaded = storage.load_ledger(2).unwrap();
        assert_eq!(loaded.len(), 2);
        assert!(!loaded.contains("b"));
        assert!(loaded.contains("c"));
        assert!(loaded.contains("d"));
    }

    #[test]
    fn load_without_file_is_empty() {
        let (_dir, storage) = test_storage();
        let ledger = storage.load_ledger(5000).unwrap();

        assert!(ledger.is_empty());
        assert_eq!(ledger.capacity(), 5000);
        assert!(ledger.last_processed().is_none());
    }
}
