//! Mining archive: append and load finished sessions.

use std::{fs, io};

// Traits must be in scope for `.lines()` on BufReader and `.write_all()` on File.
use io::{BufRead, Write};

use crate::model::MiningSession;

use super::{Result, Storage};

const ARCHIVE_FILE: &str = "mining.jsonl";

impl Storage {
    /// Appends a finished session to the archive.
    pub fn append_mining_session(&self, session: &MiningSession) -> Result<()> {
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.root.join(ARCHIVE_FILE))?;
        let mut line = serde_json::to_string(session)?;
        line.push('\n');
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    /// Loads all archived sessions, oldest first.
    pub fn load_mining_sessions(&self) -> Result<Vec<MiningSession>> {
        let path = self.root.join(ARCHIVE_FILE);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let reader = io::BufReader::new(fs::File::open(path)?);
        let mut sessions = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if !line.is_empty() {
                sessions.push(serde_json::from_str(&line)?);
            }
        }
        Ok(sessions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use jiff::Timestamp;
    use tempfile::TempDir;

    fn test_storage() -> (TempDir, Storage) {
        let dir = TempDir::new().unwrap();
        let storage = Storage::new(dir.path().join("data")).unwrap();
        (dir, storage)
    }

    fn sample_session(refined: u32) -> MiningSession {
        let mut session = MiningSession::start(
            Timestamp::new(1_700_000_000, 0).unwrap(),
            Some("Hyades Sector DR-V c2-23".into()),
            Some(6_406_111_810_298),
            Some("Hyades Sector DR-V c2-23 A 5 A Ring".into()),
        );
        session.refined.insert("painite".into(), refined);
        session
    }

    #[test]
    fn append_and_load_sessions() {
        let (_dir, storage) = test_storage();
        storage.append_mining_session(&sample_session(4)).unwrap();
        storage.append_mining_session(&sample_session(9)).unwrap();

        let sessions = storage.load_mining_sessions().unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].total_refined(), 4);
        assert_eq!(sessions[1].total_refined(), 9);
    }

    #[test]
    fn load_without_archive_is_empty() {
        let (_dir, storage) = test_storage();
        assert!(storage.load_mining_sessions().unwrap().is_empty());
    }
}
