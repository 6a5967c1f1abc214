//! Exploration store: systems and their bodies in `SQLite`.
//!
//! Two linked tables. `systems` is keyed by system address; `bodies` by
//! `(system_address, body_id)` and cascades when its system is deleted.

use std::path::Path;

use jiff::Timestamp;
use rusqlite::{Connection, OptionalExtension};

use crate::model::{BodySignal, ScannedBody, SystemExplorationData};

use super::{Result, StorageError};

const SCHEMA: &str = "
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS systems (
        system_address   INTEGER PRIMARY KEY,
        system_name      TEXT    NOT NULL,
        total_bodies     INTEGER NOT NULL,
        scanned_bodies   INTEGER NOT NULL,
        mapped_bodies    INTEGER NOT NULL,
        fss_progress     REAL    NOT NULL,
        all_bodies_found INTEGER NOT NULL,
        last_visited_ms  INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS bodies (
        system_address INTEGER NOT NULL
            REFERENCES systems(system_address) ON DELETE CASCADE,
        body_id        INTEGER NOT NULL,
        body_name      TEXT    NOT NULL,
        body_type      TEXT,
        distance_ls    REAL    NOT NULL,
        landable       INTEGER NOT NULL,
        scanned        INTEGER NOT NULL,
        was_discovered INTEGER NOT NULL,
        was_mapped     INTEGER NOT NULL,
        mapped         INTEGER NOT NULL,
        signals        TEXT    NOT NULL,
        PRIMARY KEY (system_address, body_id)
    );
";

/// Durable home of [`SystemExplorationData`].
#[derive(Debug)]
pub struct ExplorationStore {
    conn: Connection,
}

impl ExplorationStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Upserts systems and their bodies in a single transaction.
    ///
    /// `last_visited` only ever moves forward, even if a stale snapshot
    /// arrives after a newer one. Returns how many systems were written.
    pub fn upsert_systems<'a>(
        &mut self,
        systems: impl IntoIterator<Item = &'a SystemExplorationData>,
    ) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let mut written = 0;
        for system in systems {
            upsert_system(&tx, system)?;
            written += 1;
        }
        tx.commit()?;
        Ok(written)
    }

    pub fn load_system(&self, system_address: u64) -> Result<Option<SystemExplorationData>> {
        let row = self
            .conn
            .query_row(
                "SELECT system_address, system_name, total_bodies, scanned_bodies, mapped_bodies,
                        fss_progress, all_bodies_found, last_visited_ms
                 FROM systems WHERE system_address = ?1",
                [system_address],
                read_system_row,
            )
            .optional()?;
        let Some(row) = row else {
            return Ok(None);
        };
        let mut system = row.into_system()?;
        system.bodies = self.load_bodies(system_address)?;
        Ok(Some(system))
    }

    /// Lists all systems, most recently visited first. Bodies are not loaded.
    pub fn list_systems(&self) -> Result<Vec<SystemExplorationData>> {
        let mut stmt = self.conn.prepare(
            "SELECT system_address, system_name, total_bodies, scanned_bodies, mapped_bodies,
                    fss_progress, all_bodies_found, last_visited_ms
             FROM systems ORDER BY last_visited_ms DESC",
        )?;
        let rows = stmt.query_map([], read_system_row)?;
        let mut systems = Vec::new();
        for row in rows {
            systems.push(row?.into_system()?);
        }
        Ok(systems)
    }

    /// Deletes a system; its bodies go with it.
    pub fn delete_system(&self, system_address: u64) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM systems WHERE system_address = ?1", [system_address])?;
        Ok(rows > 0)
    }

    fn load_bodies(&self, system_address: u64) -> Result<Vec<ScannedBody>> {
        let mut stmt = self.conn.prepare(
            "SELECT body_id, body_name, body_type, distance_ls, landable, scanned,
                    was_discovered, was_mapped, mapped, signals
             FROM bodies WHERE system_address = ?1 ORDER BY body_id",
        )?;
        let rows = stmt.query_map([system_address], |row| {
            Ok((
                ScannedBody {
                    body_id: row.get(0)?,
                    body_name: row.get(1)?,
                    body_type: row.get(2)?,
                    distance_ls: row.get(3)?,
                    landable: row.get(4)?,
                    scanned: row.get(5)?,
                    was_discovered: row.get(6)?,
                    was_mapped: row.get(7)?,
                    mapped: row.get(8)?,
                    signals: Vec::new(),
                },
                row.get::<_, String>(9)?,
            ))
        })?;

        let mut bodies = Vec::new();
        for row in rows {
            let (mut body, signals) = row?;
            body.signals = serde_json::from_str::<Vec<BodySignal>>(&signals).map_err(|e| {
                StorageError::Corrupt(format!("invalid signals for body {}: {e}", body.body_id))
            })?;
            bodies.push(body);
        }
        Ok(bodies)
    }
}

fn upsert_system(conn: &Connection, system: &SystemExplorationData) -> Result<()> {
    conn.execute(
        "INSERT INTO systems (system_address, system_name, total_bodies, scanned_bodies,
                              mapped_bodies, fss_progress, all_bodies_found, last_visited_ms)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(system_address) DO UPDATE SET
             system_name      = excluded.system_name,
             total_bodies     = excluded.total_bodies,
             scanned_bodies   = excluded.scanned_bodies,
             mapped_bodies    = excluded.mapped_bodies,
             fss_progress     = excluded.fss_progress,
             all_bodies_found = excluded.all_bodies_found,
             last_visited_ms  = MAX(systems.last_visited_ms, excluded.last_visited_ms)",
        rusqlite::params![
            system.system_address,
            &system.system_name,
            system.total_bodies,
            system.scanned_bodies,
            system.mapped_bodies,
            system.fss_progress,
            system.all_bodies_found,
            system.last_visited.as_millisecond(),
        ],
    )?;

    for body in &system.bodies {
        conn.execute(
            "INSERT INTO bodies (system_address, body_id, body_name, body_type, distance_ls,
                                 landable, scanned, was_discovered, was_mapped, mapped, signals)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(system_address, body_id) DO UPDATE SET
                 body_name      = excluded.body_name,
                 body_type      = excluded.body_type,
                 distance_ls    = excluded.distance_ls,
                 landable       = excluded.landable,
                 scanned        = excluded.scanned,
                 was_discovered = excluded.was_discovered,
                 was_mapped     = excluded.was_mapped,
                 mapped         = excluded.mapped,
                 signals        = excluded.signals",
            rusqlite::params![
                system.system_address,
                body.body_id,
                &body.body_name,
                &body.body_type,
                body.distance_ls,
                body.landable,
                body.scanned,
                body.was_discovered,
                body.was_mapped,
                body.mapped,
                serde_json::to_string(&body.signals)?,
            ],
        )?;
    }
    Ok(())
}

/// Column values of one `systems` row, before timestamp validation.
struct SystemRow {
    system_address: u64,
    system_name: String,
    total_bodies: u32,
    scanned_bodies: u32,
    mapped_bodies: u32,
    fss_progress: f64,
    all_bodies_found: bool,
    last_visited_ms: i64,
}

fn read_system_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SystemRow> {
    Ok(SystemRow {
        system_address: row.get(0)?,
        system_name: row.get(1)?,
        total_bodies: row.get(2)?,
        scanned_bodies: row.get(3)?,
        mapped_bodies: row.get(4)?,
        fss_progress: row.get(5)?,
        all_bodies_found: row.get(6)?,
        last_visited_ms: row.get(7)?,
    })
}

impl SystemRow {
    fn into_system(self) -> Result<SystemExplorationData> {
        let last_visited = Timestamp::from_millisecond(self.last_visited_ms)
            .map_err(|e| StorageError::Corrupt(format!("invalid last_visited: {e}")))?;
        Ok(SystemExplorationData {
            system_address: self.system_address,
            system_name: self.system_name,
            total_bodies: self.total_bodies,
            scanned_bodies: self.scanned_bodies,
            mapped_bodies: self.mapped_bodies,
            fss_progress: self.fss_progress,
            all_bodies_found: self.all_bodies_found,
            last_visited,
            bodies: Vec::new(),
        })
    }
}
