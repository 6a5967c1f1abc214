//! Monitoring: one poll loop per watched file.
//!
//! The journal loop tails the journal directory and feeds each batch through
//! the [`Dispatcher`]. Each snapshot loop re-reads one of `Status.json`,
//! `Market.json`, `NavRoute.json`, `Cargo.json` and publishes its contents
//! when they change. Loops share nothing mutable except through locks (the
//! dedup ledger and the bus).
//!
//! Every loop sleeps in short slices between polls so [`Monitor::stop`]
//! takes effect promptly.

use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::{
    dispatch::{BatchSummary, Dispatcher, Trackers},
    event::shapes,
    model::{CargoSnapshot, MarketSnapshot, RouteHop, StatusSnapshot},
    notify::{Bus, Notification},
    state::{CarrierTracker, ExplorationTracker, HistoryTracker, MiningTracker, ShipTracker},
    storage::{DedupLedger, ExplorationStore, PersistenceWriter, Storage, StorageError, WriterConfig},
    tail::{JournalTailer, RetryPolicy, SnapshotTailer, SnapshotUpdate},
};

/// Longest a loop sleeps before checking the stop flag.
const STOP_CHECK_INTERVAL: Duration = Duration::from_millis(50);

/// How often the journal loop saves the dedup ledger while running.
const LEDGER_SAVE_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("journal directory not found: {}", .0.display())]
    JournalDirMissing(PathBuf),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// What to watch and how hard to try.
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub journal_dir: PathBuf,
    pub poll_interval: Duration,
    pub retry: RetryPolicy,
    pub dedup_capacity: usize,
    pub history_capacity: usize,
    pub writer: WriterConfig,
}

/// The single-object files the game rewrites next to its journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotKind {
    Status,
    Market,
    NavRoute,
    Cargo,
}

impl SnapshotKind {
    pub const ALL: [Self; 4] = [Self::Status, Self::Market, Self::NavRoute, Self::Cargo];

    pub fn file_name(self) -> &'static str {
        match self {
            Self::Status => "Status.json",
            Self::Market => "Market.json",
            Self::NavRoute => "NavRoute.json",
            Self::Cargo => "Cargo.json",
        }
    }

    /// Turns fresh file contents into a notification. `None` when the
    /// content isn't about the player's ship.
    fn notification(self, value: Value) -> Result<Option<Notification>, serde_json::Error> {
        let notification = match self {
            Self::Status => {
                let status: StatusSnapshot = serde_json::from_value(value)?;
                debug!(
                    docked = status.is_docked(),
                    supercruise = status.in_supercruise(),
                    "status changed"
                );
                Notification::StatusChanged(status)
            }
            Self::Market => Notification::MarketChanged(serde_json::from_value::<MarketSnapshot>(value)?),
            Self::NavRoute => {
                let file: NavRouteFile = serde_json::from_value(value)?;
                Notification::NavRouteChanged(file.route)
            }
            Self::Cargo => {
                let cargo: shapes::Cargo = serde_json::from_value(value)?;
                if cargo.vessel.as_deref().is_some_and(|v| v != "Ship") {
                    return Ok(None);
                }
                let mut snapshot = CargoSnapshot::default();
                for item in cargo.inventory.unwrap_or_default() {
                    snapshot.add(&shapes::commodity_key(&item.name), item.count);
                }
                Notification::CargoProcessed(snapshot)
            }
        };
        Ok(Some(notification))
    }
}

#[derive(Deserialize)]
struct NavRouteFile {
    #[serde(rename = "Route", default)]
    route: Vec<RouteHop>,
}

/// Watches a journal directory until stopped.
pub struct Monitor {
    settings: MonitorSettings,
    bus: Bus,
    storage: Storage,
    ledger: Arc<Mutex<DedupLedger>>,
    writer: Arc<PersistenceWriter>,
    dispatcher: Arc<Mutex<Dispatcher>>,
    journal: Arc<Mutex<JournalTailer>>,
    snapshots: Vec<(SnapshotKind, Arc<Mutex<SnapshotTailer>>)>,
    stop: Arc<AtomicBool>,
    threads: Vec<JoinHandle<()>>,
}

impl Monitor {
    /// Loads persisted state and builds the pipeline. Nothing runs until
    /// [`start`](Self::start).
    pub fn new(settings: MonitorSettings, storage: Storage, bus: Bus) -> Result<Self, MonitorError> {
        let ledger = storage.load_ledger(settings.dedup_capacity)?;
        if ledger.is_empty() {
            debug!(capacity = ledger.capacity(), "starting with an empty dedup ledger");
        } else {
            debug!(
                entries = ledger.len(),
                capacity = ledger.capacity(),
                last_processed = ?ledger.last_processed(),
                "loaded dedup ledger"
            );
        }
        let ledger = Arc::new(Mutex::new(ledger));
        let writer = Arc::new(PersistenceWriter::new(storage.open_exploration()?, settings.writer));

        let trackers = Trackers {
            ship: ShipTracker::new(bus.clone()),
            exploration: ExplorationTracker::new(bus.clone(), Arc::clone(&writer)),
            mining: MiningTracker::new(bus.clone(), Some(storage.clone())),
            carrier: CarrierTracker::new(bus.clone(), Some(storage.clone())),
            history: HistoryTracker::new(bus.clone(), settings.history_capacity),
        };
        let dispatcher = Dispatcher::new(bus.clone(), Arc::clone(&ledger), trackers);

        let journal = JournalTailer::new(&settings.journal_dir, settings.retry);
        let snapshots = SnapshotKind::ALL
            .into_iter()
            .map(|kind| {
                let path = settings.journal_dir.join(kind.file_name());
                (kind, Arc::new(Mutex::new(SnapshotTailer::new(path, settings.retry))))
            })
            .collect();

        Ok(Self {
            settings,
            bus,
            storage,
            ledger,
            writer,
            dispatcher: Arc::new(Mutex::new(dispatcher)),
            journal: Arc::new(Mutex::new(journal)),
            snapshots,
            stop: Arc::new(AtomicBool::new(false)),
            threads: Vec::new(),
        })
    }

    pub fn is_running(&self) -> bool {
        !self.threads.is_empty()
    }

    /// Starts the poll loops. Calling it again while running does nothing.
    ///
    /// Fails only if the journal directory doesn't exist.
    pub fn start(&mut self) -> Result<(), MonitorError> {
        if self.is_running() {
            return Ok(());
        }
        let dir = &self.settings.journal_dir;
        if !dir.is_dir() {
            return Err(MonitorError::JournalDirMissing(dir.clone()));
        }

        self.writer.start()?;
        self.stop.store(false, Ordering::SeqCst);
        let interval = self.settings.poll_interval;

        let journal = JournalLoop {
            tailer: Arc::clone(&self.journal),
            dispatcher: Arc::clone(&self.dispatcher),
            ledger: Arc::clone(&self.ledger),
            storage: self.storage.clone(),
        };
        let stop = Arc::clone(&self.stop);
        self.threads.push(
            thread::Builder::new()
                .name("starlog-journal".into())
                .spawn(move || journal.run(&stop, interval))?,
        );

        for (kind, tailer) in &self.snapshots {
            let (kind, tailer) = (*kind, Arc::clone(tailer));
            let bus = self.bus.clone();
            let stop = Arc::clone(&self.stop);
            self.threads.push(
                thread::Builder::new()
                    .name(format!("starlog-{}", kind.file_name()))
                    .spawn(move || run_snapshot_loop(kind, &tailer, &bus, &stop, interval))?,
            );
        }

        info!(
            dir = %dir.display(),
            subscribers = self.bus.subscriber_count(),
            "monitoring started"
        );
        Ok(())
    }

    /// Stops the loops, commits pending writes, saves the ledger, and resets
    /// every tailer so the next start reads from the top. Idempotent.
    pub fn stop(&mut self) {
        if !self.is_running() {
            return;
        }
        self.stop.store(true, Ordering::SeqCst);
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                error!("poll loop panicked");
            }
        }

        lock(&self.dispatcher).finish();
        let committed = if self.writer.is_running() {
            self.writer.flush().and_then(|()| self.writer.stop())
        } else {
            Ok(())
        };
        if let Err(e) = committed {
            warn!(error = %e, "could not commit pending exploration writes");
        }
        save_ledger(&self.storage, &self.ledger);
        self.log_session();

        lock(&self.journal).reset();
        for (_, tailer) in &self.snapshots {
            lock(tailer).reset();
        }
        info!("monitoring stopped");
    }

    /// Logs what the trackers know at the end of a run.
    fn log_session(&self) {
        if let Some(state) = lock(&self.journal).state() {
            debug!(
                file = %state.file_path.display(),
                offset = state.byte_offset,
                "journal position"
            );
        }
        let dispatcher = lock(&self.dispatcher);
        let trackers = dispatcher.trackers();
        let ship = &trackers.ship;
        info!(
            commander = ship.commander().unwrap_or("unknown"),
            system = dispatcher.location().map_or("unknown", |l| l.star_system.as_str()),
            docked_at = ship.docked().map(|d| d.station_name.as_str()),
            ship = ship.loadout().map(|l| l.ship.as_str()),
            balance = ship.balance(),
            cargo_tons = ship.cargo().total(),
            history = trackers.history.entries().count(),
            "session state"
        );
        if let Some(system) = trackers.exploration.current() {
            debug!(
                system = %system.system_name,
                scanned = system.scanned_bodies,
                total = system.total_bodies,
                "exploration progress"
            );
        }
        if let Some(session) = trackers.mining.session() {
            debug!(refined = session.total_refined(), "mining session still open");
        }
        if let Some(carrier) = trackers.carrier.carrier() {
            debug!(
                carrier = carrier.name.as_deref().unwrap_or("unnamed"),
                fuel = carrier.fuel,
                "fleet carrier"
            );
        }
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.stop();
    }
}

/// State the journal loop needs, moved onto its thread.
struct JournalLoop {
    tailer: Arc<Mutex<JournalTailer>>,
    dispatcher: Arc<Mutex<Dispatcher>>,
    ledger: Arc<Mutex<DedupLedger>>,
    storage: Storage,
}

impl JournalLoop {
    fn run(self, stop: &AtomicBool, interval: Duration) {
        let mut last_save = Instant::now();
        while !stop.load(Ordering::SeqCst) {
            let polled = lock(&self.tailer).poll();
            match polled {
                Ok(batch) => {
                    if !batch.lines.is_empty() {
                        lock(&self.dispatcher).dispatch(&batch.lines);
                    }
                    // A new journal file is a natural checkpoint.
                    if batch.rotated {
                        save_ledger(&self.storage, &self.ledger);
                        last_save = Instant::now();
                    }
                }
                Err(e) => warn!(error = %e, "journal poll failed; retrying next cycle"),
            }
            if last_save.elapsed() >= LEDGER_SAVE_INTERVAL {
                save_ledger(&self.storage, &self.ledger);
                last_save = Instant::now();
            }
            sleep_unless_stopped(stop, interval);
        }
    }
}

fn run_snapshot_loop(
    kind: SnapshotKind,
    tailer: &Mutex<SnapshotTailer>,
    bus: &Bus,
    stop: &AtomicBool,
    interval: Duration,
) {
    while !stop.load(Ordering::SeqCst) {
        let polled = lock(tailer).poll();
        match polled {
            Ok(SnapshotUpdate::Changed(value)) => match kind.notification(value) {
                Ok(Some(notification)) => bus.publish(&notification),
                Ok(None) => {}
                Err(e) => warn!(file = kind.file_name(), error = %e, "unexpected snapshot shape"),
            },
            Ok(SnapshotUpdate::Unchanged | SnapshotUpdate::Unavailable) => {}
            Err(e) => warn!(file = kind.file_name(), error = %e, "snapshot poll failed"),
        }
        sleep_unless_stopped(stop, interval);
    }
}

/// Runs one journal file through a scratch pipeline and returns the counts.
///
/// Nothing is persisted and no ledger from a previous run is consulted, so
/// every line is published.
pub fn replay_file(
    path: &Path,
    bus: &Bus,
    history_capacity: usize,
) -> Result<BatchSummary, MonitorError> {
    let bytes = fs::read(path)?;
    let lines: Vec<String> = String::from_utf8_lossy(&bytes)
        .lines()
        .map(|line| line.trim_start_matches('\u{feff}'))
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect();

    let writer = Arc::new(PersistenceWriter::new(
        ExplorationStore::open_in_memory()?,
        WriterConfig::default(),
    ));
    writer.start()?;
    let trackers = Trackers {
        ship: ShipTracker::new(bus.clone()),
        exploration: ExplorationTracker::new(bus.clone(), Arc::clone(&writer)),
        mining: MiningTracker::new(bus.clone(), None),
        carrier: CarrierTracker::new(bus.clone(), None),
        history: HistoryTracker::new(bus.clone(), history_capacity),
    };
    let ledger = Arc::new(Mutex::new(DedupLedger::new(lines.len().max(1))));
    let mut dispatcher = Dispatcher::new(bus.clone(), ledger, trackers);
    let summary = dispatcher.dispatch(&lines);
    dispatcher.finish();
    writer.stop()?;
    Ok(summary)
}

fn save_ledger(storage: &Storage, ledger: &Mutex<DedupLedger>) {
    let snapshot = lock(ledger).clone();
    if let Err(e) = storage.save_ledger(&snapshot) {
        warn!(error = %e, "could not save dedup ledger");
    }
}

/// Sleeps for `total`, waking in short slices to check the stop flag.
fn sleep_unless_stopped(stop: &AtomicBool, total: Duration) {
    let deadline = Instant::now() + total;
    loop {
        if stop.load(Ordering::SeqCst) {
            return;
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return;
        }
        thread::sleep(remaining.min(STOP_CHECK_INTERVAL));
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::mpsc::Receiver;

    use tempfile::TempDir;

    const DECIAT: u64 = 2_832_453_010_002;

    const JOURNAL: &str = concat!(
        r#"{"timestamp":"2024-01-01T00:00:00Z","event":"FSDJump","StarSystem":"Deciat","SystemAddress":2832453010002,"StarPos":[122.625,-0.8125,-47.28125]}"#,
        "\n",
        r#"{"timestamp":"2024-01-01T00:00:05Z","event":"Scan","BodyName":"Deciat 1","BodyID":1,"SystemAddress":2832453010002,"PlanetClass":"Icy body"}"#,
        "\n",
    );

    struct Fixture {
        _dir: TempDir,
        journal_dir: PathBuf,
        storage: Storage,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let journal_dir = dir.path().join("journal");
        fs::create_dir_all(&journal_dir).unwrap();
        let storage = Storage::new(dir.path().join("data")).unwrap();
        Fixture {
            _dir: dir,
            journal_dir,
            storage,
        }
    }

    fn settings(journal_dir: &Path) -> MonitorSettings {
        MonitorSettings {
            journal_dir: journal_dir.to_path_buf(),
            poll_interval: Duration::from_millis(20),
            retry: RetryPolicy {
                attempts: 2,
                delay: Duration::from_millis(1),
            },
            dedup_capacity: 5000,
            history_capacity: 50,
            writer: WriterConfig {
                batch_size: 8,
                batch_window: Duration::from_millis(10),
            },
        }
    }

    /// Collects notifications until `done` holds for what has arrived, or
    /// time runs out.
    fn collect_until(
        rx: &Receiver<Notification>,
        done: impl Fn(&[Notification]) -> bool,
    ) -> Vec<Notification> {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut seen: Vec<Notification> = Vec::new();
        while !done(seen.as_slice()) {
            let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                break;
            };
            match rx.recv_timeout(remaining) {
                Ok(n) => seen.push(n),
                Err(_) => break,
            }
        }
        seen
    }

    fn has_scanned_body(seen: &[Notification]) -> bool {
        seen.iter().any(|n| matches!(n, Notification::ExplorationUpdated(s) if !s.bodies.is_empty()))
    }

    #[test]
    fn missing_journal_dir_prevents_start() {
        let f = fixture();
        let mut monitor = Monitor::new(settings(&f.journal_dir.join("gone")), f.storage, Bus::new()).unwrap();

        assert!(matches!(monitor.start(), Err(MonitorError::JournalDirMissing(_))));
        assert!(!monitor.is_running());
    }

    #[test]
    fn watches_journal_and_snapshots() {
        let f = fixture();
        fs::write(f.journal_dir.join("Journal.2024-01-01T000000.01.log"), JOURNAL).unwrap();
        fs::write(f.journal_dir.join("Status.json"), r#"{"Flags":16,"Balance":42}"#).unwrap();

        let bus = Bus::new();
        let rx = bus.subscribe_channel();
        let mut monitor = Monitor::new(settings(&f.journal_dir), f.storage.clone(), bus).unwrap();
        monitor.start().unwrap();

        let seen = collect_until(&rx, |seen| {
            has_scanned_body(seen) && seen.iter().any(|n| n.kind() == "StatusChanged")
        });
        assert!(has_scanned_body(&seen));
        assert!(seen.iter().any(|n| matches!(n, Notification::StatusChanged(s) if s.balance == Some(42))));

        monitor.stop();
        monitor.stop();

        let stored = f.storage.open_exploration().unwrap().load_system(DECIAT).unwrap();
        assert_eq!(stored.unwrap().bodies.len(), 1);
        assert_eq!(f.storage.load_ledger(5000).unwrap().len(), 2);
    }

    #[test]
    fn restart_does_not_republish_journal_lines() {
        let f = fixture();
        fs::write(f.journal_dir.join("Journal.0001.log"), JOURNAL).unwrap();

        let bus = Bus::new();
        let rx = bus.subscribe_channel();
        let mut monitor = Monitor::new(settings(&f.journal_dir), f.storage.clone(), bus).unwrap();
        monitor.start().unwrap();
        assert!(has_scanned_body(&collect_until(&rx, has_scanned_body)));
        monitor.stop();
        rx.try_iter().for_each(drop);

        monitor.start().unwrap();
        thread::sleep(Duration::from_millis(200));
        monitor.stop();

        assert!(
            !rx.try_iter()
                .any(|n| matches!(n, Notification::LocationChanged(_) | Notification::ExplorationUpdated(_)))
        );
    }

    #[test]
    fn snapshot_contents_become_notifications() {
        let route = SnapshotKind::NavRoute
            .notification(serde_json::json!({
                "event": "NavRoute",
                "Route": [{"StarSystem": "Sol", "SystemAddress": 10_477_373_803_u64, "StarClass": "G"}]
            }))
            .unwrap();
        assert!(matches!(route, Some(Notification::NavRouteChanged(hops)) if hops[0].star_system == "Sol"));

        let cargo = SnapshotKind::Cargo
            .notification(serde_json::json!({
                "Vessel": "Ship", "Count": 2, "Inventory": [{"Name": "$painite_name;", "Count": 2}]
            }))
            .unwrap();
        assert!(matches!(cargo, Some(Notification::CargoProcessed(c)) if c.items["painite"] == 2));

        let srv = SnapshotKind::Cargo
            .notification(serde_json::json!({"Vessel": "SRV", "Count": 0, "Inventory": []}))
            .unwrap();
        assert!(srv.is_none());
    }

    #[test]
    fn replay_publishes_every_line() {
        let f = fixture();
        let path = f.journal_dir.join("Journal.0001.log");
        fs::write(&path, format!("\u{feff}{JOURNAL}\r\n")).unwrap();
        let bus = Bus::new();
        let rx = bus.subscribe_channel();

        let summary = replay_file(&path, &bus, 10).unwrap();

        assert_eq!(summary.lines, 2);
        assert_eq!(summary.routed, 2);
        assert!(rx.try_iter().any(|n| matches!(n, Notification::ExplorationUpdated(_))));
    }

    #[test]
    fn replay_archives_trailing_mining_session() {
        let f = fixture();
        let path = f.journal_dir.join("Journal.0001.log");
        fs::write(
            &path,
            concat!(
                r#"{"timestamp":"2024-01-01T00:00:00Z","event":"SupercruiseExit","StarSystem":"Deciat","SystemAddress":2832453010002,"Body":"Deciat 6 A Ring","BodyType":"PlanetaryRing"}"#,
                "\n",
                r#"{"timestamp":"2024-01-01T00:00:09Z","event":"MiningRefined","Type":"$painite_name;"}"#,
                "\n",
            ),
        )
        .unwrap();
        let bus = Bus::new();
        let rx = bus.subscribe_channel();

        let summary = replay_file(&path, &bus, 10).unwrap();

        assert_eq!(summary.routed, 2);
        let archived: Vec<_> = rx
            .try_iter()
            .filter_map(|n| match n {
                Notification::MiningArchived(session) => Some(session),
                _ => None,
            })
            .collect();
        assert_eq!(archived.len(), 1);
        assert_eq!(archived[0].total_refined(), 1);
    }

    #[test]
    fn stop_archives_open_mining_session() {
        let f = fixture();
        fs::write(
            f.journal_dir.join("Journal.0001.log"),
            concat!(
                r#"{"timestamp":"2024-01-01T00:00:00Z","event":"SupercruiseExit","StarSystem":"Deciat","SystemAddress":2832453010002,"Body":"Deciat 6 A Ring","BodyType":"PlanetaryRing"}"#,
                "\n",
                r#"{"timestamp":"2024-01-01T00:00:09Z","event":"MiningRefined","Type":"$painite_name;"}"#,
                "\n",
            ),
        )
        .unwrap();

        let bus = Bus::new();
        let rx = bus.subscribe_channel();
        let mut monitor = Monitor::new(settings(&f.journal_dir), f.storage.clone(), bus).unwrap();
        monitor.start().unwrap();
        collect_until(&rx, |seen| {
            seen.iter()
                .any(|n| matches!(n, Notification::MiningUpdated(s) if s.total_refined() == 1))
        });
        monitor.stop();

        let sessions = f.storage.load_mining_sessions().unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].refined["painite"], 1);
        assert!(rx.try_iter().any(|n| matches!(n, Notification::MiningArchived(_))));
    }
}
