//! Background persistence for exploration data.
//!
//! Trackers hand finished snapshots to [`PersistenceWriter::enqueue`] and
//! move on. A worker thread collects them into batches, bounded by count and
//! by a time window, and commits each batch as one transaction. When several
//! snapshots of the same system land in one batch only the latest is written.

use std::{
    collections::BTreeMap,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        mpsc::{self, RecvTimeoutError},
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use tracing::{debug, error, warn};

use crate::model::SystemExplorationData;

use super::{ExplorationStore, Result, StorageError};

/// Batching limits for the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterConfig {
    pub batch_size: usize,
    pub batch_window: Duration,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            batch_size: 32,
            batch_window: Duration::from_millis(250),
        }
    }
}

enum Command {
    Write(Box<SystemExplorationData>),
    Flush(mpsc::Sender<core::result::Result<(), String>>),
}

struct Worker {
    sender: mpsc::Sender<Command>,
    handle: JoinHandle<()>,
}

/// Queued, batched writer in front of an [`ExplorationStore`].
pub struct PersistenceWriter {
    store: Arc<Mutex<ExplorationStore>>,
    config: WriterConfig,
    worker: Mutex<Option<Worker>>,
}

impl PersistenceWriter {
    /// Wraps a store. The worker isn't running until [`start`](Self::start).
    pub fn new(store: ExplorationStore, config: WriterConfig) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            config,
            worker: Mutex::new(None),
        }
    }

    fn worker(&self) -> MutexGuard<'_, Option<Worker>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts the worker thread. Calling it again while running does nothing.
    pub fn start(&self) -> Result<()> {
        let mut worker = self.worker();
        if worker.is_some() {
            return Ok(());
        }
        let (sender, receiver) = mpsc::channel();
        let store = Arc::clone(&self.store);
        let config = self.config;
        let handle = thread::Builder::new()
            .name("starlog-writer".into())
            .spawn(move || run_worker(&store, &receiver, config))?;
        *worker = Some(Worker { sender, handle });
        debug!(
            batch_size = config.batch_size,
            window_ms = config.batch_window.as_millis(),
            "persistence writer started"
        );
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.worker().is_some()
    }

    /// Queues a snapshot for writing and returns immediately.
    ///
    /// Without a running worker the snapshot is written synchronously.
    pub fn enqueue(&self, system: &SystemExplorationData) -> Result<()> {
        let sender = self.worker().as_ref().map(|w| w.sender.clone());
        if let Some(sender) = sender {
            match sender.send(Command::Write(Box::new(system.clone()))) {
                Ok(()) => return Ok(()),
                Err(_) => warn!(
                    system = %system.system_name,
                    "persistence worker is gone; writing synchronously"
                ),
            }
        } else {
            debug!(
                system = %system.system_name,
                "persistence worker not running; writing synchronously"
            );
        }
        commit(&self.store, std::slice::from_ref(system))
    }

    /// Blocks until everything queued so far is committed.
    pub fn flush(&self) -> Result<()> {
        let Some(sender) = self.worker().as_ref().map(|w| w.sender.clone()) else {
            return Ok(());
        };
        let (ack, done) = mpsc::channel();
        sender
            .send(Command::Flush(ack))
            .map_err(|_| StorageError::WriterStopped)?;
        done.recv()
            .map_err(|_| StorageError::WriterStopped)?
            .map_err(StorageError::Write)
    }

    /// Commits what's pending and stops the worker. Idempotent.
    pub fn stop(&self) -> Result<()> {
        let Some(worker) = self.worker().take() else {
            return Ok(());
        };
        // Closing the channel lets the worker drain what's queued and exit.
        drop(worker.sender);
        if worker.handle.join().is_err() {
            error!("persistence worker panicked");
            return Err(StorageError::WriterStopped);
        }
        debug!("persistence writer stopped");
        Ok(())
    }

    /// Runs a read against the store, serialized with the worker's writes.
    pub fn with_store<T>(&self, f: impl FnOnce(&ExplorationStore) -> T) -> T {
        let store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        f(&store)
    }
}

impl Drop for PersistenceWriter {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!(error = %e, "persistence writer did not stop cleanly");
        }
    }
}

/// The worker loop: wait for a first command, gather more until the batch is
/// full, the window closes, or a flush asks for it, then commit.
fn run_worker(
    store: &Mutex<ExplorationStore>,
    receiver: &mpsc::Receiver<Command>,
    config: WriterConfig,
) {
    let batch_size = config.batch_size.max(1);
    let mut disconnected = false;

    while !disconnected {
        let Ok(first) = receiver.recv() else {
            break;
        };
        let deadline = Instant::now() + config.batch_window;
        let mut batch = Vec::new();
        let mut acks = Vec::new();
        absorb(first, &mut batch, &mut acks);

        while batch.len() < batch_size && acks.is_empty() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match receiver.recv_timeout(remaining) {
                Ok(command) => absorb(command, &mut batch, &mut acks),
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => {
                    disconnected = true;
                    break;
                }
            }
        }

        let result = commit(store, &batch).map_err(|e| e.to_string());
        if let Err(e) = &result {
            error!(error = %e, systems = batch.len(), "exploration batch failed to commit");
        }
        for ack in acks {
            let _ = ack.send(result.clone());
        }
    }
}

fn absorb(
    command: Command,
    batch: &mut Vec<SystemExplorationData>,
    acks: &mut Vec<mpsc::Sender<core::result::Result<(), String>>>,
) {
    match command {
        Command::Write(system) => batch.push(*system),
        Command::Flush(ack) => acks.push(ack),
    }
}

/// Writes the latest snapshot of each system in one transaction.
fn commit(store: &Mutex<ExplorationStore>, batch: &[SystemExplorationData]) -> Result<()> {
    if batch.is_empty() {
        return Ok(());
    }
    let mut latest = BTreeMap::new();
    for system in batch {
        latest.insert(system.system_address, system);
    }
    let mut store = store.lock().unwrap_or_else(PoisonError::into_inner);
    let written = store.upsert_systems(latest.into_values())?;
    debug!(written, queued = batch.len(), "committed exploration batch");
    Ok(())
}
