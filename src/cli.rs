//! CLI interface for starlog.
//!
//! `watch` and `replay` drive the pipeline and print every notification as
//! one JSON line on stdout. The remaining commands read persisted state.
//! Logs go to stderr, so stdout can be piped straight into another tool.

mod format;

use std::{
    io::{self, BufRead, Write},
    path::{Path, PathBuf},
    sync::{
        Arc,
        mpsc::{self, RecvTimeoutError},
    },
    thread,
    time::{Duration, Instant},
};

use clap::{Parser, Subcommand};

use crate::{
    config::Config,
    monitor::{self, Monitor, MonitorSettings},
    notify::{Bus, Notification, Subscriber},
    storage::Storage,
};

use format::{format_body, format_mining_session, format_system};

/// starlog: follow an Elite Dangerous journal and keep a log of what happened.
#[derive(Debug, Parser)]
#[command(name = "starlog")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Watch the journal directory and print notifications as JSON lines.
    ///
    /// Runs until Enter is pressed or `--for` elapses.
    Watch {
        /// Journal directory. Overrides `STARLOG_JOURNAL_DIR` and the config file.
        #[arg(long)]
        journal_dir: Option<PathBuf>,

        /// Stop after this many seconds.
        #[arg(long = "for", value_name = "SECS")]
        duration: Option<u64>,
    },

    /// Run one journal file through the pipeline and print its notifications.
    ///
    /// Nothing is persisted.
    Replay {
        /// Journal file to read.
        file: PathBuf,
    },

    /// List explored systems, most recently visited first.
    Systems,

    /// Show one system and its bodies.
    System {
        /// System address (the journal's `SystemAddress`).
        address: u64,
    },

    /// Remove a system and its bodies from the exploration store.
    Forget {
        /// System address (the journal's `SystemAddress`).
        address: u64,
    },

    /// List archived mining sessions.
    Mining,
}

/// Run the CLI, returning an error message on failure.
pub fn run(config: &Config, storage: &Storage) -> Result<(), String> {
    let cli = Cli::parse();

    match cli.command {
        Command::Watch {
            journal_dir,
            duration,
        } => cmd_watch(
            config,
            storage,
            journal_dir.as_deref(),
            duration.map(Duration::from_secs),
        ),
        Command::Replay { file } => cmd_replay(config, &file),
        Command::Systems => cmd_systems(storage),
        Command::System { address } => cmd_system(storage, address),
        Command::Forget { address } => cmd_forget(storage, address),
        Command::Mining => cmd_mining(storage),
    }
}

/// How long `watch` waits for a notification before checking for Enter.
const PRINT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Writes each notification to stdout as one JSON line.
struct JsonLines;

impl Subscriber for JsonLines {
    fn notify(&self, notification: &Notification) -> Result<(), String> {
        let json = serde_json::to_string(notification).map_err(|e| e.to_string())?;
        let mut out = io::stdout().lock();
        writeln!(out, "{json}").map_err(|e| e.to_string())
    }
}

fn monitor_settings(config: &Config, journal_dir: PathBuf) -> MonitorSettings {
    MonitorSettings {
        journal_dir,
        poll_interval: config.poll_interval(),
        retry: config.retry_policy(),
        dedup_capacity: config.dedup_capacity,
        history_capacity: config.history_capacity,
        writer: config.writer_config(),
    }
}

fn cmd_watch(
    config: &Config,
    storage: &Storage,
    journal_dir: Option<&Path>,
    duration: Option<Duration>,
) -> Result<(), String> {
    let journal_dir = config.resolve_journal_dir(journal_dir)?;

    let bus = Bus::new();
    let notifications = bus.subscribe_channel();

    let mut monitor = Monitor::new(monitor_settings(config, journal_dir), storage.clone(), bus)
        .map_err(|e| format!("failed to set up monitoring: {e}"))?;
    monitor
        .start()
        .map_err(|e| format!("failed to start monitoring: {e}"))?;
    eprintln!("Watching. Press Enter to stop.");

    let (enter, pressed) = mpsc::channel();
    thread::spawn(move || {
        let mut line = String::new();
        // EOF means no terminal; keep running until the deadline instead.
        if io::stdin().lock().read_line(&mut line).is_ok_and(|n| n > 0) {
            let _ = enter.send(());
        }
    });

    let deadline = duration.map(|limit| Instant::now() + limit);
    let printer = JsonLines;
    let result = loop {
        if pressed.try_recv().is_ok() || deadline.is_some_and(|d| Instant::now() >= d) {
            break Ok(());
        }
        match notifications.recv_timeout(PRINT_POLL_INTERVAL) {
            Ok(notification) => {
                if let Err(e) = printer.notify(&notification) {
                    break Err(format!("failed to write notification: {e}"));
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break Ok(()),
        }
    };

    monitor.stop();
    // Notifications published while stopping.
    for notification in notifications.try_iter() {
        printer.notify(&notification)?;
    }
    result
}

fn cmd_replay(config: &Config, file: &Path) -> Result<(), String> {
    let bus = Bus::new();
    bus.subscribe(Arc::new(JsonLines));

    let summary = monitor::replay_file(file, &bus, config.history_capacity)
        .map_err(|e| format!("failed to replay {}: {e}", file.display()))?;

    eprintln!(
        "{} lines: {} applied, {} malformed, {} failed",
        summary.lines, summary.routed, summary.malformed, summary.failed
    );
    Ok(())
}

fn cmd_systems(storage: &Storage) -> Result<(), String> {
    let store = storage
        .open_exploration()
        .map_err(|e| format!("failed to open exploration store: {e}"))?;
    let systems = store
        .list_systems()
        .map_err(|e| format!("failed to list systems: {e}"))?;

    if systems.is_empty() {
        println!("No systems");
        return Ok(());
    }

    for system in &systems {
        println!("{}", format_system(system));
    }
    Ok(())
}

fn cmd_system(storage: &Storage, address: u64) -> Result<(), String> {
    let store = storage
        .open_exploration()
        .map_err(|e| format!("failed to open exploration store: {e}"))?;
    let system = store
        .load_system(address)
        .map_err(|e| format!("failed to load system: {e}"))?
        .ok_or_else(|| format!("no system with address {address}"))?;

    println!("{}", format_system(&system));
    for body in &system.bodies {
        println!("  {}", format_body(body));
    }
    Ok(())
}

fn cmd_forget(storage: &Storage, address: u64) -> Result<(), String> {
    let store = storage
        .open_exploration()
        .map_err(|e| format!("failed to open exploration store: {e}"))?;
    let removed = store
        .delete_system(address)
        .map_err(|e| format!("failed to delete system: {e}"))?;

    if !removed {
        return Err(format!("no system with address {address}"));
    }
    eprintln!("Forgot system {address}");
    Ok(())
}

fn cmd_mining(storage: &Storage) -> Result<(), String> {
    let sessions = storage
        .load_mining_sessions()
        .map_err(|e| format!("failed to load mining sessions: {e}"))?;

    if sessions.is_empty() {
        println!("No mining sessions");
        return Ok(());
    }

    for session in &sessions {
        println!("{}", format_mining_session(session));
    }
    Ok(())
}
