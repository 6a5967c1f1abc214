//! Starlog configuration.
//!
//! Loaded from `~/.starlog/config.toml`. Every key is optional and a missing
//! file means defaults:
//!
//! ```toml
//! journal-dir = "/path/to/Saved Games/Frontier Developments/Elite Dangerous"
//! poll-interval-ms = 1000
//! dedup-capacity = 5000
//! ```
//!
//! The journal directory resolves through a chain:
//!
//! 1. `--journal-dir <dir>` on the command line
//! 2. `STARLOG_JOURNAL_DIR` env var
//! 3. `journal-dir` in the config file
//! 4. The game's default location under the home directory

use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;

use crate::{storage::WriterConfig, tail::RetryPolicy};

/// Env var naming the journal directory.
pub const JOURNAL_DIR_ENV: &str = "STARLOG_JOURNAL_DIR";

/// Error message shown when no journal directory can be resolved.
pub const JOURNAL_DIR_REQUIRED: &str = "journal directory required: pass --journal-dir <dir>, \
    set STARLOG_JOURNAL_DIR, or add `journal-dir = \"...\"` to ~/.starlog/config.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Config {
    pub journal_dir: Option<PathBuf>,

    /// Where state is persisted. Defaults to `~/.starlog/`.
    pub data_dir: Option<PathBuf>,
    pub poll_interval_ms: u64,
    pub read_retry_attempts: u32,
    pub read_retry_delay_ms: u64,
    pub dedup_capacity: usize,
    pub history_capacity: usize,
    pub writer_batch_size: usize,
    pub writer_batch_window_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            journal_dir: None,
            data_dir: None,
            poll_interval_ms: 1000,
            read_retry_attempts: 5,
            read_retry_delay_ms: 50,
            dedup_capacity: 5000,
            history_capacity: 500,
            writer_batch_size: 32,
            writer_batch_window_ms: 250,
        }
    }
}

impl Config {
    /// Load config from `~/.starlog/config.toml`, or defaults if there is none.
    pub fn load() -> Result<Self, String> {
        let Some(path) = Self::path() else {
            return Ok(Self::default());
        };

        let contents = match fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(format!("failed to read {}: {e}", path.display())),
        };

        toml::from_str(&contents).map_err(|e| format!("invalid config at {}: {e}", path.display()))
    }

    /// The config file path: `~/.starlog/config.toml`.
    pub fn path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".starlog").join("config.toml"))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.read_retry_attempts,
            delay: Duration::from_millis(self.read_retry_delay_ms),
        }
    }

    pub fn writer_config(&self) -> WriterConfig {
        WriterConfig {
            batch_size: self.writer_batch_size,
            batch_window: Duration::from_millis(self.writer_batch_window_ms),
        }
    }

    /// Resolve the journal directory from the chain described above.
    pub fn resolve_journal_dir(&self, explicit: Option<&Path>) -> Result<PathBuf, String> {
        let from_env = env::var_os(JOURNAL_DIR_ENV).map(PathBuf::from);
        resolve_chain(explicit, from_env, self.journal_dir.as_deref(), default_journal_dir())
            .ok_or_else(|| JOURNAL_DIR_REQUIRED.to_string())
    }
}

fn resolve_chain(
    explicit: Option<&Path>,
    from_env: Option<PathBuf>,
    configured: Option<&Path>,
    default: Option<PathBuf>,
) -> Option<PathBuf> {
    // 1. Explicit --journal-dir flag.
    if let Some(dir) = explicit {
        return Some(dir.to_path_buf());
    }

    // 2. STARLOG_JOURNAL_DIR environment variable.
    if let Some(dir) = from_env.filter(|d| !d.as_os_str().is_empty()) {
        return Some(dir);
    }

    // 3. ~/.starlog/config.toml, then 4. the game's default.
    configured.map(Path::to_path_buf).or(default)
}

/// Where the game writes its journal on a default install.
fn default_journal_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| {
        h.join("Saved Games")
            .join("Frontier Developments")
            .join("Elite Dangerous")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_all_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert_eq!(config.writer_config(), WriterConfig::default());
    }

    #[test]
    fn kebab_case_keys_override_defaults() {
        let config: Config = toml::from_str(
            "journal-dir = \"/tmp/journal\"\npoll-interval-ms = 250\ndedup-capacity = 10\n",
        )
        .unwrap();

        assert_eq!(config.journal_dir.as_deref(), Some(Path::new("/tmp/journal")));
        assert_eq!(config.poll_interval(), Duration::from_millis(250));
        assert_eq!(config.dedup_capacity, 10);
        assert_eq!(config.history_capacity, 500);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(toml::from_str::<Config>("poll-interval = 5").is_err());
    }

    #[test]
    fn explicit_wins() {
        let dir = resolve_chain(
            Some(Path::new("/flag")),
            Some("/env".into()),
            Some(Path::new("/config")),
            Some("/default".into()),
        );
        assert_eq!(dir, Some("/flag".into()));
    }

    #[test]
    fn chain_falls_through_in_order() {
        let configured = Some(Path::new("/config"));
        let default = || Some(PathBuf::from("/default"));

        assert_eq!(
            resolve_chain(None, Some("/env".into()), configured, default()),
            Some("/env".into())
        );
        assert_eq!(
            resolve_chain(None, Some(PathBuf::new()), configured, default()),
            Some("/config".into())
        );
        assert_eq!(
            resolve_chain(None, None, None, default()),
            Some("/default".into())
        );
        assert_eq!(resolve_chain(None, None, None, None), None);
    }
}
