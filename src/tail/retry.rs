//! Bounded retries for reads that race the game's writer.

use std::{io, thread, time::Duration};

use tracing::debug;

/// How hard to try before giving up on a read for this poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            delay: Duration::from_millis(50),
        }
    }
}

impl RetryPolicy {
    /// Runs `op` until it succeeds, fails for a non-transient reason, or the
    /// attempts run out.
    ///
    /// Returns `Ok(None)` when every attempt hit a transient failure. That is
    /// "no update this cycle", never an error.
    pub fn run<T>(&self, mut op: impl FnMut() -> io::Result<T>) -> io::Result<Option<T>> {
        let attempts = self.attempts.max(1);
        for attempt in 1..=attempts {
            match op() {
                Ok(value) => return Ok(Some(value)),
                Err(e) if is_transient(&e) => {
                    debug!(attempt, attempts, error = %e, "transient read failure");
                    if attempt < attempts {
                        thread::sleep(self.delay);
                    }
                }
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }
}

/// Whether a read failure is worth retrying.
///
/// Covers sharing and lock violations on Windows, plus `UnexpectedEof`,
/// which the snapshot reader uses for a file caught empty mid-rewrite.
pub fn is_transient(e: &io::Error) -> bool {
    // ERROR_SHARING_VIOLATION, ERROR_LOCK_VIOLATION.
    if cfg!(windows) && matches!(e.raw_os_error(), Some(32 | 33)) {
        return true;
    }
    matches!(
        e.kind(),
        io::ErrorKind::PermissionDenied
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::Interrupted
            | io::ErrorKind::UnexpectedEof
    )
}
