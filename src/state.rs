//! State reconstruction: trackers that turn journal events into aggregates.
//!
//! Each tracker owns one aggregate (or a small set keyed by a stable id),
//! mutates it from the events the dispatcher routes to it, and publishes a
//! notification with an owned snapshot after every change. Events that name
//! a different key than the one being tracked are ignored, not errors.

mod carrier;
mod exploration;
mod history;
mod mining;
mod ship;

pub use carrier::CarrierTracker;
pub use exploration::ExplorationTracker;
pub use history::HistoryTracker;
pub use mining::MiningTracker;
pub use ship::ShipTracker;

use crate::{event::ParseError, storage::StorageError};

/// Failure while applying one event. Logged by the dispatcher; the batch
/// carries on.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type Result<T> = core::result::Result<T, StateError>;
