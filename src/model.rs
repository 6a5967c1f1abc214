//! Reconstructed state: what the trackers build from the journal.
//!
//! Every type here is a plain owned value. Notifications carry clones of
//! these, so subscribers hold snapshots and never a live reference into a
//! tracker.

mod carrier;
mod exploration;
mod history;
mod location;
mod mining;
mod ship;
mod snapshot;

pub use carrier::{FleetCarrierState, PendingJump, TradeOrder};
pub use exploration::{BodySignal, ScannedBody, SystemExplorationData};
pub use history::JournalHistoryEntry;
pub use location::{DockedInfo, LocationContext};
pub use mining::MiningSession;
pub use ship::{CargoSnapshot, Materials, ShipLoadout, ShipModule};
pub use snapshot::{MarketSnapshot, RouteHop, StatusSnapshot};
