//! Where the player is.

use serde::{Deserialize, Serialize};

/// The current system, as established by the first dispatch pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationContext {
    pub star_system: String,
    pub system_address: Option<u64>,
    pub star_pos: Option<[f64; 3]>,

    /// Set when this event moved the player into a different system, or is
    /// the first location seen this run.
    pub is_new_system: bool,
}

/// The station the player is docked at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DockedInfo {
    pub station_name: String,
    pub station_type: Option<String>,
    pub star_system: Option<String>,
    pub system_address: Option<u64>,
    pub market_id: Option<u64>,
}
