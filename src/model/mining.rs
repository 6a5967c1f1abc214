//! Mining sessions.

use std::collections::BTreeMap;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// One stretch of mining at a ring or asteroid cluster, keyed by its start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MiningSession {
    pub started_at: Timestamp,
    pub ended_at: Option<Timestamp>,
    pub star_system: Option<String>,
    pub system_address: Option<u64>,
    pub body: Option<String>,

    /// Refined tonnage per commodity key.
    pub refined: BTreeMap<String, u32>,

    /// Cargo scooped while mining, per commodity key.
    pub collected: BTreeMap<String, u32>,
    pub prospected: u32,

    /// Prospected asteroids per content level (`high`, `medium`, `low`).
    #[serde(default)]
    pub prospected_content: BTreeMap<String, u32>,

    /// Prospected asteroids containing each material, per commodity key.
    #[serde(default)]
    pub prospected_materials: BTreeMap<String, u32>,

    /// Motherlode cores found by the prospector, per commodity key.
    #[serde(default)]
    pub motherlodes: BTreeMap<String, u32>,
    pub cracked: u32,
    pub prospectors_launched: u32,
    pub collectors_launched: u32,
}

impl MiningSession {
    pub fn start(
        at: Timestamp,
        star_system: Option<String>,
        system_address: Option<u64>,
        body: Option<String>,
    ) -> Self {
        Self {
            started_at: at,
            ended_at: None,
            star_system,
            system_address,
            body,
            refined: BTreeMap::new(),
            collected: BTreeMap::new(),
            prospected: 0,
            prospected_content: BTreeMap::new(),
            prospected_materials: BTreeMap::new(),
            motherlodes: BTreeMap::new(),
            cracked: 0,
            prospectors_launched: 0,
            collectors_launched: 0,
        }
    }

    /// Whether anything worth archiving happened. Launching limpets alone
    /// doesn't count.
    pub fn has_data(&self) -> bool {
        !self.refined.is_empty() || self.prospected > 0 || self.cracked > 0
    }

    pub fn total_refined(&self) -> u32 {
        self.refined.values().sum()
    }
}
