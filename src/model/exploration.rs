//! Exploration progress per system.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// Everything known about one system's bodies.
///
/// Keyed by `system_address`: names can collide, addresses can't.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemExplorationData {
    pub system_address: u64,
    pub system_name: String,

    /// Body count reported by the discovery scan. Zero until one happens.
    pub total_bodies: u32,
    pub scanned_bodies: u32,
    pub mapped_bodies: u32,

    /// Discovery scan progress, `0.0..=1.0`.
    pub fss_progress: f64,
    pub all_bodies_found: bool,
    pub last_visited: Timestamp,
    pub bodies: Vec<ScannedBody>,
}

impl SystemExplorationData {
    pub fn new(system_address: u64, system_name: impl Into<String>, visited: Timestamp) -> Self {
        Self {
            system_address,
            system_name: system_name.into(),
            total_bodies: 0,
            scanned_bodies: 0,
            mapped_bodies: 0,
            fss_progress: 0.0,
            all_bodies_found: false,
            last_visited: visited,
            bodies: Vec::new(),
        }
    }

    /// Advances `last_visited`. Older timestamps never move it back.
    ///
    /// Returns whether the time advanced.
    pub fn record_visit(&mut self, at: Timestamp) -> bool {
        if at > self.last_visited {
            self.last_visited = at;
            true
        } else {
            false
        }
    }

    pub fn body(&self, body_id: u32) -> Option<&ScannedBody> {
        self.bodies.iter().find(|b| b.body_id == body_id)
    }

    /// Returns the body with this id, creating a placeholder if needed.
    pub fn body_mut(&mut self, body_id: u32, body_name: &str) -> &mut ScannedBody {
        let index = match self.bodies.iter().position(|b| b.body_id == body_id) {
            Some(index) => index,
            None => {
                self.bodies.push(ScannedBody::new(body_id, body_name));
                self.bodies.len() - 1
            }
        };
        &mut self.bodies[index]
    }

    /// Recomputes the scanned and mapped counters from the body list.
    pub fn recount(&mut self) {
        self.bodies.sort_by_key(|b| b.body_id);
        self.scanned_bodies = count(self.bodies.iter().filter(|b| b.scanned));
        self.mapped_bodies = count(self.bodies.iter().filter(|b| b.mapped));
    }
}

fn count<'a>(bodies: impl Iterator<Item = &'a ScannedBody>) -> u32 {
    u32::try_from(bodies.count()).unwrap_or(u32::MAX)
}

/// One body in a system. Identity is `(body_id, system_address)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScannedBody {
    pub body_id: u32,
    pub body_name: String,

    /// Star type or planet class.
    pub body_type: Option<String>,
    pub distance_ls: f64,
    pub landable: bool,

    /// A detailed scan was recorded. Signal events can create a body first.
    pub scanned: bool,
    pub was_discovered: bool,
    pub was_mapped: bool,

    /// Surface-mapped by the player.
    pub mapped: bool,
    pub signals: Vec<BodySignal>,
}

impl ScannedBody {
    pub fn new(body_id: u32, body_name: impl Into<String>) -> Self {
        Self {
            body_id,
            body_name: body_name.into(),
            body_type: None,
            distance_ls: 0.0,
            landable: false,
            scanned: false,
            was_discovered: false,
            was_mapped: false,
            mapped: false,
            signals: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BodySignal {
    pub kind: String,
    pub count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> Timestamp {
        Timestamp::new(secs, 0).unwrap()
    }

    #[test]
    fn visit_time_never_regresses() {
        let mut system = SystemExplorationData::new(1, "Sol", at(2_000));

        assert!(!system.record_visit(at(1_000)));
        assert_eq!(system.last_visited, at(2_000));

        assert!(system.record_visit(at(3_000)));
        assert_eq!(system.last_visited, at(3_000));
    }

    #[test]
    fn body_mut_upserts_by_id() {
        let mut system = SystemExplorationData::new(1, "Sol", at(0));
        system.body_mut(3, "Earth").scanned = true;
        system.body_mut(3, "Earth").mapped = true;
        system.body_mut(1, "Mercury");
        system.recount();

        assert_eq!(system.bodies.len(), 2);
        assert_eq!(system.bodies[0].body_id, 1);
        assert_eq!(system.scanned_bodies, 1);
        assert_eq!(system.mapped_bodies, 1);
    }
}
