//! Mining sessions: start at a ring, count what happens, archive on exit.
//!
//! ```text
//! Inactive --SupercruiseExit at ring/cluster--> Active
//! Active   --SupercruiseEntry | arrival | main menu | Shutdown | Fileheader--> Inactive
//! ```
//!
//! A session that recorded no refine, prospect, or crack is discarded on
//! stop rather than archived.

use jiff::Timestamp;
use tracing::{debug, info, warn};

use crate::{
    event::{JournalEvent, shapes},
    model::{LocationContext, MiningSession},
    notify::{Bus, Notification},
    storage::Storage,
};

use super::Result;

const MINEABLE_BODY_TYPES: [&str; 2] = ["PlanetaryRing", "AsteroidCluster"];

pub struct MiningTracker {
    bus: Bus,
    storage: Option<Storage>,
    session: Option<MiningSession>,
}

impl MiningTracker {
    /// Archived sessions go to `storage` when given; otherwise they are only
    /// published.
    pub fn new(bus: Bus, storage: Option<Storage>) -> Self {
        Self {
            bus,
            storage,
            session: None,
        }
    }

    pub fn session(&self) -> Option<&MiningSession> {
        self.session.as_ref()
    }

    pub fn handle(&mut self, event: &JournalEvent, location: Option<&LocationContext>) -> Result<()> {
        let at = event.timestamp();
        match event.name() {
            "SupercruiseExit" => {
                let exit: shapes::SupercruiseExit = event.materialize()?;
                let at_ring = exit
                    .body_type
                    .as_deref()
                    .is_some_and(|t| MINEABLE_BODY_TYPES.contains(&t));
                if at_ring {
                    self.stop(at);
                    let star_system = exit
                        .star_system
                        .or_else(|| location.map(|l| l.star_system.clone()));
                    let system_address = exit
                        .system_address
                        .or_else(|| location.and_then(|l| l.system_address));
                    self.start(MiningSession::start(at, star_system, system_address, exit.body));
                }
                return Ok(());
            }
            "SupercruiseEntry" | "Shutdown" | "Fileheader" | "FSDJump" | "CarrierJump" => {
                self.stop(at);
                return Ok(());
            }
            "Music" => {
                let music: shapes::Music = event.materialize()?;
                if music.music_track == "MainMenu" {
                    self.stop(at);
                }
                return Ok(());
            }
            _ => {}
        }

        let Some(session) = self.session.as_mut() else {
            debug!(event = event.name(), "no mining session; ignoring");
            return Ok(());
        };
        match event.name() {
            "MiningRefined" => {
                let refined: shapes::MiningRefined = event.materialize()?;
                *session
                    .refined
                    .entry(shapes::commodity_key(&refined.kind))
                    .or_insert(0) += 1;
            }
            "ProspectedAsteroid" => {
                let prospected: shapes::ProspectedAsteroid = event.materialize()?;
                session.prospected += 1;
                if let Some(level) = prospected.content.as_deref().and_then(content_level) {
                    *session.prospected_content.entry(level).or_insert(0) += 1;
                }
                for material in &prospected.materials {
                    *session
                        .prospected_materials
                        .entry(shapes::commodity_key(&material.name))
                        .or_insert(0) += 1;
                }
                if let Some(core) = &prospected.motherlode_material {
                    info!(material = %core, "motherlode prospected");
                    *session.motherlodes.entry(shapes::commodity_key(core)).or_insert(0) += 1;
                }
            }
            "AsteroidCracked" => session.cracked += 1,
            "LaunchDrone" => {
                let drone: shapes::LaunchDrone = event.materialize()?;
                match drone.kind.as_str() {
                    "Prospector" => session.prospectors_launched += 1,
                    "Collection" => session.collectors_launched += 1,
                    _ => return Ok(()),
                }
            }
            "CollectCargo" => {
                let collected: shapes::CollectCargo = event.materialize()?;
                *session
                    .collected
                    .entry(shapes::commodity_key(&collected.kind))
                    .or_insert(0) += 1;
            }
            other => {
                debug!(event = other, "not a mining event");
                return Ok(());
            }
        }
        self.bus.publish(&Notification::MiningUpdated(session.clone()));
        Ok(())
    }

    fn start(&mut self, session: MiningSession) {
        info!(body = ?session.body, "mining session started");
        self.bus.publish(&Notification::MiningUpdated(session.clone()));
        self.session = Some(session);
    }

    /// Ends the active session, archiving it if it recorded anything.
    pub fn stop(&mut self, at: Timestamp) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        session.ended_at = Some(at);
        if !session.has_data() {
            debug!(body = ?session.body, "mining session had no activity; discarding");
            return;
        }

        if let Some(storage) = &self.storage {
            if let Err(e) = storage.append_mining_session(&session) {
                warn!(error = %e, "could not archive mining session");
            }
        }
        info!(
            body = ?session.body,
            refined = session.total_refined(),
            "mining session archived"
        );
        self.bus.publish(&Notification::MiningArchived(session));
    }
}

/// `$AsteroidMaterialContent_High;` becomes `high`.
fn content_level(raw: &str) -> Option<String> {
    let level = raw
        .trim_start_matches('$')
        .trim_end_matches(';')
        .rsplit('_')
        .next()?
        .to_ascii_lowercase();
    (!level.is_empty()).then_some(level)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::mpsc::Receiver;

    use tempfile::TempDir;

    use crate::state::testing::event;

    const RING_EXIT: &str = r#"{"event":"SupercruiseExit","StarSystem":"Col 285 Sector","SystemAddress":1,"Body":"Col 285 Sector 2 A Ring","BodyID":7,"BodyType":"PlanetaryRing"}"#;

    fn tracker(storage: Option<Storage>) -> (MiningTracker, Receiver<Notification>) {
        let bus = Bus::new();
        let rx = bus.subscribe_channel();
        (MiningTracker::new(bus, storage), rx)
    }

    fn location() -> LocationContext {
        LocationContext {
            star_system: "Col 285 Sector".into(),
            system_address: Some(1),
            star_pos: None,
            is_new_system: false,
        }
    }

    #[test]
    fn session_with_refines_is_archived() {
        let dir = TempDir::new().unwrap();
        let storage = Storage::new(dir.path()).unwrap();
        let (mut t, rx) = tracker(Some(storage.clone()));
        let here = location();

        t.handle(&event(0, RING_EXIT), Some(&here)).unwrap();
        t.handle(&event(1, r#"{"event":"ProspectedAsteroid","Materials":[],"Remaining":100.0}"#), Some(&here)).unwrap();
        t.handle(&event(2, r#"{"event":"MiningRefined","Type":"$painite_name;","Type_Localised":"Painite"}"#), Some(&here)).unwrap();
        t.handle(&event(3, r#"{"event":"MiningRefined","Type":"$Painite_Name;"}"#), Some(&here)).unwrap();
        t.handle(&event(4, r#"{"event":"SupercruiseEntry","StarSystem":"Col 285 Sector"}"#), Some(&here)).unwrap();

        assert!(t.session().is_none());
        let archived: Vec<_> = rx
            .try_iter()
            .filter_map(|n| match n {
                Notification::MiningArchived(session) => Some(session),
                _ => None,
            })
            .collect();
        assert_eq!(archived.len(), 1);
        assert_eq!(archived[0].refined["painite"], 2);
        assert_eq!(archived[0].prospected, 1);
        assert_eq!(archived[0].star_system.as_deref(), Some("Col 285 Sector"));
        assert!(archived[0].ended_at.is_some());

        assert_eq!(storage.load_mining_sessions().unwrap().len(), 1);
    }

    #[test]
    fn idle_session_is_discarded() {
        let (mut t, rx) = tracker(None);

        t.handle(&event(0, RING_EXIT), Some(&location())).unwrap();
        t.handle(&event(1, r#"{"event":"LaunchDrone","Type":"Prospector"}"#), None).unwrap();
        t.handle(&event(2, r#"{"event":"Shutdown"}"#), None).unwrap();

        assert!(t.session().is_none());
        assert!(
            !rx.try_iter()
                .any(|n| matches!(n, Notification::MiningArchived(_)))
        );
    }

    #[test]
    fn session_falls_back_to_location_context() {
        let (mut t, _rx) = tracker(None);

        t.handle(
            &event(0, r#"{"event":"SupercruiseExit","Body":"Col 285 Sector 2 A Ring","BodyType":"PlanetaryRing"}"#),
            Some(&location()),
        )
        .unwrap();

        let session = t.session().unwrap();
        assert_eq!(session.star_system.as_deref(), Some("Col 285 Sector"));
        assert_eq!(session.system_address, Some(1));
    }

    #[test]
    fn non_ring_exit_does_not_start() {
        let (mut t, _rx) = tracker(None);

        t.handle(
            &event(0, r#"{"event":"SupercruiseExit","Body":"Deciat 6","BodyType":"Planet"}"#),
            None,
        )
        .unwrap();

        assert!(t.session().is_none());
    }

    #[test]
    fn events_outside_a_session_are_ignored() {
        let (mut t, rx) = tracker(None);

        t.handle(&event(0, r#"{"event":"MiningRefined","Type":"$gold_name;"}"#), None).unwrap();

        assert!(t.session().is_none());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn main_menu_and_arrival_stop_the_session() {
        let (mut t, _rx) = tracker(None);

        t.handle(&event(0, RING_EXIT), None).unwrap();
        t.handle(&event(1, r#"{"event":"Music","MusicTrack":"Exploration"}"#), None).unwrap();
        assert!(t.session().is_some());
        t.handle(&event(2, r#"{"event":"Music","MusicTrack":"MainMenu"}"#), None).unwrap();
        assert!(t.session().is_none());

        t.handle(&event(3, RING_EXIT), None).unwrap();
        t.handle(&event(4, r#"{"event":"FSDJump","StarSystem":"Sol","SystemAddress":10477373803}"#), None).unwrap();
        assert!(t.session().is_none());
    }

    #[test]
    fn counts_drones_cracks_and_collected_cargo() {
        let (mut t, _rx) = tracker(None);

        t.handle(&event(0, RING_EXIT), None).unwrap();
        t.handle(&event(1, r#"{"event":"LaunchDrone","Type":"Prospector"}"#), None).unwrap();
        t.handle(&event(2, r#"{"event":"LaunchDrone","Type":"Collection"}"#), None).unwrap();
        t.handle(&event(3, r#"{"event":"AsteroidCracked","Body":"Col 285 Sector 2 A Ring"}"#), None).unwrap();
        t.handle(&event(4, r#"{"event":"CollectCargo","Type":"platinum","Stolen":false}"#), None).unwrap();

        let session = t.session().unwrap();
        assert_eq!(session.prospectors_launched, 1);
        assert_eq!(session.collectors_launched, 1);
        assert_eq!(session.cracked, 1);
        assert_eq!(session.collected["platinum"], 1);
    }

    #[test]
    fn prospector_results_are_tallied() {
        let (mut t, _rx) = tracker(None);

        t.handle(&event(0, RING_EXIT), None).unwrap();
        t.handle(
            &event(
                1,
                r#"{"event":"ProspectedAsteroid","Materials":[{"Name":"Platinum","Proportion":31.2},{"Name":"Osmium","Proportion":8.1}],"Content":"$AsteroidMaterialContent_High;","Content_Localised":"Material Content: High","Remaining":100.0}"#,
            ),
            None,
        )
        .unwrap();
        t.handle(
            &event(
                2,
                r#"{"event":"ProspectedAsteroid","Materials":[{"Name":"Platinum","Proportion":12.0}],"MotherlodeMaterial":"Painite","Content":"$AsteroidMaterialContent_Low;","Remaining":100.0}"#,
            ),
            None,
        )
        .unwrap();

        let session = t.session().unwrap();
        assert_eq!(session.prospected, 2);
        assert_eq!(session.prospected_content["high"], 1);
        assert_eq!(session.prospected_content["low"], 1);
        assert_eq!(session.prospected_materials["platinum"], 2);
        assert_eq!(session.prospected_materials["osmium"], 1);
        assert_eq!(session.motherlodes["painite"], 1);
    }

    #[test]
    fn content_levels_are_normalized() {
        assert_eq!(content_level("$AsteroidMaterialContent_Medium;").as_deref(), Some("medium"));
        assert_eq!(content_level("").as_deref(), None);
    }
}
