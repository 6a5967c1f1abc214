//! Exploration: bodies scanned and mapped in the current system.

use std::collections::HashMap;
use std::sync::Arc;

use jiff::Timestamp;
use tracing::{debug, warn};

use crate::{
    event::{JournalEvent, shapes},
    model::{BodySignal, LocationContext, SystemExplorationData},
    notify::{Bus, Notification},
    storage::PersistenceWriter,
};

use super::Result;

/// Tracks exploration progress for the system the player is in.
///
/// Only the current system is mutated. Scans that name another system
/// address are stale and dropped.
pub struct ExplorationTracker {
    bus: Bus,
    writer: Arc<PersistenceWriter>,
    current: Option<u64>,
    systems: HashMap<u64, SystemExplorationData>,
}

impl ExplorationTracker {
    pub fn new(bus: Bus, writer: Arc<PersistenceWriter>) -> Self {
        Self {
            bus,
            writer,
            current: None,
            systems: HashMap::new(),
        }
    }

    /// The system currently tracked, if any.
    pub fn current(&self) -> Option<&SystemExplorationData> {
        self.current.and_then(|address| self.systems.get(&address))
    }

    /// Switches tracking to the system in `location`.
    ///
    /// The aggregate comes from this session's cache, then from the store,
    /// and is created fresh on a first visit. When `silent`, nothing is
    /// persisted; the call only re-establishes which system is current.
    pub fn begin_system(&mut self, location: &LocationContext, at: Timestamp, silent: bool) {
        let Some(address) = location.system_address else {
            debug!(system = %location.star_system, "location has no system address; not tracking");
            self.current = None;
            return;
        };
        self.current = Some(address);

        let mut created = false;
        if !self.systems.contains_key(&address) {
            let stored = self
                .writer
                .with_store(|store| store.load_system(address))
                .unwrap_or_else(|e| {
                    warn!(system = %location.star_system, error = %e, "could not load stored system");
                    None
                });
            created = stored.is_none();
            let system = stored
                .unwrap_or_else(|| SystemExplorationData::new(address, &location.star_system, at));
            self.systems.insert(address, system);
        }

        let Some(system) = self.systems.get_mut(&address) else {
            return;
        };
        let visited = system.record_visit(at) || created;
        if visited && !silent {
            if let Err(e) = self.writer.enqueue(system) {
                warn!(system = %system.system_name, error = %e, "could not persist visit");
            }
        }
    }

    pub fn handle(&mut self, event: &JournalEvent) -> Result<()> {
        let Some(current) = self.current_for(event) else {
            return Ok(());
        };
        let Some(system) = self.systems.get_mut(&current) else {
            return Ok(());
        };

        match event.name() {
            "FSSDiscoveryScan" => {
                let scan: shapes::FssDiscoveryScan = event.materialize()?;
                system.total_bodies = scan.body_count;
                system.fss_progress = scan.progress.clamp(0.0, 1.0);
            }
            "FSSAllBodiesFound" => {
                let found: shapes::FssAllBodiesFound = event.materialize()?;
                system.total_bodies = system.total_bodies.max(found.count);
                system.fss_progress = 1.0;
                system.all_bodies_found = true;
            }
            "Scan" => {
                let scan: shapes::Scan = event.materialize()?;
                let body = system.body_mut(scan.body_id, &scan.body_name);
                body.body_name = scan.body_name;
                body.body_type = scan.star_type.or(scan.planet_class);
                body.distance_ls = scan.distance_from_arrival_ls;
                body.landable = scan.landable;
                body.was_discovered = scan.was_discovered;
                body.was_mapped = scan.was_mapped;
                body.scanned = true;
            }
            "SAAScanComplete" => {
                let mapped: shapes::SaaScanComplete = event.materialize()?;
                system.body_mut(mapped.body_id, &mapped.body_name).mapped = true;
            }
            "FSSBodySignals" | "SAASignalsFound" => {
                let found: shapes::BodySignals = event.materialize()?;
                system.body_mut(found.body_id, &found.body_name).signals = found
                    .signals
                    .into_iter()
                    .map(|s| BodySignal {
                        kind: s.kind_localised.unwrap_or(s.kind),
                        count: s.count,
                    })
                    .collect();
            }
            other => {
                debug!(event = other, "not an exploration event");
                return Ok(());
            }
        }

        system.recount();
        self.writer.enqueue(system)?;
        self.bus
            .publish(&Notification::ExplorationUpdated(Box::new(system.clone())));
        Ok(())
    }

    /// The current system address, if the event belongs to it.
    fn current_for(&self, event: &JournalEvent) -> Option<u64> {
        let Some(current) = self.current else {
            debug!(event = event.name(), "no current system; ignoring");
            return None;
        };
        if let Some(address) = event.system_address().filter(|&a| a != current) {
            debug!(
                event = event.name(),
                address, current, "event is for another system; ignoring"
            );
            return None;
        }
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::mpsc::Receiver;

    use crate::{state::testing::event, storage::ExplorationStore, storage::WriterConfig};

    const DECIAT: u64 = 2_832_453_010_002;

    fn tracker() -> (ExplorationTracker, Receiver<Notification>, Arc<PersistenceWriter>) {
        let bus = Bus::new();
        let rx = bus.subscribe_channel();
        let writer = Arc::new(PersistenceWriter::new(
            ExplorationStore::open_in_memory().unwrap(),
            WriterConfig::default(),
        ));
        (ExplorationTracker::new(bus, Arc::clone(&writer)), rx, writer)
    }

    fn deciat() -> LocationContext {
        LocationContext {
            star_system: "Deciat".into(),
            system_address: Some(DECIAT),
            star_pos: None,
            is_new_system: true,
        }
    }

    fn scan(secs: u32, address: u64, id: u32, name: &str) -> JournalEvent {
        event(
            secs,
            &format!(
                r#"{{"event":"Scan","BodyName":"{name}","BodyID":{id},"SystemAddress":{address},"PlanetClass":"Icy body","DistanceFromArrivalLS":12.5}}"#
            ),
        )
    }

    #[test]
    fn scan_updates_current_system() {
        let (mut t, rx, writer) = tracker();
        t.begin_system(&deciat(), Timestamp::UNIX_EPOCH, false);

        t.handle(&scan(1, DECIAT, 1, "Deciat 1")).unwrap();

        let Notification::ExplorationUpdated(system) = rx.try_recv().unwrap() else {
            panic!("expected exploration update");
        };
        assert_eq!(system.system_address, DECIAT);
        assert_eq!(system.scanned_bodies, 1);
        assert_eq!(system.bodies[0].body_type.as_deref(), Some("Icy body"));

        let stored = writer.with_store(|s| s.load_system(DECIAT).unwrap().unwrap());
        assert_eq!(stored.bodies.len(), 1);
    }

    #[test]
    fn scan_for_other_system_is_dropped() {
        let (mut t, rx, _writer) = tracker();
        t.begin_system(&deciat(), Timestamp::UNIX_EPOCH, false);

        t.handle(&scan(1, 42, 1, "Elsewhere 1")).unwrap();

        assert!(rx.try_recv().is_err());
        assert!(t.current().unwrap().bodies.is_empty());
    }

    #[test]
    fn nothing_tracked_before_first_system() {
        let (mut t, rx, _writer) = tracker();

        t.handle(&scan(1, DECIAT, 1, "Deciat 1")).unwrap();

        assert!(rx.try_recv().is_err());
        assert!(t.current().is_none());
    }

    #[test]
    fn discovery_scan_mapping_and_signals() {
        let (mut t, _rx, _writer) = tracker();
        t.begin_system(&deciat(), Timestamp::UNIX_EPOCH, false);

        t.handle(&event(
            1,
            &format!(r#"{{"event":"FSSDiscoveryScan","Progress":0.5,"BodyCount":8,"SystemName":"Deciat","SystemAddress":{DECIAT}}}"#),
        ))
        .unwrap();
        t.handle(&event(
            2,
            &format!(r#"{{"event":"SAAScanComplete","BodyName":"Deciat 6","BodyID":6,"SystemAddress":{DECIAT},"ProbesUsed":5,"EfficiencyTarget":6}}"#),
        ))
        .unwrap();
        t.handle(&event(
            3,
            &format!(r#"{{"event":"SAASignalsFound","BodyName":"Deciat 6","BodyID":6,"SystemAddress":{DECIAT},"Signals":[{{"Type":"$SAA_SignalType_Biological;","Type_Localised":"Biological","Count":2}}]}}"#),
        ))
        .unwrap();
        t.handle(&event(
            4,
            &format!(r#"{{"event":"FSSAllBodiesFound","SystemName":"Deciat","SystemAddress":{DECIAT},"Count":8}}"#),
        ))
        .unwrap();

        let system = t.current().unwrap();
        assert_eq!(system.total_bodies, 8);
        assert!(system.all_bodies_found);
        assert_eq!(system.mapped_bodies, 1);
        assert_eq!(system.scanned_bodies, 0);
        assert_eq!(system.body(6).unwrap().signals[0].kind, "Biological");
    }

    #[test]
    fn revisit_resumes_stored_progress() {
        let (mut t, _rx, writer) = tracker();
        t.begin_system(&deciat(), Timestamp::UNIX_EPOCH, false);
        t.handle(&scan(1, DECIAT, 1, "Deciat 1")).unwrap();

        let mut fresh = ExplorationTracker::new(Bus::new(), writer);
        fresh.begin_system(&deciat(), Timestamp::new(100, 0).unwrap(), false);

        assert_eq!(fresh.current().unwrap().bodies.len(), 1);
    }

    #[test]
    fn silent_begin_does_not_persist() {
        let (mut t, rx, writer) = tracker();
        t.begin_system(&deciat(), Timestamp::new(100, 0).unwrap(), true);

        assert_eq!(t.current().unwrap().system_address, DECIAT);
        assert!(writer.with_store(|s| s.load_system(DECIAT).unwrap()).is_none());
        assert!(rx.try_recv().is_err());
    }
}
