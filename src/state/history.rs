//! Journal history: a bounded log of notable events in plain words.

use std::collections::VecDeque;

use crate::{
    event::JournalEvent,
    model::{JournalHistoryEntry, LocationContext},
    notify::{Bus, Notification},
};

pub struct HistoryTracker {
    bus: Bus,
    capacity: usize,
    entries: VecDeque<JournalHistoryEntry>,
}

impl HistoryTracker {
    pub fn new(bus: Bus, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            bus,
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// Oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &JournalHistoryEntry> {
        self.entries.iter()
    }

    /// Appends an entry if the event is one worth remembering.
    pub fn record(&mut self, event: &JournalEvent, location: Option<&LocationContext>) {
        let Some(summary) = summarize(event) else {
            return;
        };
        let entry = JournalHistoryEntry {
            timestamp: event.timestamp(),
            event: event.name().to_string(),
            summary,
            star_system: event
                .star_system()
                .map(str::to_string)
                .or_else(|| location.map(|l| l.star_system.clone())),
        };
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry.clone());
        self.bus.publish(&Notification::HistoryAppended(entry));
    }
}

/// One-line summary for the events history keeps. `None` for the rest.
fn summarize(event: &JournalEvent) -> Option<String> {
    let text = |key| localised(event, key);
    let summary = match event.name() {
        "LoadGame" => format!("Loaded game as CMDR {}", text("Commander")?),
        "Location" => format!("Located in {}", event.star_system()?),
        "FSDJump" => match event.field("JumpDist").and_then(serde_json::Value::as_f64) {
            Some(distance) => format!("Jumped {distance:.2} ly to {}", event.star_system()?),
            None => format!("Jumped to {}", event.star_system()?),
        },
        "CarrierJump" => format!("Carrier jumped to {}", event.star_system()?),
        "Docked" => format!("Docked at {}", text("StationName")?),
        "Undocked" => format!("Undocked from {}", text("StationName")?),
        "Touchdown" => format!("Touched down on {}", text("Body").unwrap_or("surface")),
        "Scan" => format!("Scanned {}", text("BodyName")?),
        "SAAScanComplete" => format!("Mapped {}", text("BodyName")?),
        "FSSAllBodiesFound" => format!("All bodies found in {}", event.star_system()?),
        "MiningRefined" => format!("Refined {}", text("Type")?),
        "AsteroidCracked" => "Cracked a motherlode asteroid".to_string(),
        "MarketBuy" => format!("Bought {} {}", event.u64_field("Count")?, text("Type")?),
        "MarketSell" => format!("Sold {} {}", event.u64_field("Count")?, text("Type")?),
        "CarrierJumpRequest" => format!("Carrier jump scheduled to {}", text("SystemName")?),
        "CarrierJumpCancelled" => "Carrier jump cancelled".to_string(),
        "Died" => "Ship destroyed".to_string(),
        "Shutdown" => "Game shut down".to_string(),
        _ => return None,
    };
    Some(summary)
}

/// A field's localised text when the journal provides one.
fn localised<'a>(event: &'a JournalEvent, key: &str) -> Option<&'a str> {
    event
        .str_field(&format!("{key}_Localised"))
        .or_else(|| event.str_field(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::state::testing::event;

    #[test]
    fn records_notable_events_only() {
        let bus = Bus::new();
        let rx = bus.subscribe_channel();
        let mut t = HistoryTracker::new(bus, 10);

        t.record(&event(0, r#"{"event":"FSDJump","StarSystem":"Deciat","JumpDist":12.345}"#), None);
        t.record(&event(1, r#"{"event":"ReceiveText","Message":"o7"}"#), None);

        let entries: Vec<_> = t.entries().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].summary, "Jumped 12.35 ly to Deciat");
        assert!(matches!(rx.try_recv().unwrap(), Notification::HistoryAppended(_)));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn prefers_localised_names_and_location_context() {
        let mut t = HistoryTracker::new(Bus::new(), 10);
        let here = LocationContext {
            star_system: "Deciat".into(),
            system_address: None,
            star_pos: None,
            is_new_system: false,
        };

        t.record(
            &event(0, r#"{"event":"MiningRefined","Type":"$painite_name;","Type_Localised":"Painite"}"#),
            Some(&here),
        );

        let entry = t.entries().next().unwrap();
        assert_eq!(entry.summary, "Refined Painite");
        assert_eq!(entry.star_system.as_deref(), Some("Deciat"));
    }

    #[test]
    fn drops_oldest_past_capacity() {
        let mut t = HistoryTracker::new(Bus::new(), 2);
        for (secs, system) in [(0, "A"), (1, "B"), (2, "C")] {
            t.record(&event(secs, &format!(r#"{{"event":"Location","StarSystem":"{system}"}}"#)), None);
        }

        let summaries: Vec<_> = t.entries().map(|e| e.summary.as_str()).collect();
        assert_eq!(summaries, ["Located in B", "Located in C"]);
    }
}
