//! Two-pass dispatch of a batch of journal lines.
//!
//! Pass 1 walks the batch to establish where the player is: every event
//! that reports the player's own system updates the [`LocationContext`]. Pass 2 walks it
//! again and routes each event to the trackers that care. Running location
//! first means an event is attributed to the system the batch ends up in,
//! not a system the player has already left.
//!
//! Lines the [`DedupLedger`] has seen before, or stamped older than its
//! watermark, still feed pass 1 so a restart re-learns the location, but
//! publish nothing and skip pass 2. Duplicates are judged by content hash, so
//! byte-identical lines within one batch collapse to the first.

use std::{
    collections::HashSet,
    sync::{Arc, Mutex, PoisonError},
};

use jiff::Timestamp;
use tracing::{debug, warn};

use crate::{
    event::{JournalEvent, parse_line},
    fingerprint::fingerprint,
    model::LocationContext,
    notify::{Bus, Notification},
    state::{CarrierTracker, ExplorationTracker, HistoryTracker, MiningTracker, ShipTracker},
    storage::DedupLedger,
};

/// Events whose `StarSystem` or `SystemName` is the player's current
/// system. Others, like `CarrierLocation` or `StartJump`, may name somewhere
/// else.
const LOCATION_EVENTS: [&str; 14] = [
    "Location",
    "FSDJump",
    "CarrierJump",
    "Docked",
    "SupercruiseEntry",
    "SupercruiseExit",
    "ApproachBody",
    "LeaveBody",
    "Touchdown",
    "Liftoff",
    "Embark",
    "Disembark",
    "FSSDiscoveryScan",
    "FSSAllBodiesFound",
];

/// Where pass 2 sends an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    /// Context was handled in pass 1.
    Location,
    Arrival,
    CarrierArrival,
    Exploration,
    Mining,
    MiningCargo,
    Carrier,
    CarrierCargo,
    Ship,
    Ignored,
}

fn route(name: &str) -> Route {
    match name {
        "Location" => Route::Location,
        "FSDJump" => Route::Arrival,
        "CarrierJump" => Route::CarrierArrival,
        "Scan" | "FSSDiscoveryScan" | "FSSAllBodiesFound" | "SAAScanComplete" | "FSSBodySignals"
        | "SAASignalsFound" => Route::Exploration,
        "SupercruiseExit" | "SupercruiseEntry" | "Music" | "Shutdown" | "Fileheader"
        | "ProspectedAsteroid" | "AsteroidCracked" | "LaunchDrone" => Route::Mining,
        "MiningRefined" | "CollectCargo" => Route::MiningCargo,
        "CarrierStats" | "CarrierJumpRequest" | "CarrierJumpCancelled" | "CarrierDepositFuel"
        | "CarrierTradeOrder" => Route::Carrier,
        "CargoTransfer" | "MarketBuy" | "MarketSell" => Route::CarrierCargo,
        "LoadGame" | "Commander" | "Loadout" | "ModuleBuy" | "ModuleSell" | "ModuleStore"
        | "ModuleRetrieve" | "ModuleSwap" | "RefuelAll" | "Repair" | "BuyDrones" | "SellDrones"
        | "RedeemVoucher" | "Cargo" | "EjectCargo" | "Materials" | "MaterialCollected"
        | "MaterialDiscarded" | "Docked" | "Undocked" => Route::Ship,
        _ => Route::Ignored,
    }
}

/// The trackers a dispatcher feeds.
pub struct Trackers {
    pub ship: ShipTracker,
    pub exploration: ExplorationTracker,
    pub mining: MiningTracker,
    pub carrier: CarrierTracker,
    pub history: HistoryTracker,
}

/// Counts from one dispatched batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub lines: usize,
    pub malformed: usize,
    pub duplicates: usize,
    pub routed: usize,
    pub failed: usize,
}

struct Parsed {
    event: JournalEvent,
    hash: String,
    duplicate: bool,
}

pub struct Dispatcher {
    bus: Bus,
    ledger: Arc<Mutex<DedupLedger>>,
    location: Option<LocationContext>,
    trackers: Trackers,
    /// Game time of the newest line handled.
    last_seen: Option<Timestamp>,
}

impl Dispatcher {
    pub fn new(bus: Bus, ledger: Arc<Mutex<DedupLedger>>, trackers: Trackers) -> Self {
        Self {
            bus,
            ledger,
            location: None,
            trackers,
            last_seen: None,
        }
    }

    pub fn location(&self) -> Option<&LocationContext> {
        self.location.as_ref()
    }

    pub fn trackers(&self) -> &Trackers {
        &self.trackers
    }

    /// Closes what a shutdown would otherwise leave open: an active mining
    /// session is archived, ending at the newest line seen.
    pub fn finish(&mut self) {
        let at = self.last_seen.unwrap_or_else(Timestamp::now);
        self.trackers.mining.stop(at);
    }

    /// Processes one batch of lines, in file order.
    pub fn dispatch(&mut self, lines: &[String]) -> BatchSummary {
        let mut summary = BatchSummary {
            lines: lines.len(),
            ..BatchSummary::default()
        };
        let batch = self.parse(lines, &mut summary);

        for parsed in &batch {
            self.establish_location(&parsed.event, parsed.duplicate);
        }

        for parsed in batch.iter().filter(|p| !p.duplicate) {
            if self.apply(&parsed.event) {
                summary.routed += 1;
            } else {
                summary.failed += 1;
            }
        }

        self.remember(&batch);
        if summary.lines > 0 {
            debug!(
                lines = summary.lines,
                malformed = summary.malformed,
                duplicates = summary.duplicates,
                failed = summary.failed,
                "dispatched journal batch"
            );
        }
        summary
    }

    /// Parses lines and marks the ones already processed.
    ///
    /// A line is a duplicate if the ledger holds its hash, an identical line
    /// came earlier in the batch, or its own timestamp predates the
    /// watermark. Lines without a timestamp are judged by hash alone.
    fn parse(&self, lines: &[String], summary: &mut BatchSummary) -> Vec<Parsed> {
        let ledger = self.ledger.lock().unwrap_or_else(PoisonError::into_inner);
        let watermark = ledger.last_processed();
        let mut seen = HashSet::new();
        let mut batch = Vec::with_capacity(lines.len());

        for line in lines {
            let event = match parse_line(line) {
                Ok(event) => event,
                Err(e) => {
                    warn!(error = %e, "skipping malformed journal line");
                    summary.malformed += 1;
                    continue;
                }
            };
            let hash = fingerprint(event.raw());
            let duplicate = ledger.contains(&hash)
                || !seen.insert(hash.clone())
                || watermark.zip(event.game_timestamp()).is_some_and(|(w, at)| at < w);
            if duplicate {
                summary.duplicates += 1;
            }
            batch.push(Parsed {
                event,
                hash,
                duplicate,
            });
        }
        batch
    }

    /// Records processed lines in the ledger and advances its watermark.
    /// Only timestamps the game wrote move the watermark.
    fn remember(&mut self, batch: &[Parsed]) {
        let mut ledger = self.ledger.lock().unwrap_or_else(PoisonError::into_inner);
        for parsed in batch.iter().filter(|p| !p.duplicate) {
            ledger.insert(parsed.hash.clone());
            if let Some(at) = parsed.event.game_timestamp() {
                ledger.advance(at);
                self.last_seen = self.last_seen.max(Some(at));
            }
        }
    }

    /// Pass 1. `silent` replays a line already processed: context moves,
    /// nothing is published or persisted.
    fn establish_location(&mut self, event: &JournalEvent, silent: bool) {
        if !LOCATION_EVENTS.contains(&event.name()) {
            return;
        }
        let Some(name) = event.star_system() else {
            return;
        };

        let is_jump = matches!(event.name(), "FSDJump" | "CarrierJump");
        let previous = self.location.as_ref();
        let is_new_system = is_jump || previous.is_none_or(|l| l.star_system != name);
        let same = previous.filter(|_| !is_new_system);
        let context = LocationContext {
            star_system: name.to_string(),
            system_address: event
                .system_address()
                .or_else(|| same.and_then(|l| l.system_address)),
            star_pos: event.star_pos().or_else(|| same.and_then(|l| l.star_pos)),
            is_new_system,
        };
        let changed = is_new_system
            || previous.is_none_or(|l| {
                l.system_address != context.system_address || l.star_pos != context.star_pos
            });
        let address_changed =
            previous.is_none_or(|l| l.system_address != context.system_address);

        if is_new_system || address_changed {
            self.trackers
                .exploration
                .begin_system(&context, event.timestamp(), silent);
        }
        if changed && !silent {
            debug!(system = %context.star_system, new = is_new_system, "location changed");
            self.bus.publish(&Notification::LocationChanged(context.clone()));
        }
        self.location = Some(context);

        let docked_on_load = matches!(event.name(), "Location" | "CarrierJump")
            && event.bool_field("Docked") == Some(true);
        let undocked_on_load = event.name() == "Location" && event.bool_field("Docked") == Some(false);
        if docked_on_load || undocked_on_load {
            if let Err(e) = self.trackers.ship.dock_on_load(event, !silent) {
                warn!(event = event.name(), error = %e, "could not apply dock state");
            }
        }
    }

    /// Pass 2. Returns `false` if a handler failed.
    fn apply(&mut self, event: &JournalEvent) -> bool {
        let location = self.location.as_ref();
        let t = &mut self.trackers;
        let result = match route(event.name()) {
            Route::Location | Route::Ignored => Ok(()),
            Route::Arrival => t.mining.handle(event, location),
            Route::CarrierArrival => t
                .mining
                .handle(event, location)
                .and_then(|()| t.carrier.handle(event, t.ship.docked())),
            Route::Exploration => t.exploration.handle(event),
            Route::Mining => t.mining.handle(event, location),
            Route::MiningCargo => t
                .mining
                .handle(event, location)
                .and_then(|()| t.ship.handle(event)),
            Route::Carrier => t.carrier.handle(event, t.ship.docked()),
            Route::CarrierCargo => t
                .carrier
                .handle(event, t.ship.docked())
                .and_then(|()| t.ship.handle(event)),
            Route::Ship => t.ship.handle(event),
        };
        t.history.record(event, location);

        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(event = event.name(), error = %e, "failed to apply journal event");
                false
            }
        }
    }
}
