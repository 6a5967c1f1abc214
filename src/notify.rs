//! Notification fan-out.
//!
//! Trackers publish typed [`Notification`]s to a [`Bus`]; any number of
//! [`Subscriber`]s receive them. Every notification carries an owned
//! snapshot, so a subscriber can keep it as long as it likes.
//!
//! Delivery happens outside the subscriber lock. A subscriber that fails or
//! panics is logged and skipped; the rest still get the notification.

use std::{
    panic::{self, AssertUnwindSafe},
    sync::{Arc, PoisonError, RwLock, mpsc},
};

use serde::Serialize;
use tracing::{error, warn};

use crate::model::{
    CargoSnapshot, DockedInfo, FleetCarrierState, JournalHistoryEntry, LocationContext,
    MarketSnapshot, Materials, MiningSession, RouteHop, ShipLoadout, StatusSnapshot,
    SystemExplorationData,
};

/// A change in reconstructed state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum Notification {
    LocationChanged(LocationContext),
    Docked(DockedInfo),
    Undocked {
        station_name: Option<String>,
    },
    CargoProcessed(CargoSnapshot),
    LoadoutChanged(ShipLoadout),
    BalanceChanged {
        balance: i64,
    },
    MaterialsChanged(Materials),
    ExplorationUpdated(Box<SystemExplorationData>),
    MiningUpdated(MiningSession),
    MiningArchived(MiningSession),
    CarrierUpdated(Box<FleetCarrierState>),
    HistoryAppended(JournalHistoryEntry),
    StatusChanged(StatusSnapshot),
    MarketChanged(MarketSnapshot),
    NavRouteChanged(Vec<RouteHop>),
}

impl Notification {
    /// The variant name, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::LocationChanged(_) => "LocationChanged",
            Self::Docked(_) => "Docked",
            Self::Undocked { .. } => "Undocked",
            Self::CargoProcessed(_) => "CargoProcessed",
            Self::LoadoutChanged(_) => "LoadoutChanged",
            Self::BalanceChanged { .. } => "BalanceChanged",
            Self::MaterialsChanged(_) => "MaterialsChanged",
            Self::ExplorationUpdated(_) => "ExplorationUpdated",
            Self::MiningUpdated(_) => "MiningUpdated",
            Self::MiningArchived(_) => "MiningArchived",
            Self::CarrierUpdated(_) => "CarrierUpdated",
            Self::HistoryAppended(_) => "HistoryAppended",
            Self::StatusChanged(_) => "StatusChanged",
            Self::MarketChanged(_) => "MarketChanged",
            Self::NavRouteChanged(_) => "NavRouteChanged",
        }
    }
}

/// Receives notifications. Called from poll loop threads.
pub trait Subscriber: Send + Sync {
    fn notify(&self, notification: &Notification) -> Result<(), String>;
}

/// Forwards notifications into a channel.
pub struct ChannelSubscriber {
    sender: mpsc::Sender<Notification>,
}

impl Subscriber for ChannelSubscriber {
    fn notify(&self, notification: &Notification) -> Result<(), String> {
        self.sender
            .send(notification.clone())
            .map_err(|_| "receiver dropped".to_string())
    }
}

/// Registry of subscribers. Cheap to clone; clones share the registry.
#[derive(Clone, Default)]
pub struct Bus {
    subscribers: Arc<RwLock<Vec<Arc<dyn Subscriber>>>>,
}

impl Bus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, subscriber: Arc<dyn Subscriber>) {
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(subscriber);
    }

    /// Subscribes a channel and returns its receiving end.
    pub fn subscribe_channel(&self) -> mpsc::Receiver<Notification> {
        let (sender, receiver) = mpsc::channel();
        self.subscribe(Arc::new(ChannelSubscriber { sender }));
        receiver
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Delivers a notification to every subscriber, in subscription order.
    pub fn publish(&self, notification: &Notification) {
        let subscribers = self
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for (index, subscriber) in subscribers.iter().enumerate() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| subscriber.notify(notification)));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(
                    subscriber = index,
                    notification = notification.kind(),
                    error = %e,
                    "subscriber failed"
                ),
                Err(_) => error!(
                    subscriber = index,
                    notification = notification.kind(),
                    "subscriber panicked"
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing;

    impl Subscriber for Failing {
        fn notify(&self, _: &Notification) -> Result<(), String> {
            Err("nope".into())
        }
    }

    struct Panicking;

    impl Subscriber for Panicking {
        fn notify(&self, _: &Notification) -> Result<(), String> {
            panic!("subscriber blew up");
        }
    }

    fn balance(balance: i64) -> Notification {
        Notification::BalanceChanged { balance }
    }

    #[test]
    fn delivers_to_every_subscriber() {
        let bus = Bus::new();
        let first = bus.subscribe_channel();
        let second = bus.subscribe_channel();

        bus.publish(&balance(100));

        assert_eq!(first.try_recv().unwrap(), balance(100));
        assert_eq!(second.try_recv().unwrap(), balance(100));
    }

    #[test]
    fn failing_and_panicking_subscribers_do_not_block_others() {
        let bus = Bus::new();
        bus.subscribe(Arc::new(Failing));
        bus.subscribe(Arc::new(Panicking));
        let rx = bus.subscribe_channel();

        bus.publish(&balance(1));
        bus.publish(&balance(2));

        let received: Vec<_> = rx.try_iter().collect();
        assert_eq!(received, [balance(1), balance(2)]);
        assert_eq!(bus.subscriber_count(), 3);
    }

    #[test]
    fn dropped_receiver_is_tolerated() {
        let bus = Bus::new();
        drop(bus.subscribe_channel());

        bus.publish(&balance(5));
    }

    #[test]
    fn serializes_with_type_tag() {
        let json = serde_json::to_value(balance(42)).unwrap();

        assert_eq!(json["type"], "BalanceChanged");
        assert_eq!(json["data"]["balance"], 42);
    }
}
