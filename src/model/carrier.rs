//! Fleet carrier state.

use std::collections::BTreeMap;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// The player's fleet carrier, keyed by carrier ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetCarrierState {
    pub carrier_id: u64,
    pub callsign: Option<String>,
    pub name: Option<String>,

    /// Tritium in the fuel depot, tonnes.
    pub fuel: u32,
    pub balance: Option<i64>,
    pub star_system: Option<String>,

    /// Commodity stock held on the carrier, per commodity key.
    pub commodities: BTreeMap<String, i64>,

    /// Open market orders, per commodity key.
    pub orders: BTreeMap<String, TradeOrder>,
    pub pending_jump: Option<PendingJump>,
    pub updated_at: Timestamp,
}

impl FleetCarrierState {
    pub fn new(carrier_id: u64, at: Timestamp) -> Self {
        Self {
            carrier_id,
            callsign: None,
            name: None,
            fuel: 0,
            balance: None,
            star_system: None,
            commodities: BTreeMap::new(),
            orders: BTreeMap::new(),
            pending_jump: None,
            updated_at: at,
        }
    }

    /// Adjusts stock for a commodity, dropping entries that reach zero.
    pub fn adjust_stock(&mut self, commodity: &str, delta: i64) {
        let stock = self.commodities.entry(commodity.to_string()).or_insert(0);
        *stock = (*stock + delta).max(0);
        if *stock == 0 {
            self.commodities.remove(commodity);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TradeOrder {
    Purchase { quantity: u32, price: Option<i64> },
    Sale { quantity: u32, price: Option<i64> },
}

/// A scheduled carrier jump that hasn't happened or been cancelled yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingJump {
    pub destination: String,
    pub body: Option<String>,
    pub departure: Option<Timestamp>,
    pub requested_at: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stock_never_goes_negative() {
        let mut carrier = FleetCarrierState::new(1, Timestamp::UNIX_EPOCH);
        carrier.adjust_stock("tritium", 10);
        carrier.adjust_stock("tritium", -4);
        assert_eq!(carrier.commodities["tritium"], 6);

        carrier.adjust_stock("tritium", -20);
        assert!(!carrier.commodities.contains_key("tritium"));
    }
}
