//! Snapshot file contents: `Status.json`, `Market.json`, `NavRoute.json`.
//!
//! Read with the game's PascalCase names, written back out in camelCase like
//! the rest of the model.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "camelCase", deserialize = "PascalCase"))]
pub struct StatusSnapshot {
    #[serde(default)]
    pub flags: u64,
    #[serde(default)]
    pub flags2: Option<u64>,
    #[serde(default)]
    pub gui_focus: Option<u32>,
    #[serde(default)]
    pub fuel: Option<StatusFuel>,
    #[serde(default)]
    pub cargo: Option<f64>,
    #[serde(default)]
    pub legal_state: Option<String>,
    #[serde(default)]
    pub balance: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "camelCase", deserialize = "PascalCase"))]
pub struct StatusFuel {
    #[serde(default)]
    pub fuel_main: f64,
    #[serde(default)]
    pub fuel_reservoir: f64,
}

impl StatusSnapshot {
    const DOCKED: u64 = 1 << 0;
    const SUPERCRUISE: u64 = 1 << 4;

    pub fn is_docked(&self) -> bool {
        self.flags & Self::DOCKED != 0
    }

    pub fn in_supercruise(&self) -> bool {
        self.flags & Self::SUPERCRUISE != 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "camelCase", deserialize = "PascalCase"))]
pub struct MarketSnapshot {
    #[serde(rename(deserialize = "MarketID"))]
    pub market_id: u64,
    #[serde(default)]
    pub station_name: Option<String>,
    #[serde(default)]
    pub star_system: Option<String>,
    #[serde(default)]
    pub items: Vec<MarketItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "camelCase", deserialize = "PascalCase"))]
pub struct MarketItem {
    pub name: String,
    #[serde(rename(deserialize = "Name_Localised"), default)]
    pub name_localised: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub buy_price: i64,
    #[serde(default)]
    pub sell_price: i64,
    #[serde(default)]
    pub stock: u64,
    #[serde(default)]
    pub demand: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "camelCase", deserialize = "PascalCase"))]
pub struct RouteHop {
    pub star_system: String,
    #[serde(default)]
    pub system_address: Option<u64>,
    #[serde(default)]
    pub star_pos: Option<[f64; 3]>,
    #[serde(default)]
    pub star_class: Option<String>,
}
