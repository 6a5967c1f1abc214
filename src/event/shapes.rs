//! Typed event shapes.
//!
//! One struct per journal event the trackers read in full. Fields follow the
//! journal's PascalCase names; everything a game version might omit is an
//! `Option` or defaulted, and unknown fields are ignored so new game versions
//! don't break materialization.

use serde::Deserialize;

/// Normalizes a commodity name to the key used by cargo and carrier ledgers.
///
/// The journal spells the same commodity as `painite`, `Painite`, or
/// `$painite_name;` depending on the event.
pub fn commodity_key(raw: &str) -> String {
    let trimmed = raw.trim().trim_start_matches('$');
    let lower = trimmed.to_ascii_lowercase();
    lower
        .strip_suffix("_name;")
        .map_or_else(|| lower.clone(), str::to_string)
}

// ── Session ──

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LoadGame {
    pub commander: String,
    #[serde(default)]
    pub credits: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Commander {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Music {
    pub music_track: String,
}

// ── Travel ──

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Location {
    pub star_system: String,
    pub system_address: u64,
    #[serde(default)]
    pub docked: bool,
    #[serde(default)]
    pub station_name: Option<String>,
    #[serde(default)]
    pub station_type: Option<String>,
    #[serde(rename = "MarketID", default)]
    pub market_id: Option<u64>,
}

/// The player rode their docked carrier to a new system.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CarrierJump {
    pub star_system: String,
    pub system_address: u64,
    #[serde(default)]
    pub docked: bool,
    #[serde(default)]
    pub station_name: Option<String>,
    #[serde(default)]
    pub station_type: Option<String>,
    #[serde(rename = "MarketID", default)]
    pub market_id: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SupercruiseExit {
    #[serde(default)]
    pub star_system: Option<String>,
    #[serde(default)]
    pub system_address: Option<u64>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub body_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Docked {
    pub station_name: String,
    #[serde(default)]
    pub station_type: Option<String>,
    #[serde(default)]
    pub star_system: Option<String>,
    #[serde(default)]
    pub system_address: Option<u64>,
    #[serde(rename = "MarketID", default)]
    pub market_id: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Undocked {
    #[serde(default)]
    pub station_name: Option<String>,
}

// ── Ship ──

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Loadout {
    pub ship: String,
    #[serde(rename = "ShipID", default)]
    pub ship_id: Option<u64>,
    #[serde(default)]
    pub ship_name: Option<String>,
    #[serde(default)]
    pub ship_ident: Option<String>,
    #[serde(default)]
    pub rebuy: Option<i64>,
    #[serde(default)]
    pub cargo_capacity: u32,
    #[serde(default)]
    pub max_jump_range: Option<f64>,
    #[serde(default)]
    pub modules: Vec<LoadoutModule>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LoadoutModule {
    pub slot: String,
    pub item: String,
    #[serde(default)]
    pub health: Option<f64>,
    #[serde(default)]
    pub value: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModuleBuy {
    pub slot: String,
    pub buy_item: String,
    #[serde(default)]
    pub buy_price: i64,
    /// Set when the purchase replaced a module that was sold.
    #[serde(default)]
    pub sell_price: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModuleSell {
    pub slot: String,
    #[serde(default)]
    pub sell_price: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModuleStore {
    pub slot: String,
    #[serde(default)]
    pub replacement_item: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModuleRetrieve {
    pub slot: String,
    pub retrieved_item: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModuleSwap {
    pub from_slot: String,
    pub to_slot: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RefuelAll {
    #[serde(default)]
    pub cost: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Repair {
    #[serde(default)]
    pub cost: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BuyDrones {
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub total_cost: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SellDrones {
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub total_sale: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RedeemVoucher {
    #[serde(default)]
    pub amount: i64,
}

// ── Cargo and materials ──

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Cargo {
    #[serde(default)]
    pub vessel: Option<String>,
    /// Absent in journal lines that defer to `Cargo.json`.
    #[serde(default)]
    pub inventory: Option<Vec<CargoItem>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CargoItem {
    pub name: String,
    pub count: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CollectCargo {
    #[serde(rename = "Type")]
    pub kind: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EjectCargo {
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(default = "one")]
    pub count: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MarketBuy {
    #[serde(rename = "Type")]
    pub kind: String,
    pub count: u32,
    #[serde(default)]
    pub total_cost: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MarketSell {
    #[serde(rename = "Type")]
    pub kind: String,
    pub count: u32,
    #[serde(default)]
    pub total_sale: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CargoTransfer {
    #[serde(default)]
    pub transfers: Vec<Transfer>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Transfer {
    #[serde(rename = "Type")]
    pub kind: String,
    pub count: u32,
    /// `tocarrier`, `toship`, or `tosrv`.
    pub direction: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Materials {
    #[serde(default)]
    pub raw: Vec<MaterialCount>,
    #[serde(default)]
    pub manufactured: Vec<MaterialCount>,
    #[serde(default)]
    pub encoded: Vec<MaterialCount>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MaterialCount {
    pub name: String,
    pub count: u32,
}

/// `MaterialCollected` and `MaterialDiscarded` share a shape.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MaterialChange {
    pub category: String,
    pub name: String,
    #[serde(default = "one")]
    pub count: u32,
}

// ── Mining ──

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MiningRefined {
    #[serde(rename = "Type")]
    pub kind: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProspectedAsteroid {
    #[serde(default)]
    pub materials: Vec<ProspectedMaterial>,
    /// `$AsteroidMaterialContent_High;` and friends.
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub motherlode_material: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProspectedMaterial {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LaunchDrone {
    #[serde(rename = "Type")]
    pub kind: String,
}

// ── Exploration ──

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Scan {
    pub body_name: String,
    #[serde(rename = "BodyID")]
    pub body_id: u32,
    #[serde(rename = "DistanceFromArrivalLS", default)]
    pub distance_from_arrival_ls: f64,
    #[serde(default)]
    pub star_type: Option<String>,
    #[serde(default)]
    pub planet_class: Option<String>,
    #[serde(default)]
    pub landable: bool,
    #[serde(default)]
    pub was_discovered: bool,
    #[serde(default)]
    pub was_mapped: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FssDiscoveryScan {
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub body_count: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FssAllBodiesFound {
    #[serde(default)]
    pub count: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SaaScanComplete {
    pub body_name: String,
    #[serde(rename = "BodyID")]
    pub body_id: u32,
}

/// `FSSBodySignals` and `SAASignalsFound` share a shape.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BodySignals {
    pub body_name: String,
    #[serde(rename = "BodyID")]
    pub body_id: u32,
    #[serde(default)]
    pub signals: Vec<Signal>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Signal {
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(rename = "Type_Localised", default)]
    pub kind_localised: Option<String>,
    pub count: u32,
}

// ── Fleet carrier ──

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CarrierStats {
    #[serde(rename = "CarrierID")]
    pub carrier_id: u64,
    #[serde(default)]
    pub callsign: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub fuel_level: u32,
    #[serde(default)]
    pub finance: Option<CarrierFinance>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CarrierFinance {
    #[serde(default)]
    pub carrier_balance: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CarrierJumpRequest {
    #[serde(rename = "CarrierID")]
    pub carrier_id: u64,
    pub system_name: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub departure_time: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CarrierDepositFuel {
    #[serde(rename = "CarrierID")]
    pub carrier_id: u64,
    /// Tritium in the depot after the deposit.
    #[serde(default)]
    pub total: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CarrierTradeOrder {
    #[serde(rename = "CarrierID")]
    pub carrier_id: u64,
    pub commodity: String,
    #[serde(default)]
    pub purchase_order: Option<u32>,
    #[serde(default)]
    pub sale_order: Option<u32>,
    #[serde(default)]
    pub cancel_trade: bool,
    #[serde(default)]
    pub price: Option<i64>,
}

const fn one() -> u32 {
    1
}
