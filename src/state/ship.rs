//! The commander's ship: credits, loadout, cargo hold, materials, dock state.

use std::collections::BTreeMap;

use tracing::debug;

use crate::{
    event::{JournalEvent, shapes},
    model::{CargoSnapshot, DockedInfo, Materials, ShipLoadout, ShipModule},
    notify::{Bus, Notification},
};

use super::Result;

pub struct ShipTracker {
    bus: Bus,
    commander: Option<String>,
    balance: Option<i64>,
    loadout: Option<ShipLoadout>,
    cargo: CargoSnapshot,
    materials: Materials,
    docked: Option<DockedInfo>,
}

/// What a handled event changed, so each notification goes out once.
#[derive(Default)]
struct Changes {
    balance: bool,
    loadout: bool,
    cargo: bool,
    materials: bool,
}

impl ShipTracker {
    pub fn new(bus: Bus) -> Self {
        Self {
            bus,
            commander: None,
            balance: None,
            loadout: None,
            cargo: CargoSnapshot::default(),
            materials: Materials::default(),
            docked: None,
        }
    }

    pub fn commander(&self) -> Option<&str> {
        self.commander.as_deref()
    }

    pub fn balance(&self) -> Option<i64> {
        self.balance
    }

    pub fn loadout(&self) -> Option<&ShipLoadout> {
        self.loadout.as_ref()
    }

    pub fn cargo(&self) -> &CargoSnapshot {
        &self.cargo
    }

    pub fn docked(&self) -> Option<&DockedInfo> {
        self.docked.as_ref()
    }

    /// Applies the dock state carried by a `Location` or `CarrierJump`
    /// event. Publishes `Docked` when `publish` is set.
    pub fn dock_on_load(&mut self, event: &JournalEvent, publish: bool) -> Result<()> {
        let (docked, info) = if event.name() == "CarrierJump" {
            let jump: shapes::CarrierJump = event.materialize()?;
            (
                jump.docked,
                jump.station_name.map(|station_name| DockedInfo {
                    station_name,
                    station_type: jump.station_type,
                    star_system: Some(jump.star_system),
                    system_address: Some(jump.system_address),
                    market_id: jump.market_id,
                }),
            )
        } else {
            let location: shapes::Location = event.materialize()?;
            (
                location.docked,
                location.station_name.map(|station_name| DockedInfo {
                    station_name,
                    station_type: location.station_type,
                    star_system: Some(location.star_system),
                    system_address: Some(location.system_address),
                    market_id: location.market_id,
                }),
            )
        };

        match info.filter(|_| docked) {
            Some(info) => {
                if publish {
                    self.bus.publish(&Notification::Docked(info.clone()));
                }
                self.docked = Some(info);
            }
            None => self.docked = None,
        }
        Ok(())
    }

    pub fn handle(&mut self, event: &JournalEvent) -> Result<()> {
        let mut changes = Changes::default();
        match event.name() {
            "LoadGame" => {
                let load: shapes::LoadGame = event.materialize()?;
                self.commander = Some(load.commander);
                changes.balance = self.set_balance(load.credits);
            }
            "Commander" => {
                let commander: shapes::Commander = event.materialize()?;
                self.commander = Some(commander.name);
            }
            "Loadout" => {
                let loadout: shapes::Loadout = event.materialize()?;
                self.cargo.capacity = Some(loadout.cargo_capacity);
                self.loadout = Some(ShipLoadout {
                    ship: loadout.ship,
                    ship_id: loadout.ship_id,
                    ship_name: loadout.ship_name,
                    ship_ident: loadout.ship_ident,
                    cargo_capacity: loadout.cargo_capacity,
                    max_jump_range: loadout.max_jump_range,
                    rebuy: loadout.rebuy,
                    modules: loadout
                        .modules
                        .into_iter()
                        .map(|m| {
                            let module = ShipModule {
                                item: m.item,
                                health: m.health,
                                value: m.value,
                            };
                            (m.slot, module)
                        })
                        .collect(),
                });
                changes.loadout = true;
            }
            "ModuleBuy" => {
                let buy: shapes::ModuleBuy = event.materialize()?;
                changes.balance = self.adjust_balance(buy.sell_price.unwrap_or(0) - buy.buy_price);
                changes.loadout = self.fit(buy.slot, Some(buy.buy_item));
            }
            "ModuleSell" => {
                let sell: shapes::ModuleSell = event.materialize()?;
                changes.balance = self.adjust_balance(sell.sell_price);
                changes.loadout = self.fit(sell.slot, None);
            }
            "ModuleStore" => {
                let store: shapes::ModuleStore = event.materialize()?;
                changes.loadout = self.fit(store.slot, store.replacement_item);
            }
            "ModuleRetrieve" => {
                let retrieve: shapes::ModuleRetrieve = event.materialize()?;
                changes.loadout = self.fit(retrieve.slot, Some(retrieve.retrieved_item));
            }
            "ModuleSwap" => {
                let swap: shapes::ModuleSwap = event.materialize()?;
                if let Some(loadout) = self.loadout.as_mut() {
                    let from = loadout.modules.remove(&swap.from_slot);
                    let to = loadout.modules.remove(&swap.to_slot);
                    if let Some(module) = from {
                        loadout.modules.insert(swap.to_slot, module);
                    }
                    if let Some(module) = to {
                        loadout.modules.insert(swap.from_slot, module);
                    }
                    changes.loadout = true;
                }
            }
            "RefuelAll" => {
                let refuel: shapes::RefuelAll = event.materialize()?;
                changes.balance = self.adjust_balance(-refuel.cost);
            }
            "Repair" => {
                let repair: shapes::Repair = event.materialize()?;
                changes.balance = self.adjust_balance(-repair.cost);
            }
            "BuyDrones" => {
                let buy: shapes::BuyDrones = event.materialize()?;
                changes.balance = self.adjust_balance(-buy.total_cost);
                self.cargo.add("drones", buy.count);
                changes.cargo = true;
            }
            "SellDrones" => {
                let sell: shapes::SellDrones = event.materialize()?;
                changes.balance = self.adjust_balance(sell.total_sale);
                self.cargo.remove("drones", sell.count);
                changes.cargo = true;
            }
            "RedeemVoucher" => {
                let voucher: shapes::RedeemVoucher = event.materialize()?;
                changes.balance = self.adjust_balance(voucher.amount);
            }
            "MarketBuy" => {
                let buy: shapes::MarketBuy = event.materialize()?;
                changes.balance = self.adjust_balance(-buy.total_cost);
                self.cargo.add(&shapes::commodity_key(&buy.kind), buy.count);
                changes.cargo = true;
            }
            "MarketSell" => {
                let sell: shapes::MarketSell = event.materialize()?;
                changes.balance = self.adjust_balance(sell.total_sale);
                self.cargo.remove(&shapes::commodity_key(&sell.kind), sell.count);
                changes.cargo = true;
            }
            "Cargo" => {
                let cargo: shapes::Cargo = event.materialize()?;
                if cargo.vessel.as_deref().is_some_and(|v| v != "Ship") {
                    return Ok(());
                }
                // Newer game versions leave the inventory to Cargo.json.
                let Some(inventory) = cargo.inventory else {
                    return Ok(());
                };
                self.cargo.items.clear();
                for item in inventory {
                    self.cargo.add(&shapes::commodity_key(&item.name), item.count);
                }
                changes.cargo = true;
            }
            "CollectCargo" | "MiningRefined" => {
                let kind = event.str_field("Type").unwrap_or_default();
                self.cargo.add(&shapes::commodity_key(kind), 1);
                changes.cargo = true;
            }
            "EjectCargo" => {
                let eject: shapes::EjectCargo = event.materialize()?;
                self.cargo.remove(&shapes::commodity_key(&eject.kind), eject.count);
                changes.cargo = true;
            }
            "CargoTransfer" => {
                let transfer: shapes::CargoTransfer = event.materialize()?;
                for item in transfer.transfers {
                    let key = shapes::commodity_key(&item.kind);
                    match item.direction.as_str() {
                        "toship" => self.cargo.add(&key, item.count),
                        _ => self.cargo.remove(&key, item.count),
                    }
                }
                changes.cargo = true;
            }
            "Materials" => {
                let materials: shapes::Materials = event.materialize()?;
                let collect = |counts: Vec<shapes::MaterialCount>| -> BTreeMap<String, u32> {
                    counts
                        .into_iter()
                        .map(|m| (m.name.to_ascii_lowercase(), m.count))
                        .collect()
                };
                self.materials = Materials {
                    raw: collect(materials.raw),
                    manufactured: collect(materials.manufactured),
                    encoded: collect(materials.encoded),
                };
                changes.materials = true;
            }
            "MaterialCollected" | "MaterialDiscarded" => {
                let change: shapes::MaterialChange = event.materialize()?;
                let Some(category) = self.materials.category_mut(&change.category) else {
                    debug!(category = %change.category, "unknown material category");
                    return Ok(());
                };
                let held = category.entry(change.name.to_ascii_lowercase()).or_insert(0);
                if event.name() == "MaterialCollected" {
                    *held += change.count;
                } else {
                    *held = held.saturating_sub(change.count);
                }
                changes.materials = true;
            }
            "Docked" => {
                let docked: shapes::Docked = event.materialize()?;
                let info = DockedInfo {
                    station_name: docked.station_name,
                    station_type: docked.station_type,
                    star_system: docked.star_system,
                    system_address: docked.system_address,
                    market_id: docked.market_id,
                };
                self.bus.publish(&Notification::Docked(info.clone()));
                self.docked = Some(info);
            }
            "Undocked" => {
                let undocked: shapes::Undocked = event.materialize()?;
                let station_name = undocked
                    .station_name
                    .or_else(|| self.docked.take().map(|d| d.station_name));
                self.docked = None;
                self.bus.publish(&Notification::Undocked { station_name });
            }
            other => debug!(event = other, "not a ship event"),
        }
        self.publish(&changes);
        Ok(())
    }

    fn publish(&self, changes: &Changes) {
        if changes.balance {
            if let Some(balance) = self.balance {
                self.bus.publish(&Notification::BalanceChanged { balance });
            }
        }
        if changes.loadout {
            if let Some(loadout) = &self.loadout {
                self.bus.publish(&Notification::LoadoutChanged(loadout.clone()));
            }
        }
        if changes.cargo {
            self.bus.publish(&Notification::CargoProcessed(self.cargo.clone()));
        }
        if changes.materials {
            self.bus
                .publish(&Notification::MaterialsChanged(self.materials.clone()));
        }
    }

    fn set_balance(&mut self, balance: i64) -> bool {
        let changed = self.balance != Some(balance);
        self.balance = Some(balance);
        changed
    }

    /// Applies a credit delta. Unknown until the first `LoadGame`.
    fn adjust_balance(&mut self, delta: i64) -> bool {
        match self.balance.as_mut() {
            Some(balance) if delta != 0 => {
                *balance = balance.saturating_add(delta);
                true
            }
            _ => false,
        }
    }

    /// Puts `item` in `slot`, or empties it.
    fn fit(&mut self, slot: String, item: Option<String>) -> bool {
        let Some(loadout) = self.loadout.as_mut() else {
            return false;
        };
        match item {
            Some(item) => loadout.modules.insert(slot, ShipModule::new(item)),
            None => loadout.modules.remove(&slot),
        };
        true
    }
}
