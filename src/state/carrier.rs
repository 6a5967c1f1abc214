//! Fleet carrier: identity, fuel, jumps, orders, and commodity stock.
//!
//! The first carrier event establishes which carrier is tracked. Events for
//! any other carrier ID are ignored. Market activity only touches carrier
//! stock when it happens at the carrier's own market, whose market ID is the
//! carrier ID.

use jiff::Timestamp;
use tracing::{debug, info, warn};

use crate::{
    event::{JournalEvent, parse_timestamp, shapes},
    model::{DockedInfo, FleetCarrierState, PendingJump, TradeOrder},
    notify::{Bus, Notification},
    storage::Storage,
};

use super::Result;

pub struct CarrierTracker {
    bus: Bus,
    storage: Option<Storage>,
    carrier: Option<FleetCarrierState>,
}

impl CarrierTracker {
    /// Resumes from the saved carrier state when `storage` has one.
    pub fn new(bus: Bus, storage: Option<Storage>) -> Self {
        let carrier = storage.as_ref().and_then(|s| {
            s.load_carrier().unwrap_or_else(|e| {
                warn!(error = %e, "could not load saved carrier state");
                None
            })
        });
        Self {
            bus,
            storage,
            carrier,
        }
    }

    pub fn carrier(&self) -> Option<&FleetCarrierState> {
        self.carrier.as_ref()
    }

    /// Applies a carrier event. `docked` is where the player is docked, if
    /// anywhere.
    pub fn handle(&mut self, event: &JournalEvent, docked: Option<&DockedInfo>) -> Result<()> {
        let at = event.timestamp();
        match event.name() {
            "CarrierStats" => {
                let stats: shapes::CarrierStats = event.materialize()?;
                let Some(carrier) = self.tracked(stats.carrier_id, at, true) else {
                    return Ok(());
                };
                carrier.callsign = stats.callsign.or(carrier.callsign.take());
                carrier.name = stats.name.or(carrier.name.take());
                carrier.fuel = stats.fuel_level;
                if let Some(finance) = stats.finance {
                    carrier.balance = Some(finance.carrier_balance);
                }
            }
            "CarrierJumpRequest" => {
                let request: shapes::CarrierJumpRequest = event.materialize()?;
                let Some(carrier) = self.tracked(request.carrier_id, at, true) else {
                    return Ok(());
                };
                carrier.pending_jump = Some(PendingJump {
                    destination: request.system_name,
                    body: request.body,
                    departure: request.departure_time.as_deref().and_then(parse_timestamp),
                    requested_at: at,
                });
            }
            "CarrierJumpCancelled" => {
                let Some(carrier) = event.carrier_id().and_then(|id| self.tracked(id, at, true)) else {
                    return Ok(());
                };
                carrier.pending_jump = None;
            }
            "CarrierJump" => {
                let jump: shapes::CarrierJump = event.materialize()?;
                let Some(carrier) = jump.market_id.and_then(|id| self.tracked(id, at, false)) else {
                    return Ok(());
                };
                info!(system = %jump.star_system, "carrier arrived");
                carrier.star_system = Some(jump.star_system);
                carrier.pending_jump = None;
            }
            "CarrierDepositFuel" => {
                let deposit: shapes::CarrierDepositFuel = event.materialize()?;
                let Some(carrier) = self.tracked(deposit.carrier_id, at, true) else {
                    return Ok(());
                };
                carrier.fuel = deposit.total;
            }
            "CarrierTradeOrder" => {
                let order: shapes::CarrierTradeOrder = event.materialize()?;
                let Some(carrier) = self.tracked(order.carrier_id, at, true) else {
                    return Ok(());
                };
                let key = shapes::commodity_key(&order.commodity);
                if order.cancel_trade {
                    carrier.orders.remove(&key);
                } else if let Some(quantity) = order.purchase_order {
                    carrier.orders.insert(key, TradeOrder::Purchase { quantity, price: order.price });
                } else if let Some(quantity) = order.sale_order {
                    carrier.orders.insert(key, TradeOrder::Sale { quantity, price: order.price });
                }
            }
            "CargoTransfer" => {
                let Some(carrier) = self.docked_at_carrier(docked, at) else {
                    return Ok(());
                };
                let transfer: shapes::CargoTransfer = event.materialize()?;
                for item in transfer.transfers {
                    let delta = i64::from(item.count);
                    match item.direction.as_str() {
                        "tocarrier" => carrier.adjust_stock(&shapes::commodity_key(&item.kind), delta),
                        "toship" => carrier.adjust_stock(&shapes::commodity_key(&item.kind), -delta),
                        other => debug!(direction = other, "ignoring cargo transfer direction"),
                    }
                }
            }
            "MarketBuy" => {
                // Most trades happen at stations; skip those before materializing.
                let Some(carrier) = event.market_id().and_then(|id| self.at_carrier_market(id, at)) else {
                    return Ok(());
                };
                let buy: shapes::MarketBuy = event.materialize()?;
                carrier.adjust_stock(&shapes::commodity_key(&buy.kind), -i64::from(buy.count));
            }
            "MarketSell" => {
                let Some(carrier) = event.market_id().and_then(|id| self.at_carrier_market(id, at)) else {
                    return Ok(());
                };
                let sell: shapes::MarketSell = event.materialize()?;
                carrier.adjust_stock(&shapes::commodity_key(&sell.kind), i64::from(sell.count));
            }
            other => {
                debug!(event = other, "not a carrier event");
                return Ok(());
            }
        }
        self.commit(at)
    }

    /// The tracked carrier, if `carrier_id` matches it.
    ///
    /// With no carrier tracked yet, `establish` adopts this one.
    fn tracked(
        &mut self,
        carrier_id: u64,
        at: Timestamp,
        establish: bool,
    ) -> Option<&mut FleetCarrierState> {
        match self.carrier.as_ref().map(|c| c.carrier_id) {
            Some(tracked) if tracked != carrier_id => {
                debug!(carrier_id, tracked, "event is for another carrier; ignoring");
                None
            }
            Some(_) => self.carrier.as_mut(),
            None if establish => {
                info!(carrier_id, "tracking fleet carrier");
                Some(self.carrier.insert(FleetCarrierState::new(carrier_id, at)))
            }
            None => None,
        }
    }

    fn docked_at_carrier(
        &mut self,
        docked: Option<&DockedInfo>,
        at: Timestamp,
    ) -> Option<&mut FleetCarrierState> {
        let market_id = docked.and_then(|d| d.market_id)?;
        self.at_carrier_market(market_id, at)
    }

    /// The tracked carrier, if `market_id` is its market. Never establishes.
    fn at_carrier_market(&mut self, market_id: u64, at: Timestamp) -> Option<&mut FleetCarrierState> {
        if self.carrier.as_ref()?.carrier_id != market_id {
            return None;
        }
        self.tracked(market_id, at, false)
    }

    fn commit(&mut self, at: Timestamp) -> Result<()> {
        let Some(carrier) = self.carrier.as_mut() else {
            return Ok(());
        };
        carrier.updated_at = carrier.updated_at.max(at);
        if let Some(storage) = &self.storage {
            storage.save_carrier(carrier)?;
        }
        self.bus
            .publish(&Notification::CarrierUpdated(Box::new(carrier.clone())));
        Ok(())
    }
}
