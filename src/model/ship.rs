//! Ship, cargo, and materials.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The current ship and its fitted modules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipLoadout {
    pub ship: String,
    pub ship_id: Option<u64>,
    pub ship_name: Option<String>,
    pub ship_ident: Option<String>,
    pub cargo_capacity: u32,
    pub max_jump_range: Option<f64>,
    pub rebuy: Option<i64>,

    /// Fitted modules by slot name.
    pub modules: BTreeMap<String, ShipModule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipModule {
    pub item: String,
    pub health: Option<f64>,
    pub value: Option<i64>,
}

impl ShipModule {
    pub fn new(item: impl Into<String>) -> Self {
        Self {
            item: item.into(),
            health: None,
            value: None,
        }
    }
}

/// Cargo hold contents, per commodity key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CargoSnapshot {
    pub capacity: Option<u32>,
    pub items: BTreeMap<String, u32>,
}

impl CargoSnapshot {
    pub fn total(&self) -> u32 {
        self.items.values().sum()
    }

    pub fn add(&mut self, commodity: &str, count: u32) {
        *self.items.entry(commodity.to_string()).or_insert(0) += count;
    }

    /// Removes up to `count`, dropping the entry when it empties.
    pub fn remove(&mut self, commodity: &str, count: u32) {
        if let Some(held) = self.items.get_mut(commodity) {
            *held = held.saturating_sub(count);
            if *held == 0 {
                self.items.remove(commodity);
            }
        }
    }
}

/// Engineering materials by category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Materials {
    pub raw: BTreeMap<String, u32>,
    pub manufactured: BTreeMap<String, u32>,
    pub encoded: BTreeMap<String, u32>,
}

impl Materials {
    /// The category map for a journal category name (`Raw`, `Manufactured`, `Encoded`).
    pub fn category_mut(&mut self, category: &str) -> Option<&mut BTreeMap<String, u32>> {
        match category.to_ascii_lowercase().as_str() {
            "raw" => Some(&mut self.raw),
            "manufactured" => Some(&mut self.manufactured),
            "encoded" => Some(&mut self.encoded),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cargo_remove_saturates_and_drops_empty() {
        let mut cargo = CargoSnapshot::default();
        cargo.add("painite", 3);
        cargo.remove("painite", 5);
        cargo.remove("gold", 1);

        assert!(cargo.items.is_empty());
        assert_eq!(cargo.total(), 0);
    }

    #[test]
    fn material_categories_are_case_insensitive() {
        let mut materials = Materials::default();
        materials.category_mut("Raw").unwrap().insert("iron".into(), 2);

        assert_eq!(materials.raw["iron"], 2);
        assert!(materials.category_mut("Unknown").is_none());
    }
}
