//! Fleet carrier state file.

use crate::model::FleetCarrierState;

use super::{Result, Storage};

const CARRIER_FILE: &str = "carrier.json";

impl Storage {
    pub fn save_carrier(&self, carrier: &FleetCarrierState) -> Result<()> {
        self.write_json_atomic(CARRIER_FILE, carrier)
    }

    /// Loads the last saved carrier, if there is one.
    pub fn load_carrier(&self) -> Result<Option<FleetCarrierState>> {
        self.read_json(CARRIER_FILE)
    }
}
