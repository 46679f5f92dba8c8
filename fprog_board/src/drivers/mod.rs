//! Board driver implementations.
//!
//! - [`simulation`] - Software model of the programmer board and a
//!   parallel EEPROM/flash device

pub mod simulation;

use crate::driver_registry::DriverRegistry;

/// Register all built-in drivers.
pub fn register_all_drivers(registry: &mut DriverRegistry) {
    registry.register("simulation", simulation::create_driver);
}
