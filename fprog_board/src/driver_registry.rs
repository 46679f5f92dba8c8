//! Driver registry for board drivers.
//!
//! Built at startup, populated via `register()`, and consulted once by
//! board init. No global state.

use std::collections::HashMap;

use fprog_cmt::fatal;

use crate::driver::{BoardDriver, BoardError, DriverFactory};

/// Registry of available board drivers.
pub struct DriverRegistry {
    factories: HashMap<&'static str, DriverFactory>,
}

impl DriverRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry holding every built-in driver.
    pub fn with_builtin_drivers() -> Self {
        let mut reg = Self::new();
        crate::drivers::register_all_drivers(&mut reg);
        reg
    }

    /// Register a driver factory. Registering a name twice halts.
    pub fn register(&mut self, name: &'static str, factory: DriverFactory) {
        if self.factories.insert(name, factory).is_some() {
            fatal!("board driver '{name}' is already registered");
        }
    }

    /// Get a driver factory by name.
    pub fn get_factory(&self, name: &str) -> Option<DriverFactory> {
        self.factories.get(name).copied()
    }

    /// Create a driver instance by name.
    ///
    /// # Errors
    /// Returns `BoardError::DriverNotFound` if no driver with the given name is registered.
    pub fn create_driver(&self, name: &str) -> Result<Box<dyn BoardDriver>, BoardError> {
        let factory = self
            .get_factory(name)
            .ok_or_else(|| BoardError::DriverNotFound(name.to_string()))?;
        Ok(factory())
    }

    /// List all registered driver names.
    pub fn list_drivers(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::new()
    }
}
