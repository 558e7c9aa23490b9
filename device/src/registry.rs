//! Process-wide driver registry.
//!
//! The accelerator runtime's platform list is inherently process-global
//! state. It is modelled as an explicit registry with init-once/query
//! semantics: drivers are registered once (by the crate that implements
//! them), and [`platforms`] is the single discovery call. No construction
//! happens behind the caller's back.

use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::driver::Driver;
use crate::error::{NoPlatformFoundSnafu, Result};
use crate::platform::Platform;

pub struct DriverRegistry {
    drivers: RwLock<Vec<Arc<dyn Driver>>>,
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self { drivers: RwLock::new(Vec::new()) }
    }

    /// Register a driver. Registration is idempotent per platform name, so
    /// a driver crate may call this from every entry point that needs the
    /// registry populated.
    pub fn register(&self, driver: Arc<dyn Driver>) {
        let mut drivers = self.drivers.write();

        let name = &driver.platform_info().name;
        if drivers.iter().any(|d| &d.platform_info().name == name) {
            return;
        }

        tracing::debug!(platform = %name, "driver registered");
        drivers.push(driver);
    }

    /// Enumerate registered platforms, in registration order.
    pub fn platforms(&self) -> Result<Vec<Platform>> {
        let drivers = self.drivers.read();
        snafu::ensure!(!drivers.is_empty(), NoPlatformFoundSnafu);

        Ok(drivers.iter().map(|d| Platform::new(Arc::clone(d))).collect())
    }
}

/// Global driver registry instance.
static REGISTRY: Lazy<DriverRegistry> = Lazy::new(DriverRegistry::new);

/// Get the global driver registry.
pub fn registry() -> &'static DriverRegistry {
    &REGISTRY
}

/// Register a driver with the global registry.
pub fn register_driver(driver: Arc<dyn Driver>) {
    registry().register(driver);
}

/// Discover the platforms registered with this process.
pub fn platforms() -> Result<Vec<Platform>> {
    registry().platforms()
}
