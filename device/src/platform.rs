use std::sync::Arc;

use crate::device::Device;
use crate::driver::Driver;
use crate::error::{NoDeviceFoundSnafu, Result};

/// Identifying attributes of a platform, as reported by its driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformInfo {
    pub name: String,
    pub vendor: String,
    pub version: String,
}

/// A vendor driver stack exposing one or more devices.
///
/// Platforms are discovered through [`crate::registry::platforms`], never
/// constructed. Cloning is cheap (a shared driver handle).
#[derive(Debug, Clone)]
pub struct Platform {
    driver: Arc<dyn Driver>,
}

impl Platform {
    pub(crate) fn new(driver: Arc<dyn Driver>) -> Self {
        Self { driver }
    }

    pub fn info(&self) -> &PlatformInfo {
        self.driver.platform_info()
    }

    pub fn name(&self) -> &str {
        &self.info().name
    }

    pub fn vendor(&self) -> &str {
        &self.info().vendor
    }

    /// Enumerate this platform's devices.
    ///
    /// Fails with [`crate::Error::NoDeviceFound`] when the driver reports an
    /// empty device list.
    pub fn devices(&self) -> Result<Vec<Device>> {
        let infos = self.driver.devices();
        snafu::ensure!(!infos.is_empty(), NoDeviceFoundSnafu { platform: self.name() });

        Ok(infos.into_iter().map(|info| Device::new(info, Arc::clone(&self.driver))).collect())
    }

    pub(crate) fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }
}
