use std::sync::Arc;

use crate::device::Device;
use crate::driver::{CompileOutcome, Driver};
use crate::error::{ContextCreationSnafu, Result};

/// A group of devices from one platform sharing programs, buffers, and
/// queues.
///
/// Created once per session and reused across invocations; everything
/// created against it holds a clone of the driver handle, so dropping the
/// context does not invalidate live buffers or queues.
#[derive(Debug, Clone)]
pub struct Context {
    driver: Arc<dyn Driver>,
    devices: Vec<Device>,
}

impl Context {
    /// Build a context over `devices`.
    ///
    /// Fails with [`crate::Error::ContextCreation`] when the set is empty or
    /// the devices span more than one platform.
    pub fn new(devices: &[Device]) -> Result<Self> {
        let Some(first) = devices.first() else {
            return ContextCreationSnafu { reason: "device set is empty" }.fail();
        };

        if let Some(stray) = devices.iter().find(|d| !d.same_platform(first)) {
            return ContextCreationSnafu {
                reason: format!(
                    "devices span incompatible platforms ('{}' vs '{}')",
                    first.name(),
                    stray.name()
                ),
            }
            .fail();
        }

        Ok(Self { driver: Arc::clone(first.driver()), devices: devices.to_vec() })
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    /// Whether `device` is one of the devices this context was built over.
    pub fn contains(&self, device: &Device) -> bool {
        self.devices.iter().any(|d| d == device)
    }

    /// Compile kernel source for all devices bound to this context.
    ///
    /// Synchronous; the outcome is tagged so the failure path (with its
    /// diagnostic log) cannot be ignored by accident.
    pub fn compile(&self, source: &str) -> CompileOutcome {
        let infos: Vec<_> = self.devices.iter().map(|d| d.info().clone()).collect();
        self.driver.compile(source, &infos)
    }

    pub(crate) fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }
}
