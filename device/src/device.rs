use std::sync::Arc;

use crate::driver::Driver;

/// Broad classification of a compute unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceType {
    Cpu,
    Gpu,
    Accelerator,
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cpu => f.write_str("CPU"),
            Self::Gpu => f.write_str("GPU"),
            Self::Accelerator => f.write_str("Accelerator"),
        }
    }
}

/// Attributes of one device, as reported by its driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub vendor: String,
    pub device_type: DeviceType,
    pub compute_units: u32,
    /// Largest allowed work-group volume (product of local extents).
    pub max_work_group_size: usize,
    pub local_mem_size: u64,
    pub global_mem_size: u64,
}

/// An individually addressable compute unit belonging to a platform.
///
/// Referenced, not owned, by contexts and queues; cloning shares the driver
/// handle.
#[derive(Debug, Clone)]
pub struct Device {
    info: DeviceInfo,
    driver: Arc<dyn Driver>,
}

impl Device {
    pub(crate) fn new(info: DeviceInfo, driver: Arc<dyn Driver>) -> Self {
        Self { info, driver }
    }

    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn device_type(&self) -> DeviceType {
        self.info.device_type
    }

    /// Whether both devices come from the same driver stack.
    pub fn same_platform(&self, other: &Device) -> bool {
        Arc::ptr_eq(&self.driver, &other.driver)
    }

    pub(crate) fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }
}

impl PartialEq for Device {
    fn eq(&self, other: &Self) -> bool {
        self.same_platform(other) && self.info == other.info
    }
}
