//! Device-side half of the harrow dispatch runtime: platform discovery,
//! contexts, buffers, command queues, and completion events.
//!
//! Drivers (the platform implementations) plug in through the traits in
//! [`driver`] and register themselves with the process-wide [`registry`].
//! Program compilation and kernel invocation live in `harrow-runtime`, which
//! also ships the built-in host driver.

pub mod buffer;
pub mod context;
pub mod device;
pub mod driver;
pub mod error;
pub mod event;
pub mod platform;
pub mod queue;
pub mod registry;

#[cfg(test)]
pub mod test;

pub use buffer::{AccessMode, Buffer};
pub use context::Context;
pub use device::{Device, DeviceInfo, DeviceType};
pub use driver::{
    BoundArg, CompileOutcome, DeviceMemory, Driver, KernelParam, KernelSignature, LaunchRequest,
    MemoryRegion, ParamKind, ProgramHandle,
};
pub use error::{Error, Result};
pub use event::{CommandProfile, Event};
pub use platform::{Platform, PlatformInfo};
pub use queue::{CommandQueue, QueueOptions};
pub use registry::{platforms, register_driver, registry};
