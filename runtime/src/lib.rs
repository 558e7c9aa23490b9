//! Kernel dispatch for the harrow runtime.
//!
//! This crate owns the program/kernel half of the stack: compiling kernel
//! source against a context (with the driver's diagnostic log surfaced
//! verbatim on failure), extracting typed entry points, validating argument
//! bindings, and submitting bounded-grid executions to command queues. The
//! built-in [`host`] driver makes the whole path run in-process.
//!
//! ```
//! use harrow_runtime::{Arg, Extent, Program};
//! use harrow_runtime::device::{AccessMode, Buffer, CommandQueue, Context, QueueOptions};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let platform = harrow_runtime::platforms()?.remove(0);
//! let devices = platform.devices()?;
//! let context = Context::new(&devices)?;
//! let queue = CommandQueue::new(&context, &devices[0], QueueOptions::default())?;
//!
//! let program = Program::build(
//!     &context,
//!     "__kernel void scale(float k, __global float* data) {
//!          int i = get_global_id(0);
//!          data[i] = data[i] * k;
//!      }",
//! )?;
//!
//! let data: Vec<f32> = (1..=100).map(|i| i as f32).collect();
//! let buffer = Buffer::from_slice(&context, AccessMode::ReadWrite, &data)?;
//!
//! let kernel = program.kernel("scale")?;
//! kernel
//!     .enqueue(&queue, Extent::d1(100), Extent::d1(25), &[Arg::scalar(5.0f32), Arg::Buffer(&buffer)])?
//!     .wait()?;
//!
//! let result = queue.enqueue_read(&buffer).wait()?;
//! assert_eq!(result.len(), 100 * 4);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod host;
pub mod kernel;
pub mod launch;
pub mod program;


pub use error::{Error, Result};
pub use kernel::{Arg, Kernel, LocalScratch};
pub use launch::Extent;
pub use program::{BuildOutcome, Program};

/// The device-side API, re-exported for convenience.
pub use harrow_device as device;

use harrow_device::Platform;

/// Discover the platforms available to this process.
///
/// Registers the built-in [`host`] driver first, so there is always at least
/// one platform; external drivers registered earlier via
/// [`harrow_device::register_driver`] are listed ahead of it in
/// registration order.
pub fn platforms() -> harrow_device::Result<Vec<Platform>> {
    host::register();
    harrow_device::platforms()
}
