use harrow_dtype::HostScalar;
use snafu::ensure;

use crate::context::Context;
use crate::driver::DeviceMemory;
use crate::error::{AllocationSnafu, Result, SizeMismatchSnafu};

/// How kernels are allowed to touch a buffer.
///
/// The mode describes the device-side view; read-back to the host is always
/// permitted (write-only output buffers are exactly the ones read back).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessMode {
    ReadOnly,
    WriteOnly,
    #[default]
    ReadWrite,
}

/// A region of device-visible memory owned by a context.
///
/// Created per dataset and reused across invocations. Cloning shares the
/// underlying device memory. Concurrent reads from multiple queues are safe;
/// a write must be ordered against dependent reads by the caller via
/// `Event::wait`; the facade performs no implicit locking.
#[derive(Debug, Clone)]
pub struct Buffer {
    memory: DeviceMemory,
    size: usize,
    access: AccessMode,
}

impl Buffer {
    /// Allocate an uninitialized (zeroed) buffer of `size` bytes.
    pub fn new(context: &Context, size: usize, access: AccessMode) -> Result<Self> {
        ensure!(size > 0, AllocationSnafu { size, reason: "buffer size must be positive" });

        let memory = context.driver().allocate(size)?;
        tracing::debug!(size, ?access, "buffer allocated");

        Ok(Self { memory, size, access })
    }

    /// Allocate a buffer initialized from a host byte mirror.
    pub fn from_host(context: &Context, access: AccessMode, bytes: &[u8]) -> Result<Self> {
        let buffer = Self::new(context, bytes.len(), access)?;
        buffer.memory.write(0, bytes)?;
        Ok(buffer)
    }

    /// Allocate a buffer initialized from a typed host slice.
    pub fn from_slice<T: HostScalar>(context: &Context, access: AccessMode, data: &[T]) -> Result<Self> {
        let elem = T::TYPE.bytes();
        let buffer = Self::new(context, data.len() * elem, access)?;

        let mut bytes = vec![0u8; buffer.size];
        for (chunk, value) in bytes.chunks_exact_mut(elem).zip(data) {
            value.write_le(chunk);
        }
        buffer.memory.write(0, &bytes)?;

        Ok(buffer)
    }

    /// Size in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn access(&self) -> AccessMode {
        self.access
    }

    /// Number of `T` elements the buffer holds.
    pub fn len_as<T: HostScalar>(&self) -> usize {
        self.size / T::TYPE.bytes()
    }

    /// Copy host bytes into the buffer, immediately and in full.
    ///
    /// This is the initialization path; ordered refresh during a command
    /// stream goes through `CommandQueue::enqueue_write`.
    pub fn copyin(&self, src: &[u8]) -> Result<()> {
        ensure!(src.len() == self.size, SizeMismatchSnafu { expected: self.size, actual: src.len() });
        self.memory.write(0, src)
    }

    /// Copy the buffer contents out to host bytes, immediately and in full.
    pub fn copyout(&self, dst: &mut [u8]) -> Result<()> {
        ensure!(dst.len() == self.size, SizeMismatchSnafu { expected: self.size, actual: dst.len() });
        self.memory.read(0, dst)
    }

    /// Read the whole buffer as a typed host vector.
    pub fn read_as<T: HostScalar>(&self) -> Result<Vec<T>> {
        let mut bytes = vec![0u8; self.size];
        self.memory.read(0, &mut bytes)?;

        let elem = T::TYPE.bytes();
        Ok(bytes.chunks_exact(elem).map(T::read_le).collect())
    }

    /// The driver-facing memory handle. Kernel argument binding passes this
    /// to the driver; typical callers never need it.
    pub fn memory(&self) -> &DeviceMemory {
        &self.memory
    }
}
