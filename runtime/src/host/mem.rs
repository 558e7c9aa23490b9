//! Byte-addressed host memory backing the host driver's buffers.
//!
//! Storage is a slice of atomic bytes: kernels executing on several work-item
//! threads may touch the same region concurrently, and per-byte atomics keep
//! that well-defined on the runtime side. A racy kernel observes torn values,
//! exactly as it would on a real device, but never corrupts the process.

use std::any::Any;
use std::sync::atomic::{AtomicU8, Ordering};

use harrow_device::MemoryRegion;
use harrow_device::error::{ExecutionSnafu, Result};

pub struct HostMemory {
    bytes: Box<[AtomicU8]>,
}

impl std::fmt::Debug for HostMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostMemory").field("len", &self.bytes.len()).finish()
    }
}

impl HostMemory {
    pub fn zeroed(size: usize) -> Self {
        Self { bytes: (0..size).map(|_| AtomicU8::new(0)).collect() }
    }

    pub fn bytes(&self) -> &[AtomicU8] {
        &self.bytes
    }

    fn check(&self, offset: usize, len: usize) -> Result<()> {
        snafu::ensure!(
            offset + len <= self.bytes.len(),
            ExecutionSnafu {
                reason: format!(
                    "host memory access [{offset}..{}] out of bounds (size {})",
                    offset + len,
                    self.bytes.len()
                ),
            }
        );
        Ok(())
    }
}

impl MemoryRegion for HostMemory {
    fn len(&self) -> usize {
        self.bytes.len()
    }

    fn read(&self, offset: usize, dst: &mut [u8]) -> Result<()> {
        self.check(offset, dst.len())?;
        load_bytes(&self.bytes[offset..], dst);
        Ok(())
    }

    fn write(&self, offset: usize, src: &[u8]) -> Result<()> {
        self.check(offset, src.len())?;
        store_bytes(&self.bytes[offset..], src);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Copy out of atomic storage. Caller has bounds-checked.
pub fn load_bytes(src: &[AtomicU8], dst: &mut [u8]) {
    for (byte, slot) in dst.iter_mut().zip(src) {
        *byte = slot.load(Ordering::Relaxed);
    }
}

/// Copy into atomic storage. Caller has bounds-checked.
pub fn store_bytes(dst: &[AtomicU8], src: &[u8]) {
    for (slot, byte) in dst.iter().zip(src) {
        slot.store(*byte, Ordering::Relaxed);
    }
}

/// Fresh zeroed atomic storage for work-group local scratch.
pub fn scratch(size: usize) -> Vec<AtomicU8> {
    (0..size).map(|_| AtomicU8::new(0)).collect()
}
