//! Kernels and per-invocation argument values.

use std::sync::Arc;

use harrow_device::{Buffer, KernelSignature, ProgramHandle};
use harrow_dtype::{HostScalar, ScalarValue};

/// A per-invocation request for on-device scratch memory.
///
/// Local scratch has no host mirror; only its byte size crosses the
/// boundary. It lives for the duration of one work-group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalScratch {
    size: usize,
}

impl LocalScratch {
    /// Request `size` bytes of scratch.
    pub fn bytes(size: usize) -> Self {
        Self { size }
    }

    /// Request room for `count` elements of `T`.
    pub fn of<T: HostScalar>(count: usize) -> Self {
        Self { size: count * T::TYPE.bytes() }
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

/// One positional kernel argument.
#[derive(Debug, Clone)]
pub enum Arg<'a> {
    /// Passed by exact byte value of its declared type.
    Scalar(ScalarValue),
    /// Passed by device memory handle.
    Buffer(&'a Buffer),
    /// Passed as a byte-size request only.
    Local(LocalScratch),
}

impl Arg<'_> {
    /// Shorthand for a typed scalar: `Arg::scalar(5.0f32)`.
    pub fn scalar(value: impl Into<ScalarValue>) -> Self {
        Arg::Scalar(value.into())
    }

    /// How this argument describes itself in mismatch errors.
    pub(crate) fn describe(&self) -> String {
        match self {
            Arg::Scalar(value) => format!("a {} scalar", value.scalar_type()),
            Arg::Buffer(buffer) => format!("a buffer of {} bytes", buffer.size()),
            Arg::Local(scratch) => format!("local scratch of {} bytes", scratch.size()),
        }
    }
}

/// A named entry point of a built program.
///
/// Immutable once created; arguments are bound per invocation through
/// [`Kernel::enqueue`](crate::launch), never stored on the kernel.
#[derive(Debug, Clone)]
pub struct Kernel {
    signature: KernelSignature,
    pub(crate) handle: Arc<dyn ProgramHandle>,
}

impl Kernel {
    pub(crate) fn new(signature: KernelSignature, handle: Arc<dyn ProgramHandle>) -> Self {
        Self { signature, handle }
    }

    pub fn name(&self) -> &str {
        &self.signature.name
    }

    pub fn signature(&self) -> &KernelSignature {
        &self.signature
    }
}
