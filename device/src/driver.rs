//! The trait seam a platform implementation plugs into.
//!
//! A `Driver` is one vendor stack: it enumerates devices, hands out device
//! memory, and compiles kernel source into launchable programs. The facade
//! types (`Platform`, `Context`, `Buffer`, `CommandQueue`) never know which
//! driver they are talking to; everything goes through these traits.

use std::any::Any;
use std::sync::Arc;

use harrow_dtype::{ScalarType, ScalarValue};

use crate::device::DeviceInfo;
use crate::error::Result;
use crate::platform::PlatformInfo;

/// A region of device-visible memory.
///
/// Byte-addressed; access modes and element types are facade-level concerns.
/// Implementations must be safe to share across queues and threads, since
/// the facade performs no locking around kernel access.
pub trait MemoryRegion: Send + Sync + std::fmt::Debug {
    /// Region size in bytes.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy `dst.len()` bytes out of the region starting at `offset`.
    fn read(&self, offset: usize, dst: &mut [u8]) -> Result<()>;

    /// Copy `src` into the region starting at `offset`.
    fn write(&self, offset: usize, src: &[u8]) -> Result<()>;

    /// Downcast support so a driver can recognize its own regions when they
    /// come back as kernel arguments.
    fn as_any(&self) -> &dyn Any;
}

/// Shared handle to driver memory.
pub type DeviceMemory = Arc<dyn MemoryRegion>;

/// One parameter slot of a kernel signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamKind {
    /// Passed by exact byte value.
    Scalar(ScalarType),
    /// A pointer into global (device) memory.
    GlobalPtr { elem: ScalarType, readonly: bool },
    /// A pointer into work-group local scratch; bound by size only.
    LocalPtr { elem: ScalarType },
}

impl std::fmt::Display for ParamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scalar(ty) => write!(f, "{ty}"),
            Self::GlobalPtr { elem, readonly: true } => write!(f, "__global const {elem}*"),
            Self::GlobalPtr { elem, readonly: false } => write!(f, "__global {elem}*"),
            Self::LocalPtr { elem } => write!(f, "__local {elem}*"),
        }
    }
}

/// A named parameter as declared in kernel source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelParam {
    pub name: String,
    pub kind: ParamKind,
}

/// The callable surface of one entry point in a built program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelSignature {
    pub name: String,
    pub params: Vec<KernelParam>,
}

/// An argument after facade-level validation, ready for the driver.
#[derive(Debug, Clone)]
pub enum BoundArg {
    Scalar(ScalarValue),
    Global(DeviceMemory),
    Local { size: usize },
}

/// One validated kernel dispatch.
///
/// Invariants the facade guarantees before building a request: `dims` is
/// 1..=3, extents are positive, `local` divides `global` elementwise, and
/// `args` matches the entry's signature positionally.
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    pub entry: String,
    pub dims: usize,
    pub global: [usize; 3],
    pub local: [usize; 3],
    pub args: Vec<BoundArg>,
}

/// A built program: signatures plus a synchronous launch entry.
///
/// `launch` runs on a queue worker thread and returns only when the dispatch
/// has completed on the device (or faulted).
pub trait ProgramHandle: Send + Sync + std::fmt::Debug {
    fn signatures(&self) -> &[KernelSignature];

    fn launch(&self, request: LaunchRequest) -> Result<()>;
}

/// Outcome of compiling kernel source for a set of devices.
///
/// A failed build is a value, not just an error: the diagnostic log is the
/// only debugging signal available and must reach the caller verbatim.
#[derive(Debug, Clone)]
pub enum CompileOutcome {
    Built(Arc<dyn ProgramHandle>),
    /// Build failed; `log` is the complete driver diagnostic text for the
    /// first device that rejected the source.
    Failed { log: String },
}

/// One vendor driver stack, registered process-wide.
pub trait Driver: Send + Sync + std::fmt::Debug {
    fn platform_info(&self) -> &PlatformInfo;

    /// Enumerate the devices this driver exposes. May be empty.
    fn devices(&self) -> Vec<DeviceInfo>;

    /// Allocate `size` bytes of device memory.
    fn allocate(&self, size: usize) -> Result<DeviceMemory>;

    /// Compile kernel source for the given devices.
    fn compile(&self, source: &str, devices: &[DeviceInfo]) -> CompileOutcome;
}
