use snafu::Snafu;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// No accelerator driver is registered with the process.
    #[snafu(display("no compute platform found"))]
    NoPlatformFound,

    /// A platform was found but reports zero usable devices.
    #[snafu(display("platform '{platform}' reports no devices"))]
    NoDeviceFound { platform: String },

    /// The device set handed to `Context::new` was unusable.
    #[snafu(display("context creation failed: {reason}"))]
    ContextCreation { reason: String },

    /// The driver could not provide device memory.
    #[snafu(display("allocation of {size} bytes failed: {reason}"))]
    Allocation { size: usize, reason: String },

    /// Host data length does not match the buffer length.
    #[snafu(display("size mismatch: expected {expected} bytes, got {actual}"))]
    SizeMismatch { expected: usize, actual: usize },

    /// The device does not belong to the context the queue was created for.
    #[snafu(display("device '{device}' does not belong to this context"))]
    ForeignDevice { device: String },

    /// A device-reported runtime fault. Terminal for the triggering command
    /// only; the queue, context, and program remain usable.
    #[snafu(display("execution fault: {reason}"))]
    Execution { reason: String },
}
