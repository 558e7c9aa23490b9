//! Error types for program builds and kernel dispatch.

use snafu::Snafu;

/// Result type for runtime operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// An underlying device-layer error.
    #[snafu(display("device error: {source}"))]
    Device { source: harrow_device::Error },

    /// Program build failed. `log` is the complete driver diagnostic text,
    /// verbatim; it is the only debugging signal available. A failed
    /// program cannot be retried in place; recompile from corrected source.
    #[snafu(display("program build failed:\n{log}"))]
    Build { log: String },

    /// No kernel of this name exists in the built program.
    #[snafu(display("no kernel entry point named '{name}'"))]
    EntryNotFound { name: String },

    /// The invocation bound a different number of arguments than the kernel
    /// declares.
    #[snafu(display("kernel expects {expected} arguments, {actual} were bound"))]
    ArgumentCount { expected: usize, actual: usize },

    /// An argument's kind or byte layout does not match the parameter it was
    /// bound to.
    #[snafu(display("argument {index} mismatch: parameter is '{expected}', got {actual}"))]
    ArgumentType { index: usize, expected: String, actual: String },
}
