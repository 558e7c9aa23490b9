//! Program lifecycle: source in, built program (or diagnostic log) out.

use std::sync::Arc;

use harrow_device::{CompileOutcome, Context, ProgramHandle};

use crate::error::{BuildSnafu, EntryNotFoundSnafu, Result};
use crate::kernel::Kernel;

/// The tagged result of a program build.
///
/// A program is either built or failed-with-log; there is no transition out
/// of the failed state. Fix the source and build a new program.
#[derive(Debug)]
pub enum BuildOutcome {
    Built(Program),
    /// The complete driver diagnostic log, verbatim. For a multi-device
    /// context this is the log of the first device that failed.
    Failed { log: String },
}

impl BuildOutcome {
    /// Convert into a `Result`, carrying the log into the error.
    pub fn built(self) -> Result<Program> {
        match self {
            Self::Built(program) => Ok(program),
            Self::Failed { log } => BuildSnafu { log }.fail(),
        }
    }
}

/// A compiled kernel program bound to a context.
///
/// Built once per kernel source, reused across many invocations. Cloning
/// shares the compiled artifact.
#[derive(Debug, Clone)]
pub struct Program {
    handle: Arc<dyn ProgramHandle>,
}

impl Program {
    /// Compile `source` for all devices of `context`.
    ///
    /// Returns the tagged outcome; use [`Program::build`] when an error type
    /// is more convenient. On failure the driver's full diagnostic text is
    /// attached: surface it, it is the only debugging signal there is.
    pub fn try_build(context: &Context, source: &str) -> BuildOutcome {
        match context.compile(source) {
            CompileOutcome::Built(handle) => BuildOutcome::Built(Program { handle }),
            CompileOutcome::Failed { log } => BuildOutcome::Failed { log },
        }
    }

    /// [`Program::try_build`], with the failure path as an error.
    pub fn build(context: &Context, source: &str) -> Result<Program> {
        Self::try_build(context, source).built()
    }

    /// Names of every kernel entry point in the program, in source order.
    pub fn entry_points(&self) -> Vec<&str> {
        self.handle.signatures().iter().map(|sig| sig.name.as_str()).collect()
    }

    /// Look up the entry point `name`.
    pub fn kernel(&self, name: &str) -> Result<Kernel> {
        let signature = self
            .handle
            .signatures()
            .iter()
            .find(|sig| sig.name == name)
            .cloned()
            .ok_or_else(|| EntryNotFoundSnafu { name }.build())?;

        Ok(Kernel::new(signature, Arc::clone(&self.handle)))
    }
}
