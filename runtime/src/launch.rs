//! Grid extents, argument validation, and kernel submission.
//!
//! Everything that can be rejected on the calling thread is rejected here,
//! before the command reaches the queue: argument arity and layout
//! (`ArgumentCount`/`ArgumentType`), and launch geometry (surfaced as the
//! execution fault for an invalid work-group configuration). Only a request
//! that passed all checks is submitted.

use harrow_device::error::ExecutionSnafu;
use harrow_device::{AccessMode, BoundArg, CommandQueue, Event, LaunchRequest, ParamKind};
use snafu::{ResultExt, ensure};

use crate::error::{ArgumentCountSnafu, ArgumentTypeSnafu, DeviceSnafu, Result};
use crate::kernel::{Arg, Kernel};

/// A bounded grid extent: one to three positive dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extent {
    dims: usize,
    sizes: [usize; 3],
}

impl Extent {
    pub fn d1(x: usize) -> Self {
        Self { dims: 1, sizes: [x, 1, 1] }
    }

    pub fn d2(x: usize, y: usize) -> Self {
        Self { dims: 2, sizes: [x, y, 1] }
    }

    pub fn d3(x: usize, y: usize, z: usize) -> Self {
        Self { dims: 3, sizes: [x, y, z] }
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Sizes padded to three dimensions with 1.
    pub fn sizes(&self) -> [usize; 3] {
        self.sizes
    }

    pub fn volume(&self) -> usize {
        self.sizes.iter().product()
    }
}

impl Kernel {
    /// Bind `args` positionally and submit one execution over the grid.
    ///
    /// `local` must divide `global` elementwise, and the work-group volume
    /// must fit the queue's device. Arguments must match the kernel
    /// signature in count, kind, and byte layout; a read-only buffer cannot
    /// be bound to a writable pointer parameter. All of this is checked
    /// here, synchronously; nothing is submitted on failure.
    ///
    /// Submission is asynchronous: the returned event completes when the
    /// dispatch has run (or faulted) on the device.
    pub fn enqueue(
        &self,
        queue: &CommandQueue,
        global: Extent,
        local: Extent,
        args: &[Arg<'_>],
    ) -> Result<Event<()>> {
        let bound = self.bind_args(args)?;
        self.validate_grid(queue, global, local).context(DeviceSnafu)?;

        let request = LaunchRequest {
            entry: self.name().to_string(),
            dims: global.dims(),
            global: global.sizes(),
            local: local.sizes(),
            args: bound,
        };

        let handle = std::sync::Arc::clone(&self.handle);
        Ok(queue.submit(move || handle.launch(request)))
    }

    fn bind_args(&self, args: &[Arg<'_>]) -> Result<Vec<BoundArg>> {
        let params = &self.signature().params;
        ensure!(
            params.len() == args.len(),
            ArgumentCountSnafu { expected: params.len(), actual: args.len() }
        );

        params
            .iter()
            .zip(args)
            .enumerate()
            .map(|(index, (param, arg))| {
                let mismatch = |reason: String| {
                    ArgumentTypeSnafu { index, expected: param.kind.to_string(), actual: reason }
                };

                match (&param.kind, arg) {
                    (ParamKind::Scalar(ty), Arg::Scalar(value)) => {
                        ensure!(
                            value.scalar_type() == *ty,
                            mismatch(format!("a {} scalar", value.scalar_type()))
                        );
                        Ok(BoundArg::Scalar(*value))
                    }
                    (ParamKind::GlobalPtr { elem, readonly }, Arg::Buffer(buffer)) => {
                        ensure!(
                            buffer.size() % elem.bytes() == 0,
                            mismatch(format!(
                                "a buffer of {} bytes (not a whole number of {elem} elements)",
                                buffer.size()
                            ))
                        );
                        ensure!(
                            *readonly || buffer.access() != AccessMode::ReadOnly,
                            mismatch("a read-only buffer (parameter is writable)".to_string())
                        );
                        Ok(BoundArg::Global(std::sync::Arc::clone(buffer.memory())))
                    }
                    (ParamKind::LocalPtr { elem }, Arg::Local(scratch)) => {
                        ensure!(scratch.size() > 0, mismatch("empty local scratch".to_string()));
                        ensure!(
                            scratch.size() % elem.bytes() == 0,
                            mismatch(format!(
                                "local scratch of {} bytes (not a whole number of {elem} elements)",
                                scratch.size()
                            ))
                        );
                        Ok(BoundArg::Local { size: scratch.size() })
                    }
                    (_, arg) => mismatch(arg.describe()).fail(),
                }
            })
            .collect()
    }

    fn validate_grid(
        &self,
        queue: &CommandQueue,
        global: Extent,
        local: Extent,
    ) -> harrow_device::Result<()> {
        ensure!(
            global.dims() == local.dims(),
            ExecutionSnafu {
                reason: format!(
                    "invalid work-group configuration: global is {}-dimensional, local is {}-dimensional",
                    global.dims(),
                    local.dims()
                ),
            }
        );

        for d in 0..global.dims() {
            let (g, l) = (global.sizes()[d], local.sizes()[d]);
            ensure!(
                g > 0 && l > 0,
                ExecutionSnafu {
                    reason: format!("invalid work-group configuration: extent {d} is zero"),
                }
            );
            ensure!(
                g % l == 0,
                ExecutionSnafu {
                    reason: format!(
                        "invalid work-group configuration: global extent {g} is not divisible by local extent {l} in dimension {d}"
                    ),
                }
            );
        }

        let max = queue.device().info().max_work_group_size;
        ensure!(
            local.volume() <= max,
            ExecutionSnafu {
                reason: format!(
                    "invalid work-group configuration: work-group volume {} exceeds device maximum {max}",
                    local.volume()
                ),
            }
        );

        Ok(())
    }
}
