//! Ordered command submission to one device.
//!
//! Each queue owns a dedicated worker thread that drains submitted commands
//! in FIFO order: submission is non-blocking, completion is observed through
//! the returned [`Event`]. Commands submitted to the same queue execute in
//! submission order; a command that faults completes its event with the
//! error and the worker moves on, so the queue stays usable.

use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};

use crate::buffer::Buffer;
use crate::context::Context;
use crate::device::Device;
use crate::error::{Error, ForeignDeviceSnafu, Result, SizeMismatchSnafu};
use crate::event::{CommandProfile, Event};

/// Options for queue creation.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueueOptions {
    /// Record per-command queued/start/end timestamps, retrievable from the
    /// command's event after completion.
    pub profiling: bool,
}

struct Job {
    run: Box<dyn FnOnce(&QueueClock) + Send>,
    /// Completes the event with a fault if `run` panicked before completing
    /// it itself. A no-op otherwise (first completion wins).
    abort: Box<dyn FnOnce(String) + Send>,
}

/// Submission state shared between the queue handle and its worker.
struct QueueShared {
    pending: Mutex<VecDeque<Job>>,
    cond: Condvar,
    shutdown: AtomicBool,
}

/// Per-queue monotonic clock for profiling timestamps.
#[derive(Debug, Clone, Copy)]
struct QueueClock {
    epoch: Instant,
    profiling: bool,
}

impl QueueClock {
    fn now(&self) -> u64 {
        self.epoch.elapsed().as_nanos() as u64
    }
}

/// An ordered submission channel binding a device to a context.
pub struct CommandQueue {
    shared: Arc<QueueShared>,
    clock: QueueClock,
    device: Device,
    worker: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for CommandQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandQueue")
            .field("device", &self.device.name())
            .field("profiling", &self.clock.profiling)
            .field("pending", &self.shared.pending.lock().len())
            .finish()
    }
}

impl CommandQueue {
    /// Create a queue for `device`, which must belong to `context`.
    pub fn new(context: &Context, device: &Device, options: QueueOptions) -> Result<Self> {
        snafu::ensure!(context.contains(device), ForeignDeviceSnafu { device: device.name() });

        let shared = Arc::new(QueueShared {
            pending: Mutex::new(VecDeque::new()),
            cond: Condvar::new(),
            shutdown: AtomicBool::new(false),
        });
        let clock = QueueClock { epoch: Instant::now(), profiling: options.profiling };

        let worker_shared = Arc::clone(&shared);
        let worker = std::thread::Builder::new()
            .name(format!("harrow-queue-{}", device.name()))
            .spawn(move || worker_loop(worker_shared, clock))
            .expect("failed to spawn queue worker thread");

        tracing::debug!(device = %device.name(), profiling = options.profiling, "command queue created");

        Ok(Self { shared, clock, device: device.clone(), worker: Some(worker) })
    }

    /// The device this queue submits to.
    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn profiling_enabled(&self) -> bool {
        self.clock.profiling
    }

    /// Submit one command for ordered execution.
    ///
    /// This is the generic submission primitive the kernel launch layer
    /// builds on. `op` runs on the worker thread; its result completes the
    /// returned event. Submission itself never blocks.
    pub fn submit<T, F>(&self, op: F) -> Event<T>
    where
        T: Clone + Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let (event, state) = Event::<T>::new();
        let abort_state = Arc::clone(&state);
        let queued_at = self.clock.now();

        let run = Box::new(move |clock: &QueueClock| {
            let started_at = clock.now();
            let result = op().map_err(|e| match e {
                Error::Execution { reason } => reason,
                other => other.to_string(),
            });
            let finished_at = clock.now();

            if let Err(reason) = &result {
                tracing::debug!(%reason, "command faulted");
            }

            let profile =
                clock.profiling.then_some(CommandProfile { queued_at, started_at, finished_at });
            state.complete(result, profile);
        });
        let abort = Box::new(move |reason: String| {
            abort_state.complete(Err(reason), None);
        });

        self.shared.pending.lock().push_back(Job { run, abort });
        self.shared.cond.notify_one();

        event
    }

    /// Enqueue a device-to-host copy of the whole buffer.
    ///
    /// Ordered after previously submitted commands on this queue, so a
    /// read-back issued after a kernel launch observes the launch's writes.
    pub fn enqueue_read(&self, buffer: &Buffer) -> Event<Vec<u8>> {
        let buffer = buffer.clone();
        self.submit(move || {
            let mut host = vec![0u8; buffer.size()];
            buffer.copyout(&mut host)?;
            Ok(host)
        })
    }

    /// Enqueue a host-to-device refresh of the whole buffer.
    pub fn enqueue_write(&self, buffer: &Buffer, data: &[u8]) -> Result<Event<()>> {
        snafu::ensure!(
            data.len() == buffer.size(),
            SizeMismatchSnafu { expected: buffer.size(), actual: data.len() }
        );

        let buffer = buffer.clone();
        let data = data.to_vec();
        Ok(self.submit(move || buffer.copyin(&data)))
    }

    /// Enqueue a device-to-device copy between equally sized buffers.
    pub fn enqueue_copy(&self, src: &Buffer, dst: &Buffer) -> Result<Event<()>> {
        snafu::ensure!(
            src.size() == dst.size(),
            SizeMismatchSnafu { expected: dst.size(), actual: src.size() }
        );

        let src = src.clone();
        let dst = dst.clone();
        Ok(self.submit(move || {
            let mut staged = vec![0u8; src.size()];
            src.copyout(&mut staged)?;
            dst.copyin(&staged)
        }))
    }
}

impl Drop for CommandQueue {
    fn drop(&mut self) {
        // Let the worker drain everything already submitted, then stop.
        self.shared.shutdown.store(true, Ordering::Release);
        self.shared.cond.notify_all();

        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn worker_loop(shared: Arc<QueueShared>, clock: QueueClock) {
    loop {
        let job = {
            let mut pending = shared.pending.lock();
            loop {
                if let Some(job) = pending.pop_front() {
                    break job;
                }
                if shared.shutdown.load(Ordering::Acquire) {
                    return;
                }
                shared.cond.wait(&mut pending);
            }
        };

        let Job { run, abort } = job;
        if catch_unwind(AssertUnwindSafe(move || run(&clock))).is_err() {
            abort("command panicked on the queue worker".to_string());
        }
    }
}
