//! The built-in host driver.
//!
//! A complete, self-contained platform implementation: kernel source is
//! compiled by the driver itself (lexer → parser → checks) and dispatches
//! are interpreted over the work grid in-process. It exists so the whole
//! dispatch path (discovery, contexts, builds with real diagnostics,
//! queues, argument marshalling, read-back) runs and can be tested on any
//! machine, with no vendor runtime installed.

mod ast;
mod check;
mod diag;
mod exec;
mod lexer;
mod mem;
mod parser;

use std::sync::Arc;

use harrow_device::error::ExecutionSnafu;
use harrow_device::{
    BoundArg, CompileOutcome, DeviceInfo, DeviceMemory, DeviceType, Driver, KernelSignature,
    LaunchRequest, ParamKind, PlatformInfo, ProgramHandle,
};
use harrow_dtype::ScalarValue;

use ast::KernelDef;
use check::KernelMeta;
use exec::{Fault, GridShape, SlotSpec, Value};
use mem::HostMemory;

/// Register the host driver with the process-wide registry. Idempotent.
pub fn register() {
    harrow_device::register_driver(Arc::new(HostDriver::new()));
}

#[derive(Debug)]
pub struct HostDriver {
    info: PlatformInfo,
    devices: Vec<DeviceInfo>,
}

impl Default for HostDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl HostDriver {
    pub fn new() -> Self {
        let threads = std::thread::available_parallelism().map_or(1, |n| n.get() as u32);

        Self {
            info: PlatformInfo {
                name: "Harrow Host Platform".to_string(),
                vendor: "Harrow Project".to_string(),
                version: "Harrow 1.0".to_string(),
            },
            devices: vec![DeviceInfo {
                name: "Harrow Host Device".to_string(),
                vendor: "Harrow Project".to_string(),
                device_type: DeviceType::Cpu,
                compute_units: threads,
                max_work_group_size: 256,
                local_mem_size: 64 * 1024,
                global_mem_size: 1 << 30,
            }],
        }
    }
}

impl Driver for HostDriver {
    fn platform_info(&self) -> &PlatformInfo {
        &self.info
    }

    fn devices(&self) -> Vec<DeviceInfo> {
        self.devices.clone()
    }

    fn allocate(&self, size: usize) -> harrow_device::Result<DeviceMemory> {
        Ok(Arc::new(HostMemory::zeroed(size)))
    }

    fn compile(&self, source: &str, _devices: &[DeviceInfo]) -> CompileOutcome {
        let (kernels, mut diags) = parser::parse(source);
        let (metas, check_diags) = check::check(&kernels);
        diags.extend(check_diags);

        if !diags.is_empty() {
            tracing::debug!(errors = diags.len(), "kernel build failed");
            return CompileOutcome::Failed { log: diag::render_log(source, &diags) };
        }

        let signatures: Vec<KernelSignature> = kernels.iter().map(KernelDef::signature).collect();
        tracing::debug!(
            kernels = signatures.len(),
            entries = ?signatures.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
            "kernel program built"
        );

        let kernels = kernels.into_iter().zip(metas).collect();
        CompileOutcome::Built(Arc::new(HostProgram { kernels, signatures }))
    }
}

#[derive(Debug)]
struct HostProgram {
    kernels: Vec<(KernelDef, KernelMeta)>,
    signatures: Vec<KernelSignature>,
}

impl ProgramHandle for HostProgram {
    fn signatures(&self) -> &[KernelSignature] {
        &self.signatures
    }

    fn launch(&self, request: LaunchRequest) -> harrow_device::Result<()> {
        let Some((def, meta)) = self.kernels.iter().find(|(def, _)| def.name == request.entry) else {
            return ExecutionSnafu { reason: format!("no kernel named '{}' in this program", request.entry) }
                .fail();
        };

        // The facade validated arity and kinds; binding here only maps the
        // arguments onto interpreter slots.
        let specs = def
            .params
            .iter()
            .zip(&request.args)
            .map(|(param, arg)| bind_slot(&param.kind, arg))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|Fault(reason)| ExecutionSnafu { reason }.build())?;

        tracing::debug!(
            entry = %request.entry,
            global = ?&request.global[..request.dims],
            local = ?&request.local[..request.dims],
            lockstep = meta.uses_barrier,
            "dispatching kernel"
        );

        let shape = GridShape::new(request.global, request.local);
        exec::run_grid(def, meta.uses_barrier, &specs, shape)
            .map_err(|Fault(reason)| ExecutionSnafu { reason: format!("kernel '{}': {reason}", def.name) }.build())
    }
}

fn bind_slot<'a>(kind: &ParamKind, arg: &'a BoundArg) -> Result<SlotSpec<'a>, Fault> {
    match (kind, arg) {
        (ParamKind::Scalar(ty), BoundArg::Scalar(value)) => {
            Ok(SlotSpec::Scalar { ty: *ty, value: exec::coerce(*ty, scalar_value(value)) })
        }
        (ParamKind::GlobalPtr { elem, .. }, BoundArg::Global(memory)) => {
            let host = memory
                .as_any()
                .downcast_ref::<HostMemory>()
                .ok_or_else(|| Fault("buffer does not belong to the host platform".to_string()))?;
            Ok(SlotSpec::Mem { bytes: host.bytes(), elem: *elem })
        }
        (ParamKind::LocalPtr { elem }, BoundArg::Local { size }) => {
            Ok(SlotSpec::Local { size: *size, elem: *elem })
        }
        (kind, arg) => Err(Fault(format!("argument does not fit parameter '{kind}': {arg:?}"))),
    }
}

fn scalar_value(value: &ScalarValue) -> Value {
    if value.scalar_type().is_float() {
        Value::Float(value.as_f64())
    } else {
        Value::Int(value.as_i64())
    }
}
