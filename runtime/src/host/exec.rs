//! Work-grid interpreter for the host driver.
//!
//! Dispatches execute one work-group at a time, in row-major group order.
//! Kernels that never call `barrier()` run their work items sequentially;
//! kernels that do get one thread per work item, synchronized through a
//! cancellable group barrier, so cross-item local-memory protocols behave
//! as they would on a real device.
//!
//! Float expressions evaluate in double precision and round at stores (to a
//! `float` variable or buffer element), like a C implementation with
//! `FLT_EVAL_METHOD == 2`. Faults (out-of-bounds access, division by zero)
//! abort the dispatch and surface as execution errors; they never poison the
//! queue or the program.

use std::collections::HashMap;
use std::sync::atomic::AtomicU8;

use harrow_dtype::ScalarType;
use parking_lot::{Condvar, Mutex};

use super::ast::{AssignTarget, BinOp, Block, Expr, KernelDef, Stmt, UnOp};
use super::mem;

/// A device-style runtime fault, carrying only the reason text.
#[derive(Debug)]
pub struct Fault(pub String);

impl Fault {
    fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

type EResult<T> = Result<T, Fault>;

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub enum Value {
    Int(i64),
    Float(f64),
}

impl Value {
    fn as_f64(self) -> f64 {
        match self {
            Self::Int(v) => v as f64,
            Self::Float(v) => v,
        }
    }

    fn as_index(self, what: &str) -> EResult<i64> {
        match self {
            Self::Int(v) => Ok(v),
            Self::Float(_) => Err(Fault::new(format!("non-integer index on '{what}'"))),
        }
    }

    fn as_i64(self) -> i64 {
        match self {
            Self::Int(v) => v,
            Self::Float(v) => v as i64,
        }
    }

    fn truthy(self) -> bool {
        match self {
            Self::Int(v) => v != 0,
            Self::Float(v) => v != 0.0,
        }
    }

    fn is_float(self) -> bool {
        matches!(self, Self::Float(_))
    }
}

/// Coerce a value into the representable range of `ty`, C-conversion style:
/// integers wrap to their width, floats round to their precision, and
/// float→int truncates toward zero.
pub fn coerce(ty: ScalarType, value: Value) -> Value {
    match ty {
        ScalarType::Char => Value::Int(value.as_i64() as i8 as i64),
        ScalarType::UChar => Value::Int(value.as_i64() as u8 as i64),
        ScalarType::Short => Value::Int(value.as_i64() as i16 as i64),
        ScalarType::UShort => Value::Int(value.as_i64() as u16 as i64),
        ScalarType::Int => Value::Int(value.as_i64() as i32 as i64),
        ScalarType::UInt => Value::Int(value.as_i64() as u32 as i64),
        ScalarType::Long | ScalarType::ULong => Value::Int(value.as_i64()),
        ScalarType::Float => Value::Float(value.as_f64() as f32 as f64),
        ScalarType::Double => Value::Float(value.as_f64()),
    }
}

// ---------------------------------------------------------------------------
// Typed element access over atomic byte storage
// ---------------------------------------------------------------------------

fn load_elem(bytes: &[AtomicU8], elem: ScalarType, index: i64, what: &str) -> EResult<Value> {
    let offset = elem_offset(bytes, elem, index, what)?;
    let width = elem.bytes();
    let mut raw = [0u8; 8];
    mem::load_bytes(&bytes[offset..offset + width], &mut raw[..width]);

    Ok(match elem {
        ScalarType::Char => Value::Int(i8::from_le_bytes([raw[0]]) as i64),
        ScalarType::UChar => Value::Int(raw[0] as i64),
        ScalarType::Short => Value::Int(i16::from_le_bytes([raw[0], raw[1]]) as i64),
        ScalarType::UShort => Value::Int(u16::from_le_bytes([raw[0], raw[1]]) as i64),
        ScalarType::Int => Value::Int(i32::from_le_bytes(raw[..4].try_into().expect("4 bytes")) as i64),
        ScalarType::UInt => Value::Int(u32::from_le_bytes(raw[..4].try_into().expect("4 bytes")) as i64),
        ScalarType::Long => Value::Int(i64::from_le_bytes(raw)),
        ScalarType::ULong => Value::Int(u64::from_le_bytes(raw) as i64),
        ScalarType::Float => Value::Float(f32::from_le_bytes(raw[..4].try_into().expect("4 bytes")) as f64),
        ScalarType::Double => Value::Float(f64::from_le_bytes(raw)),
    })
}

fn store_elem(bytes: &[AtomicU8], elem: ScalarType, index: i64, value: Value, what: &str) -> EResult<()> {
    let offset = elem_offset(bytes, elem, index, what)?;
    let width = elem.bytes();

    let raw: [u8; 8] = match coerce(elem, value) {
        Value::Int(v) => v.to_le_bytes(),
        Value::Float(v) => {
            if elem == ScalarType::Float {
                let mut raw = [0u8; 8];
                raw[..4].copy_from_slice(&(v as f32).to_le_bytes());
                raw
            } else {
                v.to_le_bytes()
            }
        }
    };

    mem::store_bytes(&bytes[offset..offset + width], &raw[..width]);
    Ok(())
}

fn elem_offset(bytes: &[AtomicU8], elem: ScalarType, index: i64, what: &str) -> EResult<usize> {
    if index < 0 {
        return Err(Fault::new(format!("negative index {index} on '{what}'")));
    }
    let width = elem.bytes();
    let end = usize::try_from(index)
        .ok()
        .and_then(|i| i.checked_mul(width))
        .and_then(|offset| offset.checked_add(width));

    match end {
        Some(end) if end <= bytes.len() => Ok(end - width),
        _ => Err(Fault::new(format!(
            "out-of-bounds access on '{what}': index {index} (element size {width}) exceeds {} bytes",
            bytes.len()
        ))),
    }
}

// ---------------------------------------------------------------------------
// Group barrier
// ---------------------------------------------------------------------------

struct BarrierState {
    waiting: usize,
    active: usize,
    generation: u64,
    cancelled: bool,
}

/// Barrier for the work items of one group.
///
/// Unlike `std::sync::Barrier` this one is cancellable (a faulting item
/// releases everyone instead of deadlocking them) and tolerates items that
/// return early: finished items deregister via `leave`, and a barrier that
/// can no longer fill releases its waiters. Divergent barriers are undefined
/// on real devices; releasing is the lenient reading.
pub struct GroupBarrier {
    state: Mutex<BarrierState>,
    cond: Condvar,
}

impl GroupBarrier {
    pub fn new(items: usize) -> Self {
        Self {
            state: Mutex::new(BarrierState { waiting: 0, active: items, generation: 0, cancelled: false }),
            cond: Condvar::new(),
        }
    }

    /// Returns `Err` if the group was cancelled while waiting.
    pub fn wait(&self) -> Result<(), ()> {
        let mut state = self.state.lock();
        if state.cancelled {
            return Err(());
        }

        state.waiting += 1;
        if state.waiting >= state.active {
            state.waiting = 0;
            state.generation += 1;
            self.cond.notify_all();
            return Ok(());
        }

        let generation = state.generation;
        while state.generation == generation && !state.cancelled {
            self.cond.wait(&mut state);
        }

        if state.cancelled { Err(()) } else { Ok(()) }
    }

    /// Deregister one item (it finished or faulted).
    pub fn leave(&self) {
        let mut state = self.state.lock();
        state.active -= 1;
        if state.waiting > 0 && state.waiting >= state.active {
            state.waiting = 0;
            state.generation += 1;
            self.cond.notify_all();
        }
    }

    /// Release all waiters with an error; subsequent waits fail immediately.
    pub fn cancel(&self) {
        let mut state = self.state.lock();
        state.cancelled = true;
        self.cond.notify_all();
    }
}

// ---------------------------------------------------------------------------
// Grid
// ---------------------------------------------------------------------------

/// Extents of one dispatch. All arrays are padded to three dimensions with 1.
#[derive(Debug, Clone, Copy)]
pub struct GridShape {
    pub global: [usize; 3],
    pub local: [usize; 3],
    pub groups: [usize; 3],
}

impl GridShape {
    pub fn new(global: [usize; 3], local: [usize; 3]) -> Self {
        let groups = [global[0] / local[0], global[1] / local[1], global[2] / local[2]];
        Self { global, local, groups }
    }

    fn local_volume(&self) -> usize {
        self.local.iter().product()
    }
}

#[derive(Debug, Clone, Copy)]
struct GridPos {
    global: [usize; 3],
    local: [usize; 3],
    group: [usize; 3],
}

// ---------------------------------------------------------------------------
// Argument slots
// ---------------------------------------------------------------------------

/// Per-dispatch argument template; local scratch is materialized per group.
pub enum SlotSpec<'a> {
    Scalar { ty: ScalarType, value: Value },
    Mem { bytes: &'a [AtomicU8], elem: ScalarType },
    Local { size: usize, elem: ScalarType },
}

/// Per-group view of the arguments.
enum Slot<'a> {
    Scalar { ty: ScalarType, value: Value },
    Mem { bytes: &'a [AtomicU8], elem: ScalarType },
}

/// Run one dispatch of `kernel` over the grid.
pub fn run_grid(
    kernel: &KernelDef,
    uses_barrier: bool,
    specs: &[SlotSpec<'_>],
    shape: GridShape,
) -> Result<(), Fault> {
    let param_index: HashMap<&str, usize> =
        kernel.params.iter().enumerate().map(|(i, p)| (p.name.as_str(), i)).collect();

    for gz in 0..shape.groups[2] {
        for gy in 0..shape.groups[1] {
            for gx in 0..shape.groups[0] {
                run_group(kernel, uses_barrier, specs, &param_index, shape, [gx, gy, gz])?;
            }
        }
    }
    Ok(())
}

fn run_group(
    kernel: &KernelDef,
    uses_barrier: bool,
    specs: &[SlotSpec<'_>],
    param_index: &HashMap<&str, usize>,
    shape: GridShape,
    group: [usize; 3],
) -> Result<(), Fault> {
    // Local scratch is fresh per group and shared by the group's items.
    let scratch: Vec<Vec<AtomicU8>> = specs
        .iter()
        .map(|spec| match spec {
            SlotSpec::Local { size, .. } => mem::scratch(*size),
            _ => Vec::new(),
        })
        .collect();

    let slots: Vec<Slot<'_>> = specs
        .iter()
        .zip(&scratch)
        .map(|(spec, scratch)| match spec {
            SlotSpec::Scalar { ty, value } => Slot::Scalar { ty: *ty, value: *value },
            SlotSpec::Mem { bytes, elem } => Slot::Mem { bytes, elem: *elem },
            SlotSpec::Local { elem, .. } => Slot::Mem { bytes: scratch.as_slice(), elem: *elem },
        })
        .collect();

    let items: Vec<GridPos> = group_items(shape, group).collect();

    if !uses_barrier {
        for pos in items {
            run_item(kernel, &slots, param_index, shape, pos, None)?;
        }
        return Ok(());
    }

    let barrier = GroupBarrier::new(shape.local_volume());
    let first_fault: Mutex<Option<Fault>> = Mutex::new(None);

    std::thread::scope(|scope| {
        let barrier = &barrier;
        let first_fault = &first_fault;
        let slots = &slots;

        for pos in items {
            scope.spawn(move || {
                let outcome = run_item(kernel, slots, param_index, shape, pos, Some(barrier));
                if let Err(fault) = outcome {
                    let mut first = first_fault.lock();
                    if first.is_none() {
                        *first = Some(fault);
                    }
                    barrier.cancel();
                }
                barrier.leave();
            });
        }
    });

    match first_fault.into_inner() {
        Some(fault) => Err(fault),
        None => Ok(()),
    }
}

fn group_items(shape: GridShape, group: [usize; 3]) -> impl Iterator<Item = GridPos> {
    let [lx, ly, lz] = shape.local;
    (0..lz).flat_map(move |z| {
        (0..ly).flat_map(move |y| {
            (0..lx).map(move |x| GridPos {
                local: [x, y, z],
                group,
                global: [group[0] * lx + x, group[1] * ly + y, group[2] * lz + z],
            })
        })
    })
}

fn run_item(
    kernel: &KernelDef,
    slots: &[Slot<'_>],
    param_index: &HashMap<&str, usize>,
    shape: GridShape,
    pos: GridPos,
    barrier: Option<&GroupBarrier>,
) -> EResult<()> {
    let mut interp = Interp { slots, param_index, shape, pos, barrier, scopes: vec![Vec::new()] };

    // Scalar parameters behave like pre-initialized local variables.
    for (param, slot) in kernel.params.iter().zip(slots) {
        if let Slot::Scalar { ty, value } = slot {
            interp.scopes[0].push((param.name.clone(), *ty, *value));
        }
    }

    interp.exec_block_in_place(&kernel.body)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Interpreter
// ---------------------------------------------------------------------------

enum Flow {
    Normal,
    Return,
}

struct Interp<'a> {
    slots: &'a [Slot<'a>],
    param_index: &'a HashMap<&'a str, usize>,
    shape: GridShape,
    pos: GridPos,
    barrier: Option<&'a GroupBarrier>,
    scopes: Vec<Vec<(String, ScalarType, Value)>>,
}

impl Interp<'_> {
    fn mem_slot(&self, name: &str) -> EResult<(&[AtomicU8], ScalarType)> {
        match self.param_index.get(name).map(|&i| &self.slots[i]) {
            Some(Slot::Mem { bytes, elem }) => Ok((bytes, *elem)),
            _ => Err(Fault::new(format!("'{name}' is not a pointer parameter"))),
        }
    }

    fn var(&mut self, name: &str) -> Option<&mut (String, ScalarType, Value)> {
        self.scopes.iter_mut().rev().find_map(|scope| scope.iter_mut().find(|(n, _, _)| n == name))
    }

    fn exec_block(&mut self, block: &Block) -> EResult<Flow> {
        self.scopes.push(Vec::new());
        let flow = self.exec_stmts(&block.stmts);
        self.scopes.pop();
        flow
    }

    /// Run a block's statements in the current scope (kernel body root).
    fn exec_block_in_place(&mut self, block: &Block) -> EResult<Flow> {
        self.exec_stmts(&block.stmts)
    }

    fn exec_stmts(&mut self, stmts: &[Stmt]) -> EResult<Flow> {
        for stmt in stmts {
            if let Flow::Return = self.exec_stmt(stmt)? {
                return Ok(Flow::Return);
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&mut self, stmt: &Stmt) -> EResult<Flow> {
        match stmt {
            Stmt::Decl { ty, name, init, .. } => {
                let value = match init {
                    Some(init) => self.eval(init)?,
                    None => match ty.is_float() {
                        true => Value::Float(0.0),
                        false => Value::Int(0),
                    },
                };
                let value = coerce(*ty, value);
                self.scopes.last_mut().expect("scope stack non-empty").push((name.clone(), *ty, value));
                Ok(Flow::Normal)
            }
            Stmt::Assign { target, op, value, .. } => {
                let rhs = self.eval(value)?;
                self.assign(target, *op, rhs)?;
                Ok(Flow::Normal)
            }
            Stmt::If { cond, then_body, else_body } => {
                if self.eval(cond)?.truthy() {
                    self.exec_block(then_body)
                } else if let Some(else_body) = else_body {
                    self.exec_block(else_body)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::For { init, cond, step, body } => {
                self.scopes.push(Vec::new());
                let flow = self.exec_for(init, cond, step, body);
                self.scopes.pop();
                flow
            }
            Stmt::Barrier { .. } => {
                if let Some(barrier) = self.barrier
                    && barrier.wait().is_err()
                {
                    return Err(Fault::new("work-group aborted at barrier"));
                }
                Ok(Flow::Normal)
            }
            Stmt::Return => Ok(Flow::Return),
        }
    }

    fn exec_for(&mut self, init: &Stmt, cond: &Expr, step: &Stmt, body: &Block) -> EResult<Flow> {
        self.exec_stmt(init)?;
        while self.eval(cond)?.truthy() {
            if let Flow::Return = self.exec_block(body)? {
                return Ok(Flow::Return);
            }
            self.exec_stmt(step)?;
        }
        Ok(Flow::Normal)
    }

    fn assign(&mut self, target: &AssignTarget, op: Option<BinOp>, rhs: Value) -> EResult<()> {
        match target {
            AssignTarget::Var { name, .. } => {
                let combined = match op {
                    Some(op) => {
                        let (_, _, current) = self
                            .var(name)
                            .ok_or_else(|| Fault::new(format!("unknown variable '{name}'")))?;
                        apply_binop(op, *current, rhs)?
                    }
                    None => rhs,
                };

                let (_, ty, slot) =
                    self.var(name).ok_or_else(|| Fault::new(format!("unknown variable '{name}'")))?;
                *slot = coerce(*ty, combined);
                Ok(())
            }
            AssignTarget::Index { base, index, .. } => {
                let index = self.eval(index)?.as_index(base)?;
                let (bytes, elem) = self.mem_slot(base)?;

                let combined = match op {
                    Some(op) => {
                        let current = load_elem(bytes, elem, index, base)?;
                        apply_binop(op, current, rhs)?
                    }
                    None => rhs,
                };
                store_elem(bytes, elem, index, combined, base)
            }
        }
    }

    fn eval(&mut self, expr: &Expr) -> EResult<Value> {
        match expr {
            Expr::IntLit { value, .. } => Ok(Value::Int(*value)),
            Expr::FloatLit { value, .. } => Ok(Value::Float(*value)),
            Expr::Var { name, .. } => match self.var(name) {
                Some((_, _, value)) => Ok(*value),
                None => Err(Fault::new(format!("unknown variable '{name}'"))),
            },
            Expr::Unary { op, operand, .. } => {
                let v = self.eval(operand)?;
                Ok(match op {
                    UnOp::Neg => match v {
                        Value::Int(v) => Value::Int(v.wrapping_neg()),
                        Value::Float(v) => Value::Float(-v),
                    },
                    UnOp::Not => Value::Int(if v.truthy() { 0 } else { 1 }),
                })
            }
            Expr::Binary { op, lhs, rhs, .. } => {
                // Logical operators short-circuit like C.
                match op {
                    BinOp::And => {
                        let lhs = self.eval(lhs)?;
                        if !lhs.truthy() {
                            return Ok(Value::Int(0));
                        }
                        return Ok(Value::Int(if self.eval(rhs)?.truthy() { 1 } else { 0 }));
                    }
                    BinOp::Or => {
                        let lhs = self.eval(lhs)?;
                        if lhs.truthy() {
                            return Ok(Value::Int(1));
                        }
                        return Ok(Value::Int(if self.eval(rhs)?.truthy() { 1 } else { 0 }));
                    }
                    _ => {}
                }

                let lhs = self.eval(lhs)?;
                let rhs = self.eval(rhs)?;
                apply_binop(*op, lhs, rhs)
            }
            Expr::Cast { ty, operand, .. } => Ok(coerce(*ty, self.eval(operand)?)),
            Expr::Index { base, index, .. } => {
                let index = self.eval(index)?.as_index(base)?;
                let (bytes, elem) = self.mem_slot(base)?;
                load_elem(bytes, elem, index, base)
            }
            Expr::Call { name, args, span: _ } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(arg)?);
                }
                self.call_builtin(name, &values)
            }
        }
    }

    fn call_builtin(&self, name: &str, args: &[Value]) -> EResult<Value> {
        let dim = |args: &[Value]| -> EResult<usize> {
            let d = args[0].as_i64();
            if (0..3).contains(&d) {
                Ok(d as usize)
            } else {
                Err(Fault::new(format!("work-item dimension {d} out of range in '{name}'")))
            }
        };

        Ok(match name {
            "get_global_id" => Value::Int(self.pos.global[dim(args)?] as i64),
            "get_local_id" => Value::Int(self.pos.local[dim(args)?] as i64),
            "get_group_id" => Value::Int(self.pos.group[dim(args)?] as i64),
            "get_global_size" => Value::Int(self.shape.global[dim(args)?] as i64),
            "get_local_size" => Value::Int(self.shape.local[dim(args)?] as i64),
            "get_num_groups" => Value::Int(self.shape.groups[dim(args)?] as i64),
            "sqrt" => Value::Float(args[0].as_f64().sqrt()),
            "fabs" => Value::Float(args[0].as_f64().abs()),
            "exp" => Value::Float(args[0].as_f64().exp()),
            "log" => Value::Float(args[0].as_f64().ln()),
            "sin" => Value::Float(args[0].as_f64().sin()),
            "cos" => Value::Float(args[0].as_f64().cos()),
            "fmin" => Value::Float(args[0].as_f64().min(args[1].as_f64())),
            "fmax" => Value::Float(args[0].as_f64().max(args[1].as_f64())),
            "pow" => Value::Float(args[0].as_f64().powf(args[1].as_f64())),
            _ => return Err(Fault::new(format!("unknown function '{name}'"))),
        })
    }
}

fn apply_binop(op: BinOp, lhs: Value, rhs: Value) -> EResult<Value> {
    let float = lhs.is_float() || rhs.is_float();

    if op.integer_only() && float {
        return Err(Fault::new("operator requires integer operands"));
    }

    Ok(match op {
        BinOp::Add if float => Value::Float(lhs.as_f64() + rhs.as_f64()),
        BinOp::Sub if float => Value::Float(lhs.as_f64() - rhs.as_f64()),
        BinOp::Mul if float => Value::Float(lhs.as_f64() * rhs.as_f64()),
        BinOp::Div if float => Value::Float(lhs.as_f64() / rhs.as_f64()),
        BinOp::Add => Value::Int(lhs.as_i64().wrapping_add(rhs.as_i64())),
        BinOp::Sub => Value::Int(lhs.as_i64().wrapping_sub(rhs.as_i64())),
        BinOp::Mul => Value::Int(lhs.as_i64().wrapping_mul(rhs.as_i64())),
        BinOp::Div => {
            let divisor = rhs.as_i64();
            if divisor == 0 {
                return Err(Fault::new("integer division by zero"));
            }
            Value::Int(lhs.as_i64().wrapping_div(divisor))
        }
        BinOp::Rem => {
            let divisor = rhs.as_i64();
            if divisor == 0 {
                return Err(Fault::new("integer remainder by zero"));
            }
            Value::Int(lhs.as_i64().wrapping_rem(divisor))
        }
        BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge | BinOp::Eq | BinOp::Ne => {
            let holds = if float {
                let (l, r) = (lhs.as_f64(), rhs.as_f64());
                match op {
                    BinOp::Lt => l < r,
                    BinOp::Gt => l > r,
                    BinOp::Le => l <= r,
                    BinOp::Ge => l >= r,
                    BinOp::Eq => l == r,
                    _ => l != r,
                }
            } else {
                let (l, r) = (lhs.as_i64(), rhs.as_i64());
                match op {
                    BinOp::Lt => l < r,
                    BinOp::Gt => l > r,
                    BinOp::Le => l <= r,
                    BinOp::Ge => l >= r,
                    BinOp::Eq => l == r,
                    _ => l != r,
                }
            };
            Value::Int(holds as i64)
        }
        BinOp::BitAnd => Value::Int(lhs.as_i64() & rhs.as_i64()),
        BinOp::BitOr => Value::Int(lhs.as_i64() | rhs.as_i64()),
        BinOp::BitXor => Value::Int(lhs.as_i64() ^ rhs.as_i64()),
        BinOp::Shl => Value::Int(lhs.as_i64().wrapping_shl(rhs.as_i64() as u32 & 63)),
        BinOp::Shr => Value::Int(lhs.as_i64().wrapping_shr(rhs.as_i64() as u32 & 63)),
        BinOp::And | BinOp::Or => unreachable!("short-circuited in eval"),
    })
}
