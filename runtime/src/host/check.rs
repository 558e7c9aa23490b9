//! Semantic checks over parsed kernels.
//!
//! Everything that can be rejected before execution is rejected here, so the
//! build log catches caller mistakes early: unknown identifiers, misused
//! pointer parameters, stores through `const`, unknown builtins. The checker
//! also records per-kernel facts the interpreter needs (barrier usage).

use std::collections::{HashMap, HashSet};

use harrow_device::ParamKind;

use super::ast::{AssignTarget, Block, Expr, KernelDef, Stmt};
use super::diag::Diag;

/// Facts about one kernel gathered during checking.
#[derive(Debug, Clone, Copy, Default)]
pub struct KernelMeta {
    /// Kernels that call `barrier()` get lockstep work-item execution.
    pub uses_barrier: bool,
}

/// Builtins callable from kernel expressions, with their arity.
pub fn builtin_arity(name: &str) -> Option<usize> {
    match name {
        "get_global_id" | "get_local_id" | "get_group_id" | "get_global_size" | "get_local_size"
        | "get_num_groups" => Some(1),
        "sqrt" | "fabs" | "exp" | "log" | "sin" | "cos" => Some(1),
        "fmin" | "fmax" | "pow" => Some(2),
        _ => None,
    }
}

/// Check all kernels. Metas are positionally aligned with `kernels`.
pub fn check(kernels: &[KernelDef]) -> (Vec<KernelMeta>, Vec<Diag>) {
    let mut diags = Vec::new();
    let mut seen = HashMap::new();

    for kernel in kernels {
        if seen.insert(kernel.name.clone(), ()).is_some() {
            diags.push(Diag::new(
                kernel.name_span,
                format!("duplicate kernel name '{}'", kernel.name),
            ));
        }
    }

    let metas = kernels
        .iter()
        .map(|kernel| {
            let mut checker = Checker::new(kernel, &mut diags);
            checker.run()
        })
        .collect();

    (metas, diags)
}

struct Checker<'a> {
    kernel: &'a KernelDef,
    params: HashMap<&'a str, &'a ParamKind>,
    /// Innermost scope last; holds declared scalar variables.
    scopes: Vec<HashSet<&'a str>>,
    diags: &'a mut Vec<Diag>,
    meta: KernelMeta,
}

impl<'a> Checker<'a> {
    fn new(kernel: &'a KernelDef, diags: &'a mut Vec<Diag>) -> Self {
        Self { kernel, params: HashMap::new(), scopes: Vec::new(), diags, meta: KernelMeta::default() }
    }

    fn run(&mut self) -> KernelMeta {
        let kernel = self.kernel;
        for param in &kernel.params {
            if self.params.insert(param.name.as_str(), &param.kind).is_some() {
                self.diags.push(Diag::new(
                    param.span,
                    format!("duplicate parameter name '{}'", param.name),
                ));
            }
        }

        self.scopes.push(HashSet::new());
        self.check_block(&kernel.body);
        self.scopes.pop();

        self.meta
    }

    fn is_declared(&self, name: &str) -> bool {
        self.scopes.iter().any(|scope| scope.contains(name))
    }

    fn check_block(&mut self, block: &'a Block) {
        self.scopes.push(HashSet::new());
        for stmt in &block.stmts {
            self.check_stmt(stmt);
        }
        self.scopes.pop();
    }

    fn check_stmt(&mut self, stmt: &'a Stmt) {
        match stmt {
            Stmt::Decl { name, init, span, .. } => {
                if let Some(init) = init {
                    self.check_expr(init);
                }
                if self.params.contains_key(name.as_str()) {
                    self.diags.push(Diag::new(*span, format!("'{name}' shadows a parameter")));
                } else if !self.scopes.last_mut().expect("scope stack non-empty").insert(name.as_str()) {
                    self.diags
                        .push(Diag::new(*span, format!("'{name}' is already declared in this scope")));
                }
            }
            Stmt::Assign { target, value, .. } => {
                self.check_expr(value);
                self.check_target(target);
            }
            Stmt::If { cond, then_body, else_body } => {
                self.check_expr(cond);
                self.check_block(then_body);
                if let Some(else_body) = else_body {
                    self.check_block(else_body);
                }
            }
            Stmt::For { init, cond, step, body } => {
                // The induction variable scopes over the whole header + body.
                self.scopes.push(HashSet::new());
                self.check_stmt(init);
                self.check_expr(cond);
                self.check_stmt(step);
                self.check_block(body);
                self.scopes.pop();
            }
            Stmt::Barrier { .. } => {
                self.meta.uses_barrier = true;
            }
            Stmt::Return => {}
        }
    }

    fn check_target(&mut self, target: &'a AssignTarget) {
        match target {
            AssignTarget::Var { name, span } => {
                if let Some(kind) = self.params.get(name.as_str()) {
                    if !matches!(kind, ParamKind::Scalar(_)) {
                        self.diags.push(Diag::new(
                            *span,
                            format!("cannot reassign pointer parameter '{name}'"),
                        ));
                    }
                } else if !self.is_declared(name) {
                    self.diags
                        .push(Diag::new(*span, format!("use of undeclared identifier '{name}'")));
                }
            }
            AssignTarget::Index { base, base_span, index } => {
                self.check_expr(index);
                match self.params.get(base.as_str()) {
                    Some(ParamKind::GlobalPtr { readonly: true, .. }) => {
                        self.diags.push(Diag::new(
                            *base_span,
                            format!("cannot store through 'const' pointer parameter '{base}'"),
                        ));
                    }
                    Some(ParamKind::GlobalPtr { .. } | ParamKind::LocalPtr { .. }) => {}
                    Some(ParamKind::Scalar(_)) => {
                        self.diags.push(Diag::new(
                            *base_span,
                            format!("'{base}' is a scalar parameter and cannot be indexed"),
                        ));
                    }
                    None => {
                        self.diags.push(Diag::new(
                            *base_span,
                            format!("use of undeclared identifier '{base}'"),
                        ));
                    }
                }
            }
        }
    }

    fn check_expr(&mut self, expr: &'a Expr) {
        match expr {
            Expr::IntLit { .. } | Expr::FloatLit { .. } => {}
            Expr::Var { name, span } => match self.params.get(name.as_str()) {
                Some(ParamKind::Scalar(_)) => {}
                Some(_) => {
                    self.diags.push(Diag::new(
                        *span,
                        format!("pointer parameter '{name}' must be indexed"),
                    ));
                }
                None => {
                    if !self.is_declared(name) {
                        self.diags
                            .push(Diag::new(*span, format!("use of undeclared identifier '{name}'")));
                    }
                }
            },
            Expr::Unary { operand, .. } => self.check_expr(operand),
            Expr::Binary { lhs, rhs, .. } => {
                self.check_expr(lhs);
                self.check_expr(rhs);
            }
            Expr::Cast { operand, .. } => self.check_expr(operand),
            Expr::Index { base, base_span, index, .. } => {
                self.check_expr(index);
                match self.params.get(base.as_str()) {
                    Some(ParamKind::GlobalPtr { .. } | ParamKind::LocalPtr { .. }) => {}
                    Some(ParamKind::Scalar(_)) => {
                        self.diags.push(Diag::new(
                            *base_span,
                            format!("'{base}' is a scalar parameter and cannot be indexed"),
                        ));
                    }
                    None => {
                        self.diags.push(Diag::new(
                            *base_span,
                            format!("use of undeclared identifier '{base}'"),
                        ));
                    }
                }
            }
            Expr::Call { name, args, span } => {
                for arg in args {
                    self.check_expr(arg);
                }
                if name == "barrier" {
                    self.diags.push(Diag::new(
                        *span,
                        "'barrier' is a statement, not an expression",
                    ));
                    return;
                }
                match builtin_arity(name) {
                    Some(arity) if arity == args.len() => {}
                    Some(arity) => {
                        self.diags.push(Diag::new(
                            *span,
                            format!("'{name}' takes {arity} argument(s), {} given", args.len()),
                        ));
                    }
                    None => {
                        self.diags
                            .push(Diag::new(*span, format!("unknown function '{name}'")));
                    }
                }
            }
        }
    }
}
