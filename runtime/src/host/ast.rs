//! Syntax tree for the host driver's kernel language.

use harrow_device::{KernelParam, KernelSignature, ParamKind};
use harrow_dtype::ScalarType;

/// Byte range into the original source, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn to(self, other: Span) -> Self {
        Self { start: self.start, end: other.end }
    }
}

/// One `__kernel void name(...) { ... }` definition.
#[derive(Debug, Clone)]
pub struct KernelDef {
    pub name: String,
    pub name_span: Span,
    pub params: Vec<ParamDecl>,
    pub body: Block,
}

impl KernelDef {
    pub fn signature(&self) -> KernelSignature {
        KernelSignature {
            name: self.name.clone(),
            params: self
                .params
                .iter()
                .map(|p| KernelParam { name: p.name.clone(), kind: p.kind.clone() })
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParamDecl {
    pub name: String,
    pub kind: ParamKind,
    pub span: Span,
}

#[derive(Debug, Clone, Default)]
pub struct Block {
    pub stmts: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    /// `int i = expr;`
    Decl { ty: ScalarType, name: String, init: Option<Expr>, span: Span },
    /// `target = expr;` and the compound forms (`+=` etc. carry `op`).
    Assign { target: AssignTarget, op: Option<BinOp>, value: Expr, span: Span },
    If { cond: Expr, then_body: Block, else_body: Option<Block> },
    /// C-style `for (init; cond; step) body`.
    For { init: Box<Stmt>, cond: Expr, step: Box<Stmt>, body: Block },
    /// Work-group barrier. Fence flags are accepted and ignored.
    Barrier { span: Span },
    Return,
}

#[derive(Debug, Clone)]
pub enum AssignTarget {
    Var { name: String, span: Span },
    /// `base[index]` where `base` is a pointer parameter.
    Index { base: String, base_span: Span, index: Expr },
}

#[derive(Debug, Clone)]
pub enum Expr {
    IntLit { value: i64, span: Span },
    FloatLit { value: f64, span: Span },
    Var { name: String, span: Span },
    Unary { op: UnOp, operand: Box<Expr>, span: Span },
    Binary { op: BinOp, lhs: Box<Expr>, rhs: Box<Expr>, span: Span },
    Cast { ty: ScalarType, operand: Box<Expr>, span: Span },
    Index { base: String, base_span: Span, index: Box<Expr>, span: Span },
    Call { name: String, args: Vec<Expr>, span: Span },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Self::IntLit { span, .. }
            | Self::FloatLit { span, .. }
            | Self::Var { span, .. }
            | Self::Unary { span, .. }
            | Self::Binary { span, .. }
            | Self::Cast { span, .. }
            | Self::Index { span, .. }
            | Self::Call { span, .. } => *span,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl BinOp {
    /// Whether the operation only makes sense on integer operands.
    pub fn integer_only(&self) -> bool {
        matches!(self, Self::Rem | Self::BitAnd | Self::BitOr | Self::BitXor | Self::Shl | Self::Shr)
    }
}
