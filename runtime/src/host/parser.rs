//! Recursive-descent parser for the kernel language.
//!
//! Parsing never bails on the first problem: statement-level errors are
//! recorded and the parser resynchronizes at the next `;` or `}`, top-level
//! errors at the next `__kernel`, so one build surfaces as many diagnostics
//! as possible.

use harrow_device::ParamKind;
use harrow_dtype::ScalarType;

use super::ast::{AssignTarget, BinOp, Block, Expr, KernelDef, ParamDecl, Span, Stmt, UnOp};
use super::diag::Diag;
use super::lexer::{Tok, lex};

/// Parse kernel source. Returns every definition that parsed cleanly plus
/// all collected diagnostics; the build fails iff diagnostics are non-empty.
pub fn parse(source: &str) -> (Vec<KernelDef>, Vec<Diag>) {
    let mut toks = Vec::new();
    let mut diags = Vec::new();

    for (tok, span) in lex(source) {
        match tok {
            Ok(tok) => toks.push((tok, span)),
            Err(()) => diags.push(Diag::new(span, "unrecognized token")),
        }
    }

    if source.trim().is_empty() {
        diags.push(Diag::new(Span::new(0, 0), "kernel source is empty"));
        return (Vec::new(), diags);
    }

    let end = Span::new(source.len(), source.len());
    let mut parser = Parser { toks, pos: 0, diags, end };
    let kernels = parser.parse_program();
    (kernels, parser.diags)
}

/// Marker for an already-recorded parse error; the caller resynchronizes.
struct Abort;

type PResult<T> = Result<T, Abort>;

struct Parser {
    toks: Vec<(Tok, Span)>,
    pos: usize,
    diags: Vec<Diag>,
    /// Zero-width span at end of input, for EOF diagnostics.
    end: Span,
}

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos).map(|(t, _)| t)
    }

    fn peek2(&self) -> Option<&Tok> {
        self.toks.get(self.pos + 1).map(|(t, _)| t)
    }

    fn here(&self) -> Span {
        self.toks.get(self.pos).map_or(self.end, |(_, s)| *s)
    }

    fn prev_span(&self) -> Span {
        self.toks.get(self.pos.saturating_sub(1)).map_or(self.end, |(_, s)| *s)
    }

    fn advance(&mut self) -> Option<(Tok, Span)> {
        let item = self.toks.get(self.pos).cloned();
        if item.is_some() {
            self.pos += 1;
        }
        item
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.peek() == Some(tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn error<T>(&mut self, span: Span, message: impl Into<String>) -> PResult<T> {
        self.diags.push(Diag::new(span, message));
        Err(Abort)
    }

    fn expect(&mut self, tok: Tok, what: &str) -> PResult<Span> {
        if self.peek() == Some(&tok) {
            let span = self.here();
            self.pos += 1;
            Ok(span)
        } else {
            let found = self.peek().map_or_else(|| "end of input".to_string(), |t| t.to_string());
            let span = self.here();
            self.error(span, format!("expected {what}, found {found}"))
        }
    }

    fn expect_ident(&mut self, what: &str) -> PResult<(String, Span)> {
        match self.peek() {
            Some(Tok::Ident(_)) => {
                let Some((Tok::Ident(name), span)) = self.advance() else { unreachable!() };
                Ok((name, span))
            }
            other => {
                let found = other.map_or_else(|| "end of input".to_string(), |t| t.to_string());
                let span = self.here();
                self.error(span, format!("expected {what}, found {found}"))
            }
        }
    }

    // ---- top level ------------------------------------------------------

    fn parse_program(&mut self) -> Vec<KernelDef> {
        let mut kernels = Vec::new();

        while self.peek().is_some() {
            if self.peek() == Some(&Tok::Kernel) {
                match self.parse_kernel() {
                    Ok(def) => kernels.push(def),
                    Err(Abort) => self.sync_to_kernel(),
                }
            } else {
                let span = self.here();
                let found = self.peek().expect("peeked Some").to_string();
                self.diags
                    .push(Diag::new(span, format!("expected '__kernel' at top level, found {found}")));
                self.sync_to_kernel();
            }
        }

        kernels
    }

    fn sync_to_kernel(&mut self) {
        while let Some(tok) = self.peek() {
            if tok == &Tok::Kernel {
                return;
            }
            self.pos += 1;
        }
    }

    fn parse_kernel(&mut self) -> PResult<KernelDef> {
        self.expect(Tok::Kernel, "'__kernel'")?;
        self.expect(Tok::Void, "'void' (kernels do not return values)")?;
        let (name, name_span) = self.expect_ident("kernel name")?;

        self.expect(Tok::LParen, "'('")?;
        let mut params = Vec::new();
        if !self.eat(&Tok::RParen) {
            loop {
                params.push(self.parse_param()?);
                if self.eat(&Tok::Comma) {
                    continue;
                }
                self.expect(Tok::RParen, "')' after parameter list")?;
                break;
            }
        }

        let body = self.parse_block()?;
        Ok(KernelDef { name, name_span, params, body })
    }

    fn parse_param(&mut self) -> PResult<ParamDecl> {
        let start = self.here();
        let mut global = false;
        let mut local = false;
        let mut constant = false;

        loop {
            match self.peek() {
                Some(Tok::Global) => {
                    global = true;
                    self.pos += 1;
                }
                Some(Tok::Local) => {
                    local = true;
                    self.pos += 1;
                }
                Some(Tok::Const) => {
                    constant = true;
                    self.pos += 1;
                }
                _ => break,
            }
        }

        let (ty_name, ty_span) = self.expect_ident("parameter type")?;
        let Some(elem) = ScalarType::from_keyword(&ty_name) else {
            return self.error(ty_span, format!("unknown type '{ty_name}'"));
        };

        let pointer = self.eat(&Tok::Star);
        let (name, name_span) = self.expect_ident("parameter name")?;
        let span = start.to(name_span);

        let kind = match (global, local, pointer) {
            (true, true, _) => {
                return self.error(span, "parameter cannot be both '__global' and '__local'");
            }
            (true, false, true) => ParamKind::GlobalPtr { elem, readonly: constant },
            (true, false, false) => {
                return self.error(span, "'__global' parameter must be a pointer");
            }
            (false, true, true) => {
                if constant {
                    return self.error(span, "'__local' parameter cannot be 'const'");
                }
                ParamKind::LocalPtr { elem }
            }
            (false, true, false) => {
                return self.error(span, "'__local' parameter must be a pointer");
            }
            (false, false, true) => {
                return self.error(span, "pointer parameter needs an address space ('__global' or '__local')");
            }
            (false, false, false) => ParamKind::Scalar(elem),
        };

        Ok(ParamDecl { name, kind, span })
    }

    // ---- statements -----------------------------------------------------

    fn parse_block(&mut self) -> PResult<Block> {
        self.expect(Tok::LBrace, "'{'")?;
        let mut stmts = Vec::new();

        loop {
            match self.peek() {
                None => {
                    let span = self.end;
                    return self.error(span, "unexpected end of input inside a block ('}' missing)");
                }
                Some(Tok::RBrace) => {
                    self.pos += 1;
                    return Ok(Block { stmts });
                }
                Some(_) => match self.parse_stmt() {
                    Ok(stmt) => stmts.push(stmt),
                    Err(Abort) => self.sync_stmt(),
                },
            }
        }
    }

    /// Skip to just past the next `;`, or stop before `}`/end of input.
    fn sync_stmt(&mut self) {
        while let Some(tok) = self.peek() {
            match tok {
                Tok::Semi => {
                    self.pos += 1;
                    return;
                }
                Tok::RBrace => return,
                _ => self.pos += 1,
            }
        }
    }

    fn parse_stmt(&mut self) -> PResult<Stmt> {
        match self.peek() {
            Some(Tok::If) => self.parse_if(),
            Some(Tok::For) => self.parse_for(),
            Some(Tok::Return) => {
                self.pos += 1;
                self.expect(Tok::Semi, "';' after 'return'")?;
                Ok(Stmt::Return)
            }
            Some(Tok::Ident(name)) if name == "barrier" && self.peek2() == Some(&Tok::LParen) => {
                self.parse_barrier()
            }
            _ => {
                let stmt = self.parse_simple_stmt()?;
                self.expect(Tok::Semi, "';'")?;
                Ok(stmt)
            }
        }
    }

    /// A declaration or assignment, without the trailing `;` (shared with
    /// `for` headers).
    fn parse_simple_stmt(&mut self) -> PResult<Stmt> {
        // A type keyword followed by an identifier starts a declaration.
        if let (Some(Tok::Ident(first)), Some(Tok::Ident(_))) = (self.peek(), self.peek2())
            && let Some(ty) = ScalarType::from_keyword(first)
        {
            let start = self.here();
            self.pos += 1;
            let (name, name_span) = self.expect_ident("variable name")?;
            let init = if self.eat(&Tok::Assign) { Some(self.parse_expr()?) } else { None };
            return Ok(Stmt::Decl { ty, name, init, span: start.to(name_span) });
        }

        let target = self.parse_assign_target()?;
        let target_span = self.prev_span();

        let (op, value) = match self.peek() {
            Some(Tok::Assign) => {
                self.pos += 1;
                (None, self.parse_expr()?)
            }
            Some(Tok::PlusAssign) => {
                self.pos += 1;
                (Some(BinOp::Add), self.parse_expr()?)
            }
            Some(Tok::MinusAssign) => {
                self.pos += 1;
                (Some(BinOp::Sub), self.parse_expr()?)
            }
            Some(Tok::StarAssign) => {
                self.pos += 1;
                (Some(BinOp::Mul), self.parse_expr()?)
            }
            Some(Tok::SlashAssign) => {
                self.pos += 1;
                (Some(BinOp::Div), self.parse_expr()?)
            }
            Some(Tok::PlusPlus) => {
                let span = self.here();
                self.pos += 1;
                (Some(BinOp::Add), Expr::IntLit { value: 1, span })
            }
            Some(Tok::MinusMinus) => {
                let span = self.here();
                self.pos += 1;
                (Some(BinOp::Sub), Expr::IntLit { value: 1, span })
            }
            _ => {
                let span = self.here();
                let found = self.peek().map_or_else(|| "end of input".to_string(), |t| t.to_string());
                return self.error(span, format!("expected an assignment operator, found {found}"));
            }
        };

        let span = target_span.to(value.span());
        Ok(Stmt::Assign { target, op, value, span })
    }

    fn parse_assign_target(&mut self) -> PResult<AssignTarget> {
        let (name, span) = self.expect_ident("assignment target")?;

        if self.eat(&Tok::LBracket) {
            let index = self.parse_expr()?;
            self.expect(Tok::RBracket, "']'")?;
            Ok(AssignTarget::Index { base: name, base_span: span, index })
        } else {
            Ok(AssignTarget::Var { name, span })
        }
    }

    fn parse_if(&mut self) -> PResult<Stmt> {
        self.expect(Tok::If, "'if'")?;
        self.expect(Tok::LParen, "'(' after 'if'")?;
        let cond = self.parse_expr()?;
        self.expect(Tok::RParen, "')'")?;

        let then_body = self.parse_block_or_single()?;
        let else_body = if self.eat(&Tok::Else) {
            if self.peek() == Some(&Tok::If) {
                // else-if chains nest as a single-statement else block.
                Some(Block { stmts: vec![self.parse_if()?] })
            } else {
                Some(self.parse_block_or_single()?)
            }
        } else {
            None
        };

        Ok(Stmt::If { cond, then_body, else_body })
    }

    fn parse_for(&mut self) -> PResult<Stmt> {
        self.expect(Tok::For, "'for'")?;
        self.expect(Tok::LParen, "'(' after 'for'")?;
        let init = self.parse_simple_stmt()?;
        self.expect(Tok::Semi, "';' in 'for' header")?;
        let cond = self.parse_expr()?;
        self.expect(Tok::Semi, "';' in 'for' header")?;
        let step = self.parse_simple_stmt()?;
        self.expect(Tok::RParen, "')'")?;
        let body = self.parse_block_or_single()?;

        Ok(Stmt::For { init: Box::new(init), cond, step: Box::new(step), body })
    }

    fn parse_block_or_single(&mut self) -> PResult<Block> {
        if self.peek() == Some(&Tok::LBrace) {
            self.parse_block()
        } else {
            Ok(Block { stmts: vec![self.parse_stmt()?] })
        }
    }

    fn parse_barrier(&mut self) -> PResult<Stmt> {
        let (_, span) = self.expect_ident("'barrier'")?;
        self.expect(Tok::LParen, "'('")?;

        // Fence flags (`CLK_LOCAL_MEM_FENCE` etc.) are accepted and ignored.
        let mut depth = 1usize;
        while depth > 0 {
            match self.advance() {
                Some((Tok::LParen, _)) => depth += 1,
                Some((Tok::RParen, _)) => depth -= 1,
                Some(_) => {}
                None => {
                    let at = self.end;
                    return self.error(at, "unexpected end of input in 'barrier(...)'");
                }
            }
        }
        self.expect(Tok::Semi, "';' after 'barrier(...)'")?;

        Ok(Stmt::Barrier { span })
    }

    // ---- expressions ----------------------------------------------------

    fn parse_expr(&mut self) -> PResult<Expr> {
        self.parse_binary(0)
    }

    /// Precedence-climbing over the binary operator tiers.
    fn parse_binary(&mut self, min_tier: usize) -> PResult<Expr> {
        const TIERS: &[&[(Tok, BinOp)]] = &[
            &[(Tok::OrOr, BinOp::Or)],
            &[(Tok::AndAnd, BinOp::And)],
            &[(Tok::Pipe, BinOp::BitOr)],
            &[(Tok::Caret, BinOp::BitXor)],
            &[(Tok::Amp, BinOp::BitAnd)],
            &[(Tok::EqEq, BinOp::Eq), (Tok::Ne, BinOp::Ne)],
            &[(Tok::Lt, BinOp::Lt), (Tok::Gt, BinOp::Gt), (Tok::Le, BinOp::Le), (Tok::Ge, BinOp::Ge)],
            &[(Tok::Shl, BinOp::Shl), (Tok::Shr, BinOp::Shr)],
            &[(Tok::Plus, BinOp::Add), (Tok::Minus, BinOp::Sub)],
            &[(Tok::Star, BinOp::Mul), (Tok::Slash, BinOp::Div), (Tok::Percent, BinOp::Rem)],
        ];

        if min_tier == TIERS.len() {
            return self.parse_unary();
        }

        let mut lhs = self.parse_binary(min_tier + 1)?;
        loop {
            let Some(tok) = self.peek() else { break };
            let Some(&(_, op)) = TIERS[min_tier].iter().find(|(t, _)| t == tok) else { break };
            self.pos += 1;

            let rhs = self.parse_binary(min_tier + 1)?;
            let span = lhs.span().to(rhs.span());
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs), span };
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        match self.peek() {
            Some(Tok::Minus) => {
                let start = self.here();
                self.pos += 1;
                let operand = self.parse_unary()?;
                let span = start.to(operand.span());
                Ok(Expr::Unary { op: UnOp::Neg, operand: Box::new(operand), span })
            }
            Some(Tok::Not) => {
                let start = self.here();
                self.pos += 1;
                let operand = self.parse_unary()?;
                let span = start.to(operand.span());
                Ok(Expr::Unary { op: UnOp::Not, operand: Box::new(operand), span })
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        match self.peek().cloned() {
            Some(Tok::IntLit(value)) => {
                let span = self.here();
                self.pos += 1;
                Ok(Expr::IntLit { value, span })
            }
            Some(Tok::FloatLit(value)) => {
                let span = self.here();
                self.pos += 1;
                Ok(Expr::FloatLit { value, span })
            }
            Some(Tok::LParen) => {
                let start = self.here();
                self.pos += 1;

                // `(type) operand` is a cast; anything else is grouping.
                if let Some(Tok::Ident(name)) = self.peek()
                    && let Some(ty) = ScalarType::from_keyword(name)
                    && self.peek2() == Some(&Tok::RParen)
                {
                    self.pos += 2;
                    let operand = self.parse_unary()?;
                    let span = start.to(operand.span());
                    return Ok(Expr::Cast { ty, operand: Box::new(operand), span });
                }

                let inner = self.parse_expr()?;
                self.expect(Tok::RParen, "')'")?;
                Ok(inner)
            }
            Some(Tok::Ident(name)) => {
                let span = self.here();
                self.pos += 1;

                match self.peek() {
                    Some(Tok::LParen) => {
                        self.pos += 1;
                        let mut args = Vec::new();
                        if !self.eat(&Tok::RParen) {
                            loop {
                                args.push(self.parse_expr()?);
                                if self.eat(&Tok::Comma) {
                                    continue;
                                }
                                self.expect(Tok::RParen, "')' after call arguments")?;
                                break;
                            }
                        }
                        let end = self.prev_span();
                        Ok(Expr::Call { name, args, span: span.to(end) })
                    }
                    Some(Tok::LBracket) => {
                        self.pos += 1;
                        let index = self.parse_expr()?;
                        let end = self.expect(Tok::RBracket, "']'")?;
                        Ok(Expr::Index {
                            base: name,
                            base_span: span,
                            index: Box::new(index),
                            span: span.to(end),
                        })
                    }
                    _ => Ok(Expr::Var { name, span }),
                }
            }
            other => {
                let found = other.map_or_else(|| "end of input".to_string(), |t| t.to_string());
                let span = self.here();
                self.error(span, format!("expected an expression, found {found}"))
            }
        }
    }
}
