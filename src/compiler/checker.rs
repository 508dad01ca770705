use std::collections::HashMap;

use tracing::debug;

use crate::{
    ast::{
        self, BinaryOp, Block, Expr, ExprKind, NodeId, Program, Stmt, StmtKind, TypeExpr, UnaryOp,
    },
    diagnostic::{DiagnosticKind, Diagnostics},
    format,
    token::Span,
    types::{TypeId, TypeTable},
};

use super::{
    resolver::Bindings,
    symbol_table::{SymbolKind, SymbolTable},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub params: Vec<TypeId>,
    pub ret: TypeId,
}

/// Output of the type checker.
#[derive(Debug, Default)]
pub struct TypeInfo {
    /// The type of every expression.
    pub expr_types: HashMap<NodeId, TypeId>,
    /// Indexed like `Program::procs`.
    pub signatures: Vec<Signature>,
}

pub struct Checker<'a> {
    types: &'a TypeTable,
    symbols: &'a mut SymbolTable,
    bindings: &'a Bindings,
    diagnostics: &'a mut Diagnostics,
    info: TypeInfo,
    current_ret: TypeId,
}

impl<'a> Checker<'a> {
    pub fn new(
        types: &'a TypeTable,
        symbols: &'a mut SymbolTable,
        bindings: &'a Bindings,
        diagnostics: &'a mut Diagnostics,
    ) -> Self {
        Self {
            types,
            symbols,
            bindings,
            diagnostics,
            info: TypeInfo::default(),
            current_ret: TypeId::VOID,
        }
    }

    pub fn check(mut self, program: &Program) -> TypeInfo {
        for proc in &program.procs {
            let signature = self.signature(proc);
            if let Some(symbol) = self.bindings.decls.get(&proc.id) {
                self.symbols.set_type(*symbol, signature.ret);
            }
            self.info.signatures.push(signature);
        }

        self.check_entry_point(program);

        for (proc, signature) in program.procs.iter().zip(self.info.signatures.clone()) {
            self.current_ret = signature.ret;
            self.check_stmts(&proc.body.stmts);

            if signature.ret != TypeId::VOID
                && signature.ret != TypeId::ERROR
                && !ast::block_returns(&proc.body)
            {
                self.report(
                    DiagnosticKind::MissingReturn {
                        proc_name: proc.name.name.clone(),
                        ty: self.name(signature.ret).to_string(),
                    },
                    proc.name.span,
                );
            }
        }

        debug!(expressions = self.info.expr_types.len(), "checked types");
        self.info
    }

    fn report(&mut self, kind: DiagnosticKind, span: Span) {
        self.diagnostics.report(kind, span);
    }

    fn name(&self, ty: TypeId) -> &'static str {
        self.types.name(ty)
    }

    fn resolve_type(&mut self, ty: &TypeExpr) -> TypeId {
        match self.types.lookup_name(&ty.name) {
            Some(id) => id,
            None => {
                self.report(
                    DiagnosticKind::UnknownType {
                        name: ty.name.clone(),
                    },
                    ty.span,
                );
                TypeId::ERROR
            }
        }
    }

    /// Resolves a type that must describe a value.
    fn resolve_value_type(&mut self, ty: &TypeExpr) -> TypeId {
        let id = self.resolve_type(ty);
        if id == TypeId::VOID {
            self.report(DiagnosticKind::VoidValue, ty.span);
            return TypeId::ERROR;
        }
        id
    }

    fn signature(&mut self, proc: &ast::Proc) -> Signature {
        let mut params = Vec::with_capacity(proc.params.len());
        for param in &proc.params {
            let ty = self.resolve_value_type(&param.ty);
            if let Some(symbol) = self.bindings.decls.get(&param.id) {
                self.symbols.set_type(*symbol, ty);
            }
            params.push(ty);
        }

        let ret = match &proc.ret {
            Some(ty) => self.resolve_type(ty),
            None => TypeId::VOID,
        };

        Signature { params, ret }
    }

    fn check_entry_point(&mut self, program: &Program) {
        let Some(index) = program.procs.iter().position(|proc| proc.name.name == "main") else {
            self.report(DiagnosticKind::MissingEntryPoint, Span::default());
            return;
        };

        let proc = &program.procs[index];
        let takes_params = !self.info.signatures[index].params.is_empty();
        let ret = self.info.signatures[index].ret;
        if takes_params {
            self.report(
                DiagnosticKind::InvalidEntryPoint {
                    reason: "`main` must not take parameters",
                },
                proc.name.span,
            );
        }
        if ret != TypeId::VOID {
            self.report(
                DiagnosticKind::InvalidEntryPoint {
                    reason: "`main` must not return a value",
                },
                proc.name.span,
            );
        }
    }

    /// Reports unless `found` is `expected`. The poison type matches
    /// anything.
    fn expect_type(&mut self, expected: TypeId, found: TypeId, span: Span) {
        if expected == TypeId::ERROR || found == TypeId::ERROR || expected == found {
            return;
        }

        if found == TypeId::VOID {
            self.report(DiagnosticKind::VoidValue, span);
        } else {
            self.report(
                DiagnosticKind::UnexpectedType {
                    expected: self.name(expected).to_string(),
                    found: self.name(found).to_string(),
                },
                span,
            );
        }
    }

    fn check_block(&mut self, block: &Block) {
        self.check_stmts(&block.stmts);
    }

    fn check_stmts(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.check_stmt(stmt);
        }
    }

    fn check_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Let { id, ty, init, .. } => {
                let declared = ty.as_ref().map(|ty| self.resolve_value_type(ty));
                let found = self.check_expr(init, declared);

                let ty = match declared {
                    Some(declared) => {
                        self.expect_type(declared, found, init.span);
                        declared
                    }
                    None if found == TypeId::VOID => {
                        self.report(DiagnosticKind::VoidValue, init.span);
                        TypeId::ERROR
                    }
                    None => found,
                };

                if let Some(symbol) = self.bindings.decls.get(id) {
                    self.symbols.set_type(*symbol, ty);
                }
            }
            StmtKind::Assign { id, value, .. } => {
                let target = self
                    .bindings
                    .refs
                    .get(id)
                    .map(|symbol| self.symbols.get(*symbol))
                    .filter(|symbol| symbol.kind.slot().is_some())
                    .map(|symbol| symbol.ty.unwrap_or(TypeId::ERROR));

                let found = self.check_expr(value, target);
                if let Some(target) = target {
                    self.expect_type(target, found, value.span);
                }
            }
            StmtKind::If { cond, then, els } => {
                let found = self.check_expr(cond, Some(TypeId::BOOL));
                self.expect_type(TypeId::BOOL, found, cond.span);

                self.check_block(then);
                if let Some(els) = els {
                    self.check_block(els);
                }
            }
            StmtKind::For {
                id,
                start,
                end,
                body,
                ..
            } => {
                let (start_ty, end_ty) = self.check_operands(start, end, None);
                let ty = self.range_type(start_ty, end_ty, start.span.to(end.span));

                if let Some(symbol) = self.bindings.decls.get(id) {
                    self.symbols.set_type(*symbol, ty);
                }
                self.check_block(body);
            }
            StmtKind::Return(value) => {
                let expected = self.current_ret;
                let (found, span) = match value {
                    Some(value) => {
                        let context = (expected != TypeId::VOID).then_some(expected);
                        (self.check_expr(value, context), value.span)
                    }
                    None => (TypeId::VOID, stmt.span),
                };

                if expected != TypeId::ERROR && found != TypeId::ERROR && expected != found {
                    self.report(
                        DiagnosticKind::ReturnTypeMismatch {
                            expected: self.name(expected).to_string(),
                            found: self.name(found).to_string(),
                        },
                        span,
                    );
                }
            }
            StmtKind::Expr(expr) => {
                self.check_expr(expr, None);
            }
            StmtKind::Block(block) => self.check_block(block),
        }
    }

    fn range_type(&mut self, start: TypeId, end: TypeId, span: Span) -> TypeId {
        if start == TypeId::ERROR || end == TypeId::ERROR {
            return TypeId::ERROR;
        }
        if start == TypeId::VOID || end == TypeId::VOID {
            self.report(DiagnosticKind::VoidValue, span);
            return TypeId::ERROR;
        }
        if start != end {
            self.report(
                DiagnosticKind::TypeMismatch {
                    op: "..".to_string(),
                    left: self.name(start).to_string(),
                    right: self.name(end).to_string(),
                },
                span,
            );
            return TypeId::ERROR;
        }
        if !self.types.get(start).is_integer() {
            self.report(
                DiagnosticKind::InvalidOperand {
                    op: "..".to_string(),
                    ty: self.name(start).to_string(),
                },
                span,
            );
            return TypeId::ERROR;
        }
        start
    }

    /// Checks both operands of a binary operator or range. An untyped
    /// literal takes its type from the other side, so that side goes first.
    fn check_operands(
        &mut self,
        lhs: &Expr,
        rhs: &Expr,
        expected: Option<TypeId>,
    ) -> (TypeId, TypeId) {
        if lhs.is_untyped_literal() && !rhs.is_untyped_literal() {
            let rhs_ty = self.check_expr(rhs, expected);
            let lhs_ty = self.check_expr(lhs, Some(rhs_ty));
            (lhs_ty, rhs_ty)
        } else {
            let lhs_ty = self.check_expr(lhs, expected);
            let rhs_ty = self.check_expr(rhs, Some(lhs_ty));
            (lhs_ty, rhs_ty)
        }
    }

    fn check_expr(&mut self, expr: &Expr, expected: Option<TypeId>) -> TypeId {
        let ty = self.infer_expr(expr, expected);
        self.info.expr_types.insert(expr.id, ty);
        ty
    }

    /// Type of an integer literal, negated or not, checked against its range.
    fn literal_type(
        &mut self,
        expr: &Expr,
        value: u64,
        suffix: Option<&str>,
        negative: bool,
        expected: Option<TypeId>,
    ) -> TypeId {
        let ty = match suffix {
            Some(suffix) => self.types.lookup_name(suffix).unwrap_or(TypeId::ERROR),
            None => expected
                .filter(|ty| self.types.get(*ty).is_numeric())
                .unwrap_or(TypeId::DEFAULT_INT),
        };

        let range = self
            .types
            .get(ty)
            .int_range()
            // negating an unsigned value is reported by the caller
            .filter(|(min, _)| !(negative && *min == 0));
        if let Some((min, max)) = range {
            let value = if negative {
                -(value as i128)
            } else {
                value as i128
            };
            if value < min || value > max {
                let literal = if negative {
                    format!("-{}", value.unsigned_abs())
                } else {
                    value.to_string()
                };
                self.report(
                    DiagnosticKind::LiteralOutOfRange {
                        literal,
                        ty: self.name(ty).to_string(),
                    },
                    expr.span,
                );
            }
        }

        ty
    }

    fn infer_expr(&mut self, expr: &Expr, expected: Option<TypeId>) -> TypeId {
        match &expr.kind {
            ExprKind::Integer { value, suffix } => {
                self.literal_type(expr, *value, suffix.as_deref(), false, expected)
            }
            ExprKind::Float { .. } => TypeId::F64,
            ExprKind::String(_) => TypeId::STR,
            ExprKind::Bool(_) => TypeId::BOOL,
            ExprKind::Ident(name) => {
                let Some(symbol) = self.bindings.refs.get(&expr.id) else {
                    return TypeId::ERROR;
                };
                let (kind, ty) = {
                    let symbol = self.symbols.get(*symbol);
                    (symbol.kind, symbol.ty)
                };
                match kind {
                    SymbolKind::Builtin(_) | SymbolKind::Procedure { .. } => {
                        self.report(DiagnosticKind::NotAValue { name: name.clone() }, expr.span);
                        TypeId::ERROR
                    }
                    _ => ty.unwrap_or(TypeId::ERROR),
                }
            }
            ExprKind::Unary { op, operand } => self.infer_unary(expr, *op, operand, expected),
            ExprKind::Binary { op, lhs, rhs } => self.infer_binary(expr, *op, lhs, rhs, expected),
            ExprKind::Call { callee, args } => self.infer_call(expr, callee, args),
        }
    }

    fn infer_unary(
        &mut self,
        expr: &Expr,
        op: UnaryOp,
        operand: &Expr,
        expected: Option<TypeId>,
    ) -> TypeId {
        let operand_ty = match (op, &operand.kind) {
            // folded so that e.g. `-128i8` is in range
            (UnaryOp::Neg, ExprKind::Integer { value, suffix }) => {
                let ty = self.literal_type(operand, *value, suffix.as_deref(), true, expected);
                self.info.expr_types.insert(operand.id, ty);
                ty
            }
            (UnaryOp::Neg, _) => self.check_expr(operand, expected),
            (UnaryOp::Not, _) => self.check_expr(operand, Some(TypeId::BOOL)),
        };

        if operand_ty == TypeId::ERROR {
            return TypeId::ERROR;
        }
        if operand_ty == TypeId::VOID {
            self.report(DiagnosticKind::VoidValue, operand.span);
            return TypeId::ERROR;
        }

        let valid = match op {
            UnaryOp::Neg => self.types.get(operand_ty).is_negatable(),
            UnaryOp::Not => operand_ty == TypeId::BOOL,
        };
        if !valid {
            self.report(
                DiagnosticKind::InvalidOperand {
                    op: op.to_string(),
                    ty: self.name(operand_ty).to_string(),
                },
                expr.span,
            );
            return TypeId::ERROR;
        }

        operand_ty
    }

    fn infer_binary(
        &mut self,
        expr: &Expr,
        op: BinaryOp,
        lhs: &Expr,
        rhs: &Expr,
        expected: Option<TypeId>,
    ) -> TypeId {
        // comparisons and logic produce `bool` even when their operands are
        // broken
        let (result_on_error, operand_context) = if op.is_arithmetic() {
            (TypeId::ERROR, expected)
        } else if op.is_logical() {
            (TypeId::BOOL, Some(TypeId::BOOL))
        } else {
            (TypeId::BOOL, None)
        };

        let (lhs_ty, rhs_ty) = self.check_operands(lhs, rhs, operand_context);

        if lhs_ty == TypeId::ERROR || rhs_ty == TypeId::ERROR {
            return result_on_error;
        }
        for (ty, operand) in [(lhs_ty, lhs), (rhs_ty, rhs)] {
            if ty == TypeId::VOID {
                self.report(DiagnosticKind::VoidValue, operand.span);
                return result_on_error;
            }
        }

        if lhs_ty != rhs_ty {
            self.report(
                DiagnosticKind::TypeMismatch {
                    op: op.to_string(),
                    left: self.name(lhs_ty).to_string(),
                    right: self.name(rhs_ty).to_string(),
                },
                expr.span,
            );
            return result_on_error;
        }

        let operand = self.types.get(lhs_ty);
        let valid = if op.is_arithmetic() || op.is_ordering() {
            operand.is_numeric()
        } else if op.is_logical() {
            lhs_ty == TypeId::BOOL
        } else {
            true
        };
        if !valid {
            self.report(
                DiagnosticKind::InvalidOperand {
                    op: op.to_string(),
                    ty: self.name(lhs_ty).to_string(),
                },
                expr.span,
            );
            return result_on_error;
        }

        if op.is_arithmetic() {
            lhs_ty
        } else {
            TypeId::BOOL
        }
    }

    fn check_args(&mut self, args: &[Expr]) {
        for arg in args {
            let ty = self.check_expr(arg, None);
            if ty == TypeId::VOID {
                self.report(DiagnosticKind::VoidValue, arg.span);
            }
        }
    }

    fn infer_call(&mut self, expr: &Expr, callee: &ast::Ident, args: &[Expr]) -> TypeId {
        let Some(symbol) = self.bindings.refs.get(&expr.id) else {
            self.check_args(args);
            return TypeId::ERROR;
        };

        let kind = self.symbols.get(*symbol).kind;
        match kind {
            SymbolKind::Builtin(_) => {
                self.check_format_call(expr, callee, args);
                TypeId::VOID
            }
            SymbolKind::Procedure { index } => {
                let signature = self.info.signatures[index as usize].clone();

                if signature.params.len() != args.len() {
                    self.report(
                        DiagnosticKind::ArityMismatch {
                            callee: callee.name.clone(),
                            expected: signature.params.len(),
                            found: args.len(),
                        },
                        expr.span,
                    );
                    self.check_args(args);
                    return signature.ret;
                }

                for (index, (arg, param)) in args.iter().zip(&signature.params).enumerate() {
                    let found = self.check_expr(arg, Some(*param));
                    if found == TypeId::VOID {
                        self.report(DiagnosticKind::VoidValue, arg.span);
                    } else if found != *param && found != TypeId::ERROR && *param != TypeId::ERROR {
                        self.report(
                            DiagnosticKind::ArgumentMismatch {
                                callee: callee.name.clone(),
                                index,
                                expected: self.name(*param).to_string(),
                                found: self.name(found).to_string(),
                            },
                            arg.span,
                        );
                    }
                }

                signature.ret
            }
            SymbolKind::Parameter { .. } | SymbolKind::Local { .. } => {
                self.report(
                    DiagnosticKind::NotCallable {
                        name: callee.name.clone(),
                    },
                    callee.span,
                );
                self.check_args(args);
                TypeId::ERROR
            }
        }
    }

    fn check_format_call(&mut self, expr: &Expr, callee: &ast::Ident, args: &[Expr]) {
        let Some((template, rest)) = args.split_first() else {
            self.report(
                DiagnosticKind::ArityMismatch {
                    callee: callee.name.clone(),
                    expected: 1,
                    found: 0,
                },
                expr.span,
            );
            return;
        };

        self.info.expr_types.insert(template.id, TypeId::STR);
        match &template.kind {
            ExprKind::String(text) => match format::count_placeholders(text) {
                Ok(count) if count != rest.len() => self.report(
                    DiagnosticKind::FormatArity {
                        expected: count,
                        found: rest.len(),
                    },
                    expr.span,
                ),
                Ok(_) => {}
                Err(err) => self.report(
                    DiagnosticKind::FormatString {
                        reason: err.reason(),
                    },
                    template.span,
                ),
            },
            _ => {
                self.check_expr(template, None);
                self.report(
                    DiagnosticKind::FormatString {
                        reason: "the format must be a string literal",
                    },
                    template.span,
                );
            }
        }

        self.check_args(rest);
    }
}
