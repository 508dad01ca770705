use std::collections::HashMap;

use tracing::debug;

use crate::{
    ast::{Block, Expr, ExprKind, NodeId, Program, Stmt, StmtKind},
    diagnostic::{DiagnosticKind, Diagnostics},
    token::Span,
};

use super::symbol_table::{Builtin, ScopeId, ScopeKind, Symbol, SymbolId, SymbolKind, SymbolTable};

/// Per-procedure facts the later passes need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcInfo {
    pub symbol: SymbolId,
    pub scope: ScopeId,
    /// Number of parameter and local slots.
    pub slots: u32,
}

/// Links from AST nodes to symbols.
#[derive(Debug, Default)]
pub struct Bindings {
    /// Identifier uses: identifier expressions, calls and assignments.
    pub refs: HashMap<NodeId, SymbolId>,
    /// Declarations: procedures, parameters, `let` and loop variables.
    pub decls: HashMap<NodeId, SymbolId>,
    /// Indexed like `Program::procs`.
    pub procs: Vec<ProcInfo>,
}

pub struct Resolver<'d> {
    symbols: SymbolTable,
    bindings: Bindings,
    diagnostics: &'d mut Diagnostics,
    next_slot: u32,
}

impl<'d> Resolver<'d> {
    pub fn new(diagnostics: &'d mut Diagnostics) -> Self {
        Self {
            symbols: SymbolTable::new(),
            bindings: Bindings::default(),
            diagnostics,
            next_slot: 0,
        }
    }

    pub fn resolve(mut self, program: &Program) -> (SymbolTable, Bindings) {
        let global = self.symbols.global();
        for builtin in Builtin::ALL {
            let _ = self
                .symbols
                .define(global, builtin.name(), SymbolKind::Builtin(builtin), None);
        }

        // hoisted so calls may precede declarations
        let mut proc_symbols = Vec::with_capacity(program.procs.len());
        for (index, proc) in program.procs.iter().enumerate() {
            let kind = SymbolKind::Procedure {
                index: index as u32,
            };
            let symbol = match self.declare(global, &proc.name.name, kind, proc.name.span) {
                Some(symbol) => symbol,
                None => self.symbols.add(Symbol {
                    name: proc.name.name.clone(),
                    kind,
                    scope: global,
                    span: Some(proc.name.span),
                    ty: None,
                }),
            };
            self.bindings.decls.insert(proc.id, symbol);
            proc_symbols.push(symbol);
        }

        for (proc, symbol) in program.procs.iter().zip(proc_symbols) {
            self.next_slot = 0;
            let scope = self.symbols.push_scope(global, ScopeKind::Procedure);

            for param in &proc.params {
                let kind = SymbolKind::Parameter {
                    slot: self.next_slot,
                };
                self.next_slot += 1;
                let declared = self.declare(scope, &param.name.name, kind, param.name.span);
                if let Some(param_symbol) = declared {
                    self.bindings.decls.insert(param.id, param_symbol);
                }
            }

            self.resolve_stmts(scope, &proc.body.stmts);
            self.bindings.procs.push(ProcInfo {
                symbol,
                scope,
                slots: self.next_slot,
            });
        }

        debug!(
            symbols = self.symbols.len(),
            scopes = self.symbols.scope_count(),
            "resolved names"
        );
        (self.symbols, self.bindings)
    }

    /// Declares a symbol, reporting a duplicate in the same scope.
    fn declare(
        &mut self,
        scope: ScopeId,
        name: &str,
        kind: SymbolKind,
        span: Span,
    ) -> Option<SymbolId> {
        match self.symbols.define(scope, name, kind, Some(span)) {
            Ok(symbol) => Some(symbol),
            Err(existing) => {
                let previous = self.symbols.get(existing).span;
                self.diagnostics.report(
                    DiagnosticKind::DuplicateDeclaration {
                        name: name.to_string(),
                        previous,
                    },
                    span,
                );
                None
            }
        }
    }

    fn declare_local(&mut self, scope: ScopeId, id: NodeId, name: &str, mutable: bool, span: Span) {
        let kind = SymbolKind::Local {
            slot: self.next_slot,
            mutable,
        };
        self.next_slot += 1;
        if let Some(symbol) = self.declare(scope, name, kind, span) {
            self.bindings.decls.insert(id, symbol);
        }
    }

    fn lookup(&mut self, scope: ScopeId, name: &str, span: Span) -> Option<SymbolId> {
        let symbol = self.symbols.lookup(scope, name);
        if symbol.is_none() {
            self.diagnostics.report(
                DiagnosticKind::UndefinedSymbol {
                    name: name.to_string(),
                },
                span,
            );
        }
        symbol
    }

    fn resolve_block(&mut self, parent: ScopeId, block: &Block) {
        let scope = self.symbols.push_scope(parent, ScopeKind::Block);
        self.resolve_stmts(scope, &block.stmts);
    }

    fn resolve_stmts(&mut self, scope: ScopeId, stmts: &[Stmt]) {
        for stmt in stmts {
            self.resolve_stmt(scope, stmt);
        }
    }

    fn resolve_stmt(&mut self, scope: ScopeId, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Let { id, name, init, .. } => {
                // the initializer cannot see the name it initializes
                self.resolve_expr(scope, init);
                self.declare_local(scope, *id, &name.name, true, name.span);
            }
            StmtKind::Assign { id, target, value } => {
                if let Some(symbol) = self.lookup(scope, &target.name, target.span) {
                    self.bindings.refs.insert(*id, symbol);
                    let kind = self.symbols.get(symbol).kind;
                    match kind {
                        SymbolKind::Local { mutable: false, .. } => self.diagnostics.report(
                            DiagnosticKind::ImmutableAssignment {
                                name: target.name.clone(),
                            },
                            target.span,
                        ),
                        SymbolKind::Builtin(_) | SymbolKind::Procedure { .. } => {
                            self.diagnostics.report(
                                DiagnosticKind::NotAValue {
                                    name: target.name.clone(),
                                },
                                target.span,
                            )
                        }
                        _ => {}
                    }
                }
                self.resolve_expr(scope, value);
            }
            StmtKind::If { cond, then, els } => {
                self.resolve_expr(scope, cond);
                self.resolve_block(scope, then);
                if let Some(els) = els {
                    self.resolve_block(scope, els);
                }
            }
            StmtKind::For {
                id,
                var,
                start,
                end,
                body,
            } => {
                self.resolve_expr(scope, start);
                self.resolve_expr(scope, end);

                let loop_scope = self.symbols.push_scope(scope, ScopeKind::Block);
                self.declare_local(loop_scope, *id, &var.name, false, var.span);
                self.resolve_stmts(loop_scope, &body.stmts);
            }
            StmtKind::Return(value) => {
                if let Some(value) = value {
                    self.resolve_expr(scope, value);
                }
            }
            StmtKind::Expr(expr) => self.resolve_expr(scope, expr),
            StmtKind::Block(block) => self.resolve_block(scope, block),
        }
    }

    fn resolve_expr(&mut self, scope: ScopeId, expr: &Expr) {
        match &expr.kind {
            ExprKind::Integer { .. }
            | ExprKind::Float { .. }
            | ExprKind::String(_)
            | ExprKind::Bool(_) => {}
            ExprKind::Ident(name) => {
                if let Some(symbol) = self.lookup(scope, name, expr.span) {
                    self.bindings.refs.insert(expr.id, symbol);
                }
            }
            ExprKind::Unary { operand, .. } => self.resolve_expr(scope, operand),
            ExprKind::Binary { lhs, rhs, .. } => {
                self.resolve_expr(scope, lhs);
                self.resolve_expr(scope, rhs);
            }
            ExprKind::Call { callee, args } => {
                if let Some(symbol) = self.lookup(scope, &callee.name, callee.span) {
                    self.bindings.refs.insert(expr.id, symbol);
                }
                for arg in args {
                    self.resolve_expr(scope, arg);
                }
            }
        }
    }
}
