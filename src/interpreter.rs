//! Direct evaluation of a checked program.
//!
//! Runs the same arithmetic, comparison and formatting routines as the
//! [Vm](crate::vm::Vm), so a program compiled to bytecode must behave exactly
//! like its interpretation.

use std::io::Write;

use snafu::ResultExt;
use tracing::trace;

use crate::{
    ast::{BinaryOp, Block, Expr, ExprKind, NodeId, Stmt, StmtKind, UnaryOp},
    code::TypeTag,
    compiler::{int_constant, Analysis, Builtin, SymbolKind},
    format,
    object::{self, ArithOp, CompareOp, Object},
    vm::{CallDepthExceededSnafu, OperandMismatchSnafu, OutputSnafu, RuntimeError, VmConfig},
};

enum Flow {
    Normal,
    Return(Object),
}

pub struct Interpreter<'a, W: Write> {
    analysis: &'a Analysis,
    out: W,
    max_frames: usize,
    depth: usize,
}

impl<'a, W: Write> Interpreter<'a, W> {
    pub fn new(analysis: &'a Analysis, out: W) -> Self {
        Self::with_config(analysis, out, VmConfig::default())
    }

    /// Only `max_frames` applies; there is no operand stack to bound.
    pub fn with_config(analysis: &'a Analysis, out: W, config: VmConfig) -> Self {
        Self {
            analysis,
            out,
            max_frames: config.max_frames,
            depth: 0,
        }
    }

    pub fn into_output(self) -> W {
        self.out
    }

    pub fn run(&mut self) -> Result<Object, RuntimeError> {
        let entry = self
            .analysis
            .program
            .procs
            .iter()
            .position(|proc| proc.name.name == "main")
            .unwrap_or_else(|| panic!("internal compiler error: checked program has no `main`"));

        self.depth = 0;
        self.call(entry, Vec::new())
    }

    fn call(&mut self, index: usize, args: Vec<Object>) -> Result<Object, RuntimeError> {
        if self.depth >= self.max_frames {
            return CallDepthExceededSnafu {
                limit: self.max_frames,
            }
            .fail();
        }

        let analysis = self.analysis;
        let proc = &analysis.program.procs[index];
        let slots = analysis.bindings.procs[index].slots as usize;
        trace!(function = %proc.name.name, depth = self.depth + 1, "call");

        let mut locals = args;
        locals.resize(slots.max(locals.len()), Object::Void);

        self.depth += 1;
        let flow = self.exec_block(&proc.body, &mut locals);
        self.depth -= 1;

        Ok(match flow? {
            Flow::Return(value) => value,
            Flow::Normal => Object::Void,
        })
    }

    fn slot(&self, id: &NodeId, decl: bool) -> usize {
        let bindings = &self.analysis.bindings;
        let symbol = if decl {
            bindings.decls.get(id)
        } else {
            bindings.refs.get(id)
        };

        match symbol.and_then(|symbol| self.analysis.symbols.get(*symbol).kind.slot()) {
            Some(slot) => slot as usize,
            None => panic!("internal compiler error: node {:?} has no slot", id),
        }
    }

    fn tag(&self, expr: &Expr) -> TypeTag {
        let ty = self.analysis.info.expr_types.get(&expr.id);
        match ty.and_then(|ty| self.analysis.types.tag(*ty)) {
            Some(tag) => tag,
            None => panic!("internal compiler error: untyped expression at {:?}", expr.span),
        }
    }

    fn exec_block(&mut self, block: &Block, locals: &mut [Object]) -> Result<Flow, RuntimeError> {
        for stmt in &block.stmts {
            if let Flow::Return(value) = self.exec_stmt(stmt, locals)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&mut self, stmt: &Stmt, locals: &mut [Object]) -> Result<Flow, RuntimeError> {
        match &stmt.kind {
            StmtKind::Let { id, init, .. } => {
                let value = self.eval(init, locals)?;
                locals[self.slot(id, true)] = value;
            }
            StmtKind::Assign { id, value, .. } => {
                let value = self.eval(value, locals)?;
                locals[self.slot(id, false)] = value;
            }
            StmtKind::If { cond, then, els } => {
                if self.eval_condition(cond, locals)? {
                    return self.exec_block(then, locals);
                } else if let Some(els) = els {
                    return self.exec_block(els, locals);
                }
            }
            StmtKind::For {
                id,
                start,
                end,
                body,
                ..
            } => {
                let var = self.slot(id, true);
                let tag = self.tag(start);
                locals[var] = self.eval(start, locals)?;
                let bound = self.eval(end, locals)?;

                while object::compare(CompareOp::LessThan, &locals[var], &bound)? {
                    if let Flow::Return(value) = self.exec_block(body, locals)? {
                        return Ok(Flow::Return(value));
                    }
                    let one = int_constant(1, false, tag);
                    locals[var] = object::arith(ArithOp::Add, tag, &locals[var], &one)?;
                }
            }
            StmtKind::Return(value) => {
                let value = match value {
                    Some(value) => self.eval(value, locals)?,
                    None => Object::Void,
                };
                return Ok(Flow::Return(value));
            }
            StmtKind::Expr(expr) => {
                self.eval(expr, locals)?;
            }
            StmtKind::Block(block) => return self.exec_block(block, locals),
        }

        Ok(Flow::Normal)
    }

    fn eval_condition(&mut self, expr: &Expr, locals: &mut [Object]) -> Result<bool, RuntimeError> {
        match self.eval(expr, locals)? {
            Object::Bool(val) => Ok(val),
            other => OperandMismatchSnafu {
                op: "condition",
                expected: TypeTag::Bool,
                found: other.type_name(),
            }
            .fail(),
        }
    }

    fn eval(&mut self, expr: &Expr, locals: &mut [Object]) -> Result<Object, RuntimeError> {
        let value = match &expr.kind {
            ExprKind::Integer { value, .. } => int_constant(*value, false, self.tag(expr)),
            ExprKind::Float { value_bits } => Object::Float(f64::from_bits(*value_bits)),
            ExprKind::String(value) => Object::Str(value.as_str().into()),
            ExprKind::Bool(value) => Object::Bool(*value),
            ExprKind::Ident(_) => locals[self.slot(&expr.id, false)].clone(),
            ExprKind::Unary { op, operand } => match (op, &operand.kind) {
                (UnaryOp::Neg, ExprKind::Integer { value, .. }) => {
                    int_constant(*value, true, self.tag(expr))
                }
                (UnaryOp::Neg, _) => {
                    let operand = self.eval(operand, locals)?;
                    object::negate(self.tag(expr), &operand)?
                }
                (UnaryOp::Not, _) => object::bang(&self.eval(operand, locals)?)?,
            },
            ExprKind::Binary { op, lhs, rhs } => match op {
                BinaryOp::And => Object::Bool(
                    self.eval_condition(lhs, locals)? && self.eval_condition(rhs, locals)?,
                ),
                BinaryOp::Or => Object::Bool(
                    self.eval_condition(lhs, locals)? || self.eval_condition(rhs, locals)?,
                ),
                _ => {
                    let left = self.eval(lhs, locals)?;
                    let right = self.eval(rhs, locals)?;
                    binary(*op, self.tag(lhs), &left, &right)?
                }
            },
            ExprKind::Call { args, .. } => {
                let analysis = self.analysis;
                let kind = match analysis.bindings.refs.get(&expr.id) {
                    Some(symbol) => analysis.symbols.get(*symbol).kind,
                    None => panic!("internal compiler error: unresolved call at {:?}", expr.span),
                };

                match kind {
                    SymbolKind::Builtin(builtin) => {
                        self.print(builtin, args, locals)?;
                        Object::Void
                    }
                    SymbolKind::Procedure { index } => {
                        let mut values = Vec::with_capacity(args.len());
                        for arg in args {
                            values.push(self.eval(arg, locals)?);
                        }
                        self.call(index as usize, values)?
                    }
                    other => panic!("internal compiler error: call to {:?}", other),
                }
            }
        };

        Ok(value)
    }

    fn print(
        &mut self,
        builtin: Builtin,
        args: &[Expr],
        locals: &mut [Object],
    ) -> Result<(), RuntimeError> {
        let Some((template, rest)) = args.split_first() else {
            panic!("internal compiler error: {} without a format", builtin.name());
        };
        let ExprKind::String(template) = &template.kind else {
            panic!("internal compiler error: {} with a non-literal format", builtin.name());
        };

        let mut values = Vec::with_capacity(rest.len());
        for arg in rest {
            values.push(self.eval(arg, locals)?);
        }

        let mut text = format::format_template(template, &values)
            .ok_or(RuntimeError::FormatArity { args: values.len() })?;
        if builtin == Builtin::Println {
            text.push('\n');
        }
        self.out.write_all(text.as_bytes()).context(OutputSnafu)
    }
}

fn binary(
    op: BinaryOp,
    tag: TypeTag,
    left: &Object,
    right: &Object,
) -> Result<Object, RuntimeError> {
    let arith_op = match op {
        BinaryOp::Add => ArithOp::Add,
        BinaryOp::Sub => ArithOp::Sub,
        BinaryOp::Mul => ArithOp::Mul,
        BinaryOp::Div => ArithOp::Div,
        BinaryOp::Rem => ArithOp::Rem,
        _ => {
            let compare_op = match op {
                BinaryOp::Eq => CompareOp::Equal,
                BinaryOp::Ne => CompareOp::NotEqual,
                BinaryOp::Lt => CompareOp::LessThan,
                BinaryOp::Le => CompareOp::LessEqual,
                BinaryOp::Gt => CompareOp::GreaterThan,
                BinaryOp::Ge => CompareOp::GreaterEqual,
                _ => unreachable!("logical operators short-circuit"),
            };
            return Ok(Object::Bool(object::compare(compare_op, left, right)?));
        }
    };

    object::arith(arith_op, tag, left, right)
}
