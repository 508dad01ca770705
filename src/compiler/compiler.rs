use std::collections::HashMap;

use byteorder::{BigEndian, ByteOrder};
use tracing::debug;

use crate::{
    ast::{self, BinaryOp, Block, Expr, ExprKind, NodeId, Stmt, StmtKind, UnaryOp},
    bytecode::{Function, Module},
    code::{self, Opcode, TypeTag},
    object::Object,
    types::TypeId,
};

use super::{
    symbol_table::{Builtin, SymbolId, SymbolKind},
    Analysis, CapacitySnafu, CompileError,
};

const MAX_CONSTANTS: usize = u16::MAX as usize + 1;
const MAX_CODE_LEN: usize = u16::MAX as usize;
const MAX_SLOTS: usize = u16::MAX as usize;
const MAX_PRINT_ARGS: usize = u8::MAX as usize;

/// Lowers a checked program to a bytecode [Module].
pub struct Compiler<'a> {
    analysis: &'a Analysis,
    constants: Vec<Object>,
    instructions: code::Instructions,
    /// Next free slot after the resolver's locals; holds loop bounds.
    next_hidden_slot: usize,
}

impl<'a> Compiler<'a> {
    pub fn new(analysis: &'a Analysis) -> Self {
        Self {
            analysis,
            constants: Vec::new(),
            instructions: code::Instructions::new(),
            next_hidden_slot: 0,
        }
    }

    pub fn compile(mut self) -> Result<Module, CompileError> {
        let program = &self.analysis.program;
        if program.procs.len() > MAX_CONSTANTS {
            return CapacitySnafu {
                what: "procedures",
                limit: MAX_CONSTANTS,
            }
            .fail();
        }

        let mut functions = Vec::with_capacity(program.procs.len());
        for (index, proc) in program.procs.iter().enumerate() {
            functions.push(self.compile_proc(index, proc)?);
        }

        let entry = program
            .procs
            .iter()
            .position(|proc| proc.name.name == "main")
            .unwrap_or_else(|| panic!("internal compiler error: checked program has no `main`"));

        Ok(Module {
            constants: self.constants,
            functions,
            entry: entry as u16,
        })
    }

    fn compile_proc(&mut self, index: usize, proc: &ast::Proc) -> Result<Function, CompileError> {
        let info = &self.analysis.bindings.procs[index];
        let signature = &self.analysis.info.signatures[index];
        let ret = self.tag(signature.ret);

        self.instructions = code::Instructions::new();
        self.next_hidden_slot = info.slots as usize;

        self.compile_block(&proc.body)?;
        if signature.ret == TypeId::VOID {
            self.emit(Opcode::OpReturn, &[]);
        }

        if self.instructions.len() > MAX_CODE_LEN {
            return CapacitySnafu {
                what: "bytes of code in one procedure",
                limit: MAX_CODE_LEN,
            }
            .fail();
        }
        if self.next_hidden_slot > MAX_SLOTS {
            return CapacitySnafu {
                what: "local slots in one procedure",
                limit: MAX_SLOTS,
            }
            .fail();
        }

        debug!(
            name = %proc.name.name,
            bytes = self.instructions.len(),
            locals = self.next_hidden_slot,
            "generated function"
        );

        Ok(Function {
            name: proc.name.name.clone(),
            params: proc.params.len() as u16,
            locals: self.next_hidden_slot as u16,
            ret,
            instructions: std::mem::take(&mut self.instructions),
        })
    }

    fn ty(&self, expr: &Expr) -> TypeId {
        match self.analysis.info.expr_types.get(&expr.id) {
            Some(ty) => *ty,
            None => panic!("internal compiler error: untyped expression at {:?}", expr.span),
        }
    }

    fn tag(&self, ty: TypeId) -> TypeTag {
        match self.analysis.types.tag(ty) {
            Some(tag) => tag,
            None => panic!("internal compiler error: poisoned type reached code generation"),
        }
    }

    fn symbol_kind(&self, id: &NodeId, map: &HashMap<NodeId, SymbolId>) -> SymbolKind {
        match map.get(id) {
            Some(symbol) => self.analysis.symbols.get(*symbol).kind,
            None => panic!("internal compiler error: unresolved node {:?}", id),
        }
    }

    fn slot(&self, kind: SymbolKind) -> u16 {
        match kind.slot() {
            Some(slot) => slot as u16,
            None => panic!("internal compiler error: {:?} has no slot", kind),
        }
    }

    fn add_constant(&mut self, constant: Object) -> Result<u16, CompileError> {
        if let Some(idx) = self.constants.iter().position(|c| c.same_constant(&constant)) {
            return Ok(idx as u16);
        }

        if self.constants.len() >= MAX_CONSTANTS {
            return CapacitySnafu {
                what: "constants",
                limit: MAX_CONSTANTS,
            }
            .fail();
        }

        let idx = self.constants.len();
        self.constants.push(constant);
        Ok(idx as u16)
    }

    fn emit(&mut self, op: Opcode, operands: &[u16]) -> usize {
        let idx = self.instructions.len();
        let mut ins = code::make(op, operands);
        self.instructions.append(&mut ins);
        idx
    }

    fn emit_constant(&mut self, constant: Object) -> Result<(), CompileError> {
        let idx = self.add_constant(constant)?;
        self.emit(Opcode::OpConstant, &[idx]);
        Ok(())
    }

    fn change_argument(&mut self, instruction_addr: usize, argument: &[u8]) {
        let start = instruction_addr + 1;
        self.instructions[start..start + argument.len()].copy_from_slice(argument);
    }

    /// Points the jump at `instruction_addr` to the current end of code.
    fn set_jump_addr(&mut self, instruction_addr: usize) {
        let jump_addr = self.instructions.len();
        self.set_jump_target(instruction_addr, jump_addr);
    }

    fn set_jump_target(&mut self, instruction_addr: usize, target: usize) {
        let mut buf = [0_u8; 2];
        // oversized functions are rejected once complete
        BigEndian::write_u16(&mut buf, target as u16);
        self.change_argument(instruction_addr, &buf);
    }

    fn compile_block(&mut self, block: &Block) -> Result<(), CompileError> {
        for stmt in &block.stmts {
            self.compile_stmt(stmt)?;
        }
        Ok(())
    }

    fn compile_stmt(&mut self, stmt: &Stmt) -> Result<(), CompileError> {
        let analysis = self.analysis;
        let bindings = &analysis.bindings;

        match &stmt.kind {
            StmtKind::Let { id, init, .. } => {
                self.compile_expr(init)?;
                let slot = self.slot(self.symbol_kind(id, &bindings.decls));
                self.emit(Opcode::OpSetLocal, &[slot]);
            }
            StmtKind::Assign { id, value, .. } => {
                self.compile_expr(value)?;
                let slot = self.slot(self.symbol_kind(id, &bindings.refs));
                self.emit(Opcode::OpSetLocal, &[slot]);
            }
            StmtKind::If { cond, then, els } => {
                self.compile_expr(cond)?;
                let condition_jump_addr = self.emit(Opcode::OpJumpNotTruthy, &[9999]);
                self.compile_block(then)?;

                match els {
                    Some(els) => {
                        let jump_addr = (!ast::block_returns(then))
                            .then(|| self.emit(Opcode::OpJump, &[9999]));
                        self.set_jump_addr(condition_jump_addr);
                        self.compile_block(els)?;
                        if let Some(jump_addr) = jump_addr {
                            self.set_jump_addr(jump_addr);
                        }
                    }
                    None => self.set_jump_addr(condition_jump_addr),
                }
            }
            StmtKind::For {
                id,
                start,
                end,
                body,
                ..
            } => {
                let var = self.slot(self.symbol_kind(id, &bindings.decls));
                let bound = self.next_hidden_slot as u16;
                self.next_hidden_slot += 1;
                let tag = self.tag(self.ty(start));

                self.compile_expr(start)?;
                self.emit(Opcode::OpSetLocal, &[var]);
                self.compile_expr(end)?;
                self.emit(Opcode::OpSetLocal, &[bound]);

                let condition_addr = self.instructions.len();
                self.emit(Opcode::OpGetLocal, &[var]);
                self.emit(Opcode::OpGetLocal, &[bound]);
                self.emit(Opcode::OpLessThan, &[]);
                let exit_jump_addr = self.emit(Opcode::OpJumpNotTruthy, &[9999]);

                self.compile_block(body)?;

                self.emit(Opcode::OpGetLocal, &[var]);
                self.emit_constant(int_constant(1, false, tag))?;
                self.emit(Opcode::OpAdd, &[tag as u16]);
                self.emit(Opcode::OpSetLocal, &[var]);
                let back_jump_addr = self.emit(Opcode::OpJump, &[9999]);
                self.set_jump_target(back_jump_addr, condition_addr);

                self.set_jump_addr(exit_jump_addr);
            }
            StmtKind::Return(Some(value)) => {
                self.compile_expr(value)?;
                self.emit(Opcode::OpReturnValue, &[]);
            }
            StmtKind::Return(None) => {
                self.emit(Opcode::OpReturn, &[]);
            }
            StmtKind::Expr(expr) => {
                self.compile_expr(expr)?;
                if self.ty(expr) != TypeId::VOID {
                    self.emit(Opcode::OpPop, &[]);
                }
            }
            StmtKind::Block(block) => self.compile_block(block)?,
        }

        Ok(())
    }

    fn compile_expr(&mut self, expr: &Expr) -> Result<(), CompileError> {
        match &expr.kind {
            ExprKind::Integer { value, .. } => {
                let tag = self.tag(self.ty(expr));
                self.emit_constant(int_constant(*value, false, tag))?;
            }
            ExprKind::Float { value_bits } => {
                self.emit_constant(Object::Float(f64::from_bits(*value_bits)))?;
            }
            ExprKind::String(value) => {
                self.emit_constant(Object::Str(value.as_str().into()))?;
            }
            ExprKind::Bool(value) => {
                if *value {
                    self.emit(Opcode::OpTrue, &[]);
                } else {
                    self.emit(Opcode::OpFalse, &[]);
                }
            }
            ExprKind::Ident(_) => {
                let kind = self.symbol_kind(&expr.id, &self.analysis.bindings.refs);
                let slot = self.slot(kind);
                self.emit(Opcode::OpGetLocal, &[slot]);
            }
            ExprKind::Unary { op, operand } => match (op, &operand.kind) {
                (UnaryOp::Neg, ExprKind::Integer { value, .. }) => {
                    let tag = self.tag(self.ty(expr));
                    self.emit_constant(int_constant(*value, true, tag))?;
                }
                (UnaryOp::Neg, _) => {
                    self.compile_expr(operand)?;
                    let tag = self.tag(self.ty(expr));
                    self.emit(Opcode::OpNegate, &[tag as u16]);
                }
                (UnaryOp::Not, _) => {
                    self.compile_expr(operand)?;
                    self.emit(Opcode::OpBang, &[]);
                }
            },
            ExprKind::Binary { op, lhs, rhs } => self.compile_binary(*op, lhs, rhs)?,
            ExprKind::Call { args, .. } => {
                let kind = self.symbol_kind(&expr.id, &self.analysis.bindings.refs);
                match kind {
                    SymbolKind::Builtin(builtin) => self.compile_print(builtin, args)?,
                    SymbolKind::Procedure { index } => {
                        for arg in args {
                            self.compile_expr(arg)?;
                        }
                        self.emit(Opcode::OpCall, &[index as u16]);
                    }
                    other => panic!("internal compiler error: call to {:?}", other),
                }
            }
        }

        Ok(())
    }

    fn compile_binary(&mut self, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Result<(), CompileError> {
        match op {
            BinaryOp::And => {
                self.compile_expr(lhs)?;
                let false_jump_addr = self.emit(Opcode::OpJumpNotTruthy, &[9999]);
                self.compile_expr(rhs)?;
                let end_jump_addr = self.emit(Opcode::OpJump, &[9999]);
                self.set_jump_addr(false_jump_addr);
                self.emit(Opcode::OpFalse, &[]);
                self.set_jump_addr(end_jump_addr);
            }
            BinaryOp::Or => {
                self.compile_expr(lhs)?;
                let rhs_jump_addr = self.emit(Opcode::OpJumpNotTruthy, &[9999]);
                self.emit(Opcode::OpTrue, &[]);
                let end_jump_addr = self.emit(Opcode::OpJump, &[9999]);
                self.set_jump_addr(rhs_jump_addr);
                self.compile_expr(rhs)?;
                self.set_jump_addr(end_jump_addr);
            }
            _ => {
                self.compile_expr(lhs)?;
                self.compile_expr(rhs)?;
                let tag = self.tag(self.ty(lhs)) as u16;

                match op {
                    BinaryOp::Add => self.emit(Opcode::OpAdd, &[tag]),
                    BinaryOp::Sub => self.emit(Opcode::OpSub, &[tag]),
                    BinaryOp::Mul => self.emit(Opcode::OpMul, &[tag]),
                    BinaryOp::Div => self.emit(Opcode::OpDiv, &[tag]),
                    BinaryOp::Rem => self.emit(Opcode::OpRem, &[tag]),
                    BinaryOp::Eq => self.emit(Opcode::OpEqual, &[]),
                    BinaryOp::Ne => self.emit(Opcode::OpNotEqual, &[]),
                    BinaryOp::Lt => self.emit(Opcode::OpLessThan, &[]),
                    BinaryOp::Le => self.emit(Opcode::OpLessEqual, &[]),
                    BinaryOp::Gt => self.emit(Opcode::OpGreaterThan, &[]),
                    BinaryOp::Ge => self.emit(Opcode::OpGreaterEqual, &[]),
                    BinaryOp::And | BinaryOp::Or => unreachable!(),
                };
            }
        }

        Ok(())
    }

    fn compile_print(&mut self, builtin: Builtin, args: &[Expr]) -> Result<(), CompileError> {
        let Some((template, rest)) = args.split_first() else {
            panic!("internal compiler error: {} without a format", builtin.name());
        };
        let ExprKind::String(template) = &template.kind else {
            panic!("internal compiler error: {} with a non-literal format", builtin.name());
        };

        if rest.len() > MAX_PRINT_ARGS {
            return CapacitySnafu {
                what: "print arguments",
                limit: MAX_PRINT_ARGS,
            }
            .fail();
        }

        let mut template = template.clone();
        if builtin == Builtin::Println {
            template.push('\n');
        }
        let template_idx = self.add_constant(Object::Str(template.into()))?;

        for arg in rest {
            self.compile_expr(arg)?;
        }
        self.emit(Opcode::OpPrint, &[template_idx, rest.len() as u16]);
        Ok(())
    }
}

/// Materializes an integer literal, possibly negated, as a value of `tag`.
pub fn int_constant(value: u64, negative: bool, tag: TypeTag) -> Object {
    match tag {
        TypeTag::F64 if negative => Object::Float(-(value as f64)),
        TypeTag::F64 => Object::Float(value as f64),
        tag if tag.is_signed() && negative => Object::Int((-(value as i128)) as i64),
        tag if tag.is_signed() => Object::Int(value as i64),
        _ => Object::UInt(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{compile, CompileOptions};

    fn compile_source(source: &str) -> Module {
        match compile(source, &CompileOptions::default()) {
            Ok(module) => module,
            Err(err) => panic!("failed to compile {:?}: {:?}", source, err),
        }
    }

    fn check_instructions_eq(ins: &[u8], other: &[Vec<u8>]) {
        let joined = other.concat();
        if ins != joined.as_slice() {
            panic!(
                "wrong instructions\nwant:\n{}\ngot:\n{}",
                code::disassemble(&joined).unwrap_or_default(),
                code::disassemble(ins).unwrap_or_default()
            );
        }
    }

    fn run_cases(cases: Vec<(&str, Vec<Object>, Vec<Vec<u8>>)>) {
        for (body, constants, expected) in cases {
            let module = compile_source(&format!("proc main() {{ {} }}", body));
            assert_eq!(module.constants, constants, "body: {}", body);
            check_instructions_eq(&module.functions[module.entry as usize].instructions, &expected);
        }
    }

    const I64: u16 = TypeTag::I64 as u16;

    #[test]
    fn integer_arithmetic() {
        let cases = vec![
            // input, constants, expected instructions
            (
                "1 + 2;",
                vec![Object::Int(1), Object::Int(2)],
                vec![
                    code::make(Opcode::OpConstant, &[0]),
                    code::make(Opcode::OpConstant, &[1]),
                    code::make(Opcode::OpAdd, &[I64]),
                    code::make(Opcode::OpPop, &[]),
                    code::make(Opcode::OpReturn, &[]),
                ],
            ),
            (
                "-1;",
                vec![Object::Int(-1)],
                vec![
                    code::make(Opcode::OpConstant, &[0]),
                    code::make(Opcode::OpPop, &[]),
                    code::make(Opcode::OpReturn, &[]),
                ],
            ),
            (
                "let x: i32 = 5; -x;",
                vec![Object::Int(5)],
                vec![
                    code::make(Opcode::OpConstant, &[0]),
                    code::make(Opcode::OpSetLocal, &[0]),
                    code::make(Opcode::OpGetLocal, &[0]),
                    code::make(Opcode::OpNegate, &[TypeTag::I32 as u16]),
                    code::make(Opcode::OpPop, &[]),
                    code::make(Opcode::OpReturn, &[]),
                ],
            ),
            (
                "7u8 % 2;",
                vec![Object::UInt(7), Object::UInt(2)],
                vec![
                    code::make(Opcode::OpConstant, &[0]),
                    code::make(Opcode::OpConstant, &[1]),
                    code::make(Opcode::OpRem, &[TypeTag::U8 as u16]),
                    code::make(Opcode::OpPop, &[]),
                    code::make(Opcode::OpReturn, &[]),
                ],
            ),
            (
                "let f: f64 = 2;",
                vec![Object::Float(2.0)],
                vec![
                    code::make(Opcode::OpConstant, &[0]),
                    code::make(Opcode::OpSetLocal, &[0]),
                    code::make(Opcode::OpReturn, &[]),
                ],
            ),
            (
                "1; 1;",
                vec![Object::Int(1)],
                vec![
                    code::make(Opcode::OpConstant, &[0]),
                    code::make(Opcode::OpPop, &[]),
                    code::make(Opcode::OpConstant, &[0]),
                    code::make(Opcode::OpPop, &[]),
                    code::make(Opcode::OpReturn, &[]),
                ],
            ),
        ];

        run_cases(cases);
    }

    #[test]
    fn boolean() {
        let cases = vec![
            (
                "true; false;",
                vec![],
                vec![
                    code::make(Opcode::OpTrue, &[]),
                    code::make(Opcode::OpPop, &[]),
                    code::make(Opcode::OpFalse, &[]),
                    code::make(Opcode::OpPop, &[]),
                    code::make(Opcode::OpReturn, &[]),
                ],
            ),
            (
                "1 < 2;",
                vec![Object::Int(1), Object::Int(2)],
                vec![
                    code::make(Opcode::OpConstant, &[0]),
                    code::make(Opcode::OpConstant, &[1]),
                    code::make(Opcode::OpLessThan, &[]),
                    code::make(Opcode::OpPop, &[]),
                    code::make(Opcode::OpReturn, &[]),
                ],
            ),
            (
                "!true;",
                vec![],
                vec![
                    code::make(Opcode::OpTrue, &[]),
                    code::make(Opcode::OpBang, &[]),
                    code::make(Opcode::OpPop, &[]),
                    code::make(Opcode::OpReturn, &[]),
                ],
            ),
            (
                "true && false;",
                vec![],
                vec![
                    code::make(Opcode::OpTrue, &[]),
                    code::make(Opcode::OpJumpNotTruthy, &[8]),
                    code::make(Opcode::OpFalse, &[]),
                    code::make(Opcode::OpJump, &[9]),
                    code::make(Opcode::OpFalse, &[]),
                    code::make(Opcode::OpPop, &[]),
                    code::make(Opcode::OpReturn, &[]),
                ],
            ),
            (
                "false || true;",
                vec![],
                vec![
                    code::make(Opcode::OpFalse, &[]),
                    code::make(Opcode::OpJumpNotTruthy, &[8]),
                    code::make(Opcode::OpTrue, &[]),
                    code::make(Opcode::OpJump, &[9]),
                    code::make(Opcode::OpTrue, &[]),
                    code::make(Opcode::OpPop, &[]),
                    code::make(Opcode::OpReturn, &[]),
                ],
            ),
        ];

        run_cases(cases);
    }

    #[test]
    fn conditionals() {
        let cases = vec![
            (
                "if true { 1; } else { 2; }",
                vec![Object::Int(1), Object::Int(2)],
                vec![
                    // 0000
                    code::make(Opcode::OpTrue, &[]),
                    // 0001
                    code::make(Opcode::OpJumpNotTruthy, &[11]),
                    // 0004
                    code::make(Opcode::OpConstant, &[0]),
                    // 0007
                    code::make(Opcode::OpPop, &[]),
                    // 0008
                    code::make(Opcode::OpJump, &[15]),
                    // 0011
                    code::make(Opcode::OpConstant, &[1]),
                    // 0014
                    code::make(Opcode::OpPop, &[]),
                    // 0015
                    code::make(Opcode::OpReturn, &[]),
                ],
            ),
            (
                "if true { 1; }",
                vec![Object::Int(1)],
                vec![
                    code::make(Opcode::OpTrue, &[]),
                    code::make(Opcode::OpJumpNotTruthy, &[8]),
                    code::make(Opcode::OpConstant, &[0]),
                    code::make(Opcode::OpPop, &[]),
                    code::make(Opcode::OpReturn, &[]),
                ],
            ),
            (
                "if true { return; } else { 2; }",
                vec![Object::Int(2)],
                vec![
                    code::make(Opcode::OpTrue, &[]),
                    code::make(Opcode::OpJumpNotTruthy, &[5]),
                    code::make(Opcode::OpReturn, &[]),
                    code::make(Opcode::OpConstant, &[0]),
                    code::make(Opcode::OpPop, &[]),
                    code::make(Opcode::OpReturn, &[]),
                ],
            ),
        ];

        run_cases(cases);
    }

    #[test]
    fn range_loop() {
        let cases = vec![(
            "for i in 0..3 { }",
            vec![Object::Int(0), Object::Int(3), Object::Int(1)],
            vec![
                code::make(Opcode::OpConstant, &[0]),
                code::make(Opcode::OpSetLocal, &[0]),
                code::make(Opcode::OpConstant, &[1]),
                code::make(Opcode::OpSetLocal, &[1]),
                // 0012: condition
                code::make(Opcode::OpGetLocal, &[0]),
                code::make(Opcode::OpGetLocal, &[1]),
                code::make(Opcode::OpLessThan, &[]),
                code::make(Opcode::OpJumpNotTruthy, &[36]),
                // 0022: increment
                code::make(Opcode::OpGetLocal, &[0]),
                code::make(Opcode::OpConstant, &[2]),
                code::make(Opcode::OpAdd, &[I64]),
                code::make(Opcode::OpSetLocal, &[0]),
                code::make(Opcode::OpJump, &[12]),
                // 0036
                code::make(Opcode::OpReturn, &[]),
            ],
        )];

        run_cases(cases);

        let module = compile_source("proc main() { for i in 0..3 { } for j in 0u8..3 { } }");
        assert_eq!(module.functions[0].locals, 4);
    }

    #[test]
    fn print_and_calls() {
        let cases = vec![(
            "println(\"{}\", 1);",
            vec![Object::Str("{}\n".into()), Object::Int(1)],
            vec![
                code::make(Opcode::OpConstant, &[1]),
                code::make(Opcode::OpPrint, &[0, 1]),
                code::make(Opcode::OpReturn, &[]),
            ],
        )];
        run_cases(cases);

        let module = compile_source(
            "proc add(a: i64, b: i64): i64 { return a + b; }
             proc main() { add(1, 2); }",
        );

        assert_eq!(module.entry, 1);
        let add = &module.functions[0];
        assert_eq!((add.params, add.locals, add.ret), (2, 2, TypeTag::I64));
        check_instructions_eq(
            &add.instructions,
            &[
                code::make(Opcode::OpGetLocal, &[0]),
                code::make(Opcode::OpGetLocal, &[1]),
                code::make(Opcode::OpAdd, &[I64]),
                code::make(Opcode::OpReturnValue, &[]),
            ],
        );
        check_instructions_eq(
            &module.functions[1].instructions,
            &[
                code::make(Opcode::OpConstant, &[0]),
                code::make(Opcode::OpConstant, &[1]),
                code::make(Opcode::OpCall, &[0]),
                code::make(Opcode::OpPop, &[]),
                code::make(Opcode::OpReturn, &[]),
            ],
        );
    }

    #[test]
    fn too_many_print_arguments() {
        let count = MAX_PRINT_ARGS + 1;
        let source = format!(
            "proc main() {{ print(\"{}\"{}); }}",
            "{}".repeat(count),
            ", 1".repeat(count)
        );

        let result = compile(&source, &CompileOptions::default());
        assert!(matches!(
            result,
            Err(CompileError::Capacity {
                what: "print arguments",
                ..
            })
        ));
    }

    #[test]
    fn literal_constants() {
        assert_eq!(int_constant(5, true, TypeTag::I8), Object::Int(-5));
        assert_eq!(
            int_constant(1 << 63, true, TypeTag::I64),
            Object::Int(i64::MIN)
        );
        assert_eq!(int_constant(255, false, TypeTag::U8), Object::UInt(255));
        assert_eq!(int_constant(3, true, TypeTag::F64), Object::Float(-3.0));
    }
}
