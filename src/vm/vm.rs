use std::io::{self, Write};

use num_enum::TryFromPrimitive;
use snafu::{ResultExt, Snafu};
use tracing::trace;

use crate::{
    bytecode::{Function, Module},
    code::{Opcode, TypeTag},
    format,
    object::{self, ArithOp, CompareOp, Object},
};

use super::{Frame, Stack};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmConfig {
    /// Operand stack size in slots.
    pub stack_size: usize,
    /// Maximum number of live call frames.
    pub max_frames: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            stack_size: 16 * 1024,
            max_frames: 1024,
        }
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum RuntimeError {
    #[snafu(display("division by zero"))]
    DivisionByZero,

    #[snafu(display("arithmetic overflow: `{}` on {}", op, ty))]
    Overflow { op: &'static str, ty: TypeTag },

    #[snafu(display("operand mismatch for `{}`: expected {}, found {}", op, expected, found))]
    OperandMismatch {
        op: &'static str,
        expected: TypeTag,
        found: String,
    },

    #[snafu(display("stack overflow (limit {} slots)", limit))]
    StackOverflow { limit: usize },

    #[snafu(display("call depth exceeded (limit {} frames)", limit))]
    CallDepthExceeded { limit: usize },

    #[snafu(display("stack underflow"))]
    StackUnderflow,

    #[snafu(display("invalid opcode {} at offset {}", byte, offset))]
    InvalidOpcode { byte: u8, offset: usize },

    #[snafu(display("invalid type tag {}", byte))]
    InvalidTypeTag { byte: u8 },

    #[snafu(display("function index {} out of range", index))]
    InvalidFunction { index: u16 },

    #[snafu(display("constant index {} out of range", index))]
    InvalidConstant { index: u16 },

    #[snafu(display("local slot {} out of range", slot))]
    InvalidLocal { slot: u16 },

    #[snafu(display("execution ran past the end of `{}`", function))]
    FellOffEnd { function: String },

    #[snafu(display("truncated instruction at offset {}", offset))]
    TruncatedInstruction { offset: usize },

    #[snafu(display("format string does not take {} argument(s)", args))]
    FormatArity { args: usize },

    #[snafu(display("failed to write output: {}", source))]
    Output { source: io::Error },
}

/// Stack machine executing a [Module]. Program output goes to `out`.
pub struct Vm<'a, W: Write> {
    module: &'a Module,
    stack: Stack,
    frames: Vec<Frame<'a>>,
    out: W,
    config: VmConfig,
}

impl<'a, W: Write> Vm<'a, W> {
    pub fn new(module: &'a Module, out: W) -> Self {
        Self::with_config(module, out, VmConfig::default())
    }

    pub fn with_config(module: &'a Module, out: W, config: VmConfig) -> Self {
        Self {
            module,
            stack: Stack::new(config.stack_size),
            frames: Vec::new(),
            out,
            config,
        }
    }

    pub fn output(&mut self) -> &mut W {
        &mut self.out
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// Runs the entry function to completion and returns its result.
    pub fn run(&mut self) -> Result<Object, RuntimeError> {
        self.stack.truncate(0);
        self.frames.clear();
        self.call(self.module.entry)?;

        loop {
            let frame = self.frame();
            let offset = frame.ip;
            let Some(&op_raw) = frame.function.instructions.get(offset) else {
                return FellOffEndSnafu {
                    function: frame.function.name.clone(),
                }
                .fail();
            };
            let op = Opcode::try_from_primitive(op_raw)
                .ok()
                .ok_or(RuntimeError::InvalidOpcode {
                    byte: op_raw,
                    offset,
                })?;
            self.frame().ip += 1;

            match op {
                Opcode::OpConstant => {
                    let const_index = self.frame().read_u16_from_instructions()?;
                    let constant = self.constant(const_index)?.clone();
                    self.stack.push(constant)?;
                }
                Opcode::OpAdd => self.arith(ArithOp::Add)?,
                Opcode::OpSub => self.arith(ArithOp::Sub)?,
                Opcode::OpMul => self.arith(ArithOp::Mul)?,
                Opcode::OpDiv => self.arith(ArithOp::Div)?,
                Opcode::OpRem => self.arith(ArithOp::Rem)?,
                Opcode::OpPop => {
                    self.stack.pop()?;
                }
                Opcode::OpTrue => self.stack.push(Object::Bool(true))?,
                Opcode::OpFalse => self.stack.push(Object::Bool(false))?,
                Opcode::OpEqual => self.compare(CompareOp::Equal)?,
                Opcode::OpNotEqual => self.compare(CompareOp::NotEqual)?,
                Opcode::OpLessThan => self.compare(CompareOp::LessThan)?,
                Opcode::OpLessEqual => self.compare(CompareOp::LessEqual)?,
                Opcode::OpGreaterThan => self.compare(CompareOp::GreaterThan)?,
                Opcode::OpGreaterEqual => self.compare(CompareOp::GreaterEqual)?,
                Opcode::OpNegate => {
                    let tag = self.read_type_tag()?;
                    let operand = self.stack.pop()?;
                    self.stack.push(object::negate(tag, &operand)?)?;
                }
                Opcode::OpBang => {
                    let operand = self.stack.pop()?;
                    self.stack.push(object::bang(&operand)?)?;
                }
                Opcode::OpJumpNotTruthy => {
                    let jump_addr = self.frame().read_u16_from_instructions()?;
                    let condition = match self.stack.pop()? {
                        Object::Bool(val) => val,
                        other => {
                            return OperandMismatchSnafu {
                                op: "condition",
                                expected: TypeTag::Bool,
                                found: other.type_name(),
                            }
                            .fail()
                        }
                    };

                    if !condition {
                        self.frame().ip = jump_addr as usize;
                    }
                }
                Opcode::OpJump => {
                    let jump_addr = self.frame().read_u16_from_instructions()?;
                    self.frame().ip = jump_addr as usize;
                }
                Opcode::OpGetLocal => {
                    let (base_pointer, slot) = self.read_local()?;
                    let value = self.stack.get_local(base_pointer, slot)?.clone();
                    self.stack.push(value)?;
                }
                Opcode::OpSetLocal => {
                    let (base_pointer, slot) = self.read_local()?;
                    let value = self.stack.pop()?;
                    self.stack.set_local(base_pointer, slot, value)?;
                }
                Opcode::OpCall => {
                    let index = self.frame().read_u16_from_instructions()?;
                    self.call(index)?;
                }
                Opcode::OpReturnValue => {
                    let value = self.stack.pop()?;
                    if let Some(value) = self.return_from_call(value)? {
                        return Ok(value);
                    }
                }
                Opcode::OpReturn => {
                    if let Some(value) = self.return_from_call(Object::Void)? {
                        return Ok(value);
                    }
                }
                Opcode::OpPrint => {
                    let const_index = self.frame().read_u16_from_instructions()?;
                    let argc = self.frame().read_u8_from_instructions()? as usize;
                    self.print(const_index, argc)?;
                }
            }
        }
    }

    fn frame(&mut self) -> &mut Frame<'a> {
        // `run` pushes the entry frame before dispatching and returns when
        // the last frame is popped.
        match self.frames.last_mut() {
            Some(frame) => frame,
            None => unreachable!("no active frame"),
        }
    }

    fn constant(&self, index: u16) -> Result<&'a Object, RuntimeError> {
        self.module
            .constants
            .get(index as usize)
            .ok_or(RuntimeError::InvalidConstant { index })
    }

    fn read_type_tag(&mut self) -> Result<TypeTag, RuntimeError> {
        let byte = self.frame().read_u8_from_instructions()?;
        TypeTag::try_from(byte)
            .ok()
            .ok_or(RuntimeError::InvalidTypeTag { byte })
    }

    fn read_local(&mut self) -> Result<(usize, u16), RuntimeError> {
        let frame = self.frame();
        let slot = frame.read_u16_from_instructions()?;
        if slot >= frame.function.locals {
            return InvalidLocalSnafu { slot }.fail();
        }
        Ok((frame.base_pointer, slot))
    }

    fn arith(&mut self, op: ArithOp) -> Result<(), RuntimeError> {
        let tag = self.read_type_tag()?;
        let right = self.stack.pop()?;
        let left = self.stack.pop()?;
        self.stack.push(object::arith(op, tag, &left, &right)?)
    }

    fn compare(&mut self, op: CompareOp) -> Result<(), RuntimeError> {
        let right = self.stack.pop()?;
        let left = self.stack.pop()?;
        self.stack.push(Object::Bool(object::compare(op, &left, &right)?))
    }

    /// Pushes a frame for function `index`. Its arguments are already on the
    /// stack and become the first slots of the frame.
    fn call(&mut self, index: u16) -> Result<(), RuntimeError> {
        let function: &'a Function = self
            .module
            .functions
            .get(index as usize)
            .ok_or(RuntimeError::InvalidFunction { index })?;

        if self.frames.len() >= self.config.max_frames {
            return CallDepthExceededSnafu {
                limit: self.config.max_frames,
            }
            .fail();
        }

        let params = function.params as usize;
        let floor = self.frames.last().map_or(0, |frame| frame.base_pointer);
        if self.stack.sp < floor + params {
            return Err(RuntimeError::StackUnderflow);
        }

        let base_pointer = self.stack.sp - params;
        let locals = (function.locals as usize).saturating_sub(params);
        self.stack.add_sp(locals)?;

        trace!(
            function = %function.name,
            depth = self.frames.len() + 1,
            base_pointer,
            "call"
        );
        self.frames.push(Frame::new(function, base_pointer));
        Ok(())
    }

    /// Pops the current frame. Returns the program result once the entry
    /// function returns.
    fn return_from_call(&mut self, value: Object) -> Result<Option<Object>, RuntimeError> {
        let frame = self.frames.pop().ok_or(RuntimeError::StackUnderflow)?;
        self.stack.truncate(frame.base_pointer);
        trace!(function = %frame.function.name, "return");

        if self.frames.is_empty() {
            return Ok(Some(value));
        }
        if value != Object::Void {
            self.stack.push(value)?;
        }
        Ok(None)
    }

    fn print(&mut self, const_index: u16, argc: usize) -> Result<(), RuntimeError> {
        let template = match self.constant(const_index)? {
            Object::Str(template) => template,
            other => {
                return OperandMismatchSnafu {
                    op: "print",
                    expected: TypeTag::Str,
                    found: other.type_name(),
                }
                .fail()
            }
        };

        let args = self.stack.pop_many(argc)?;
        let text = format::format_template(template, &args)
            .ok_or(RuntimeError::FormatArity { args: argc })?;
        self.out.write_all(text.as_bytes()).context(OutputSnafu)
    }
}
