use byteorder::{BigEndian, ByteOrder};

use crate::bytecode::Function;

use super::{RuntimeError, TruncatedInstructionSnafu};

/// Activation record of one call.
#[derive(Debug, Clone)]
pub struct Frame<'a> {
    pub function: &'a Function,
    pub ip: usize,
    /// Stack index of the first parameter.
    pub base_pointer: usize,
}

impl<'a> Frame<'a> {
    pub fn new(function: &'a Function, base_pointer: usize) -> Self {
        Self {
            function,
            ip: 0,
            base_pointer,
        }
    }

    pub fn read_u8_from_instructions(&mut self) -> Result<u8, RuntimeError> {
        let val = *self
            .function
            .instructions
            .get(self.ip)
            .ok_or_else(|| TruncatedInstructionSnafu { offset: self.ip }.build())?;
        self.ip += 1;
        Ok(val)
    }

    pub fn read_u16_from_instructions(&mut self) -> Result<u16, RuntimeError> {
        let bytes = self
            .function
            .instructions
            .get(self.ip..self.ip + 2)
            .ok_or_else(|| TruncatedInstructionSnafu { offset: self.ip }.build())?;
        let val = BigEndian::read_u16(bytes);
        self.ip += 2;
        Ok(val)
    }
}
