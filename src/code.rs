use std::fmt::{self, Write};

use byteorder::{BigEndian, ByteOrder};
use num_enum::TryFromPrimitive;
use snafu::Snafu;

pub struct Definition {
    pub name: &'static str,
    pub operand_widths: &'static [usize],
}

pub type Instructions = Vec<u8>;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
pub enum Opcode {
    OpConstant,
    OpAdd,
    OpSub,
    OpMul,
    OpDiv,
    OpRem,
    OpPop,
    OpTrue,
    OpFalse,
    OpEqual,
    OpNotEqual,
    OpLessThan,
    OpLessEqual,
    OpGreaterThan,
    OpGreaterEqual,
    OpNegate,
    OpBang,
    OpJumpNotTruthy,
    OpJump,
    OpGetLocal,
    OpSetLocal,
    OpCall,
    OpReturnValue,
    OpReturn,
    OpPrint,
}

impl Opcode {
    pub fn definition(&self) -> Definition {
        let (name, operand_widths): (&'static str, &'static [usize]) = match self {
            Opcode::OpConstant => ("OpConstant", &[2]),
            Opcode::OpAdd => ("OpAdd", &[1]),
            Opcode::OpSub => ("OpSub", &[1]),
            Opcode::OpMul => ("OpMul", &[1]),
            Opcode::OpDiv => ("OpDiv", &[1]),
            Opcode::OpRem => ("OpRem", &[1]),
            Opcode::OpPop => ("OpPop", &[]),
            Opcode::OpTrue => ("OpTrue", &[]),
            Opcode::OpFalse => ("OpFalse", &[]),
            Opcode::OpEqual => ("OpEqual", &[]),
            Opcode::OpNotEqual => ("OpNotEqual", &[]),
            Opcode::OpLessThan => ("OpLessThan", &[]),
            Opcode::OpLessEqual => ("OpLessEqual", &[]),
            Opcode::OpGreaterThan => ("OpGreaterThan", &[]),
            Opcode::OpGreaterEqual => ("OpGreaterEqual", &[]),
            Opcode::OpNegate => ("OpNegate", &[1]),
            Opcode::OpBang => ("OpBang", &[]),
            Opcode::OpJumpNotTruthy => ("OpJumpNotTruthy", &[2]),
            Opcode::OpJump => ("OpJump", &[2]),
            Opcode::OpGetLocal => ("OpGetLocal", &[2]),
            Opcode::OpSetLocal => ("OpSetLocal", &[2]),
            Opcode::OpCall => ("OpCall", &[2]),
            Opcode::OpReturnValue => ("OpReturnValue", &[]),
            Opcode::OpReturn => ("OpReturn", &[]),
            // format constant, argument count
            Opcode::OpPrint => ("OpPrint", &[2, 1]),
        };

        Definition {
            name,
            operand_widths,
        }
    }

    /// Whether the single one-byte operand is a [TypeTag].
    pub fn has_type_operand(&self) -> bool {
        matches!(
            self,
            Opcode::OpAdd
                | Opcode::OpSub
                | Opcode::OpMul
                | Opcode::OpDiv
                | Opcode::OpRem
                | Opcode::OpNegate
        )
    }

    pub fn to_byte(&self) -> u8 {
        *self as u8
    }
}

/// Runtime type of a value, carried by typed instructions and function
/// headers.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive)]
pub enum TypeTag {
    Void,
    Bool,
    Str,
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F64,
}

impl TypeTag {
    /// Width in bits of an integer tag.
    pub fn int_bits(&self) -> Option<u32> {
        match self {
            TypeTag::U8 | TypeTag::I8 => Some(8),
            TypeTag::U16 | TypeTag::I16 => Some(16),
            TypeTag::U32 | TypeTag::I32 => Some(32),
            TypeTag::U64 | TypeTag::I64 => Some(64),
            _ => None,
        }
    }

    pub fn is_signed(&self) -> bool {
        matches!(self, TypeTag::I8 | TypeTag::I16 | TypeTag::I32 | TypeTag::I64)
    }

    pub fn name(&self) -> &'static str {
        match self {
            TypeTag::Void => "void",
            TypeTag::Bool => "bool",
            TypeTag::Str => "str",
            TypeTag::U8 => "u8",
            TypeTag::U16 => "u16",
            TypeTag::U32 => "u32",
            TypeTag::U64 => "u64",
            TypeTag::I8 => "i8",
            TypeTag::I16 => "i16",
            TypeTag::I32 => "i32",
            TypeTag::I64 => "i64",
            TypeTag::F64 => "f64",
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub fn make(op: Opcode, operands: &[u16]) -> Vec<u8> {
    let def = op.definition();
    debug_assert_eq!(def.operand_widths.len(), operands.len(), "{}", def.name);

    let instruction_len = 1 + def.operand_widths.iter().sum::<usize>();
    let mut instruction = vec![0; instruction_len];
    instruction[0] = op.to_byte();

    let mut offset = 1;
    for (operand, width) in operands.iter().zip(def.operand_widths) {
        match width {
            2 => BigEndian::write_u16(&mut instruction[offset..], *operand),
            1 => instruction[offset] = *operand as u8,
            _ => unreachable!("unsupported operand width {}", width),
        }
        offset += width;
    }

    instruction
}

/// Reads the operands of an instruction whose opcode has already been
/// consumed. Returns `None` if `ins` is too short.
pub fn read_operands(def: &Definition, ins: &[u8]) -> Option<(Vec<u16>, usize)> {
    let mut operands = Vec::with_capacity(def.operand_widths.len());
    let mut offset = 0;

    for width in def.operand_widths {
        let bytes = ins.get(offset..offset + width)?;
        let operand = match width {
            2 => BigEndian::read_u16(bytes),
            1 => bytes[0] as u16,
            _ => unreachable!("unsupported operand width {}", width),
        };
        operands.push(operand);
        offset += width;
    }

    Some((operands, offset))
}

#[derive(Debug, Snafu, PartialEq, Eq)]
pub enum DisassembleError {
    #[snafu(display("invalid opcode {:#04x} at offset {}", byte, offset))]
    InvalidOpcode { byte: u8, offset: usize },
    #[snafu(display("truncated instruction at offset {}", offset))]
    Truncated { offset: usize },
}

pub fn disassemble(instructions: &[u8]) -> Result<String, DisassembleError> {
    let mut result = String::new();
    let mut idx = 0;

    while idx < instructions.len() {
        let op_byte = instructions[idx];
        let op_offset = idx;
        idx += 1;

        let op = Opcode::try_from(op_byte).map_err(|_| DisassembleError::InvalidOpcode {
            byte: op_byte,
            offset: op_offset,
        })?;
        let def = op.definition();
        let (operands, read) = read_operands(&def, &instructions[idx..])
            .ok_or(DisassembleError::Truncated { offset: op_offset })?;

        let _ = write!(&mut result, "{:04} {}", op_offset, def.name);
        for operand in &operands {
            match TypeTag::try_from(*operand as u8) {
                Ok(tag) if op.has_type_operand() => {
                    let _ = write!(&mut result, " {}", tag);
                }
                _ => {
                    let _ = write!(&mut result, " {}", operand);
                }
            }
        }
        result.push('\n');

        idx += read;
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_to_u8() {
        assert_eq!(Opcode::OpConstant as u8, 0);
        assert_eq!(Opcode::try_from(Opcode::OpPrint as u8).ok(), Some(Opcode::OpPrint));
        assert!(Opcode::try_from(0xff).is_err());
    }

    #[test]
    fn test_make() {
        // opcode, operands, expected instructions
        #[rustfmt::skip]
        let tests = [
            (Opcode::OpConstant, vec![65534_u16], vec![Opcode::OpConstant as u8, 255_u8, 254_u8]),
            (
                Opcode::OpAdd,
                vec![TypeTag::U64 as u16],
                vec![Opcode::OpAdd as u8, TypeTag::U64 as u8],
            ),
            (Opcode::OpPop, vec![], vec![Opcode::OpPop as u8]),
            (Opcode::OpPrint, vec![258, 3], vec![Opcode::OpPrint as u8, 1, 2, 3]),
        ];

        for (op, operands, expected) in tests {
            assert_eq!(make(op, &operands), expected);
        }
    }

    #[test]
    fn disassemble_instructions() {
        let instructions: Vec<u8> = [
            make(Opcode::OpConstant, &[1]),
            make(Opcode::OpConstant, &[65535]),
            make(Opcode::OpAdd, &[TypeTag::I64 as u16]),
            make(Opcode::OpRem, &[TypeTag::U8 as u16]),
            make(Opcode::OpNegate, &[TypeTag::F64 as u16]),
            make(Opcode::OpLessThan, &[]),
            make(Opcode::OpJumpNotTruthy, &[100]),
            make(Opcode::OpJump, &[200]),
            make(Opcode::OpGetLocal, &[1]),
            make(Opcode::OpSetLocal, &[2]),
            make(Opcode::OpCall, &[0]),
            make(Opcode::OpPrint, &[3, 2]),
            make(Opcode::OpReturn, &[]),
        ]
        .concat();

        let expected = "0000 OpConstant 1
0003 OpConstant 65535
0006 OpAdd i64
0008 OpRem u8
0010 OpNegate f64
0012 OpLessThan
0013 OpJumpNotTruthy 100
0016 OpJump 200
0019 OpGetLocal 1
0022 OpSetLocal 2
0025 OpCall 0
0028 OpPrint 3 2
0032 OpReturn
";

        assert_eq!(disassemble(&instructions).unwrap(), expected);
    }

    #[test]
    fn disassemble_rejects_garbage() {
        assert_eq!(
            disassemble(&[Opcode::OpTrue as u8, 0xee]),
            Err(DisassembleError::InvalidOpcode {
                byte: 0xee,
                offset: 1
            })
        );
        assert_eq!(
            disassemble(&[Opcode::OpConstant as u8, 0]),
            Err(DisassembleError::Truncated { offset: 0 })
        );
    }
}
