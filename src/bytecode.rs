//! Compiled modules and their binary file format.
//!
//! All integers are big-endian:
//!
//! ```text
//! "ELNB" u16:version u16:entry
//! u32:constant_count { u8:tag payload }*
//! u32:function_count { u32:name_len name u16:params u16:locals u8:ret u32:code_len code }*
//! ```

use std::{
    fmt::Write as _,
    io::{self, Read, Write},
    rc::Rc,
};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use snafu::{ensure, ResultExt, Snafu};

use crate::{
    code::{self, Instructions, TypeTag},
    object::Object,
};

pub const MAGIC: &[u8; 4] = b"ELNB";
pub const VERSION: u16 = 1;

const TAG_INT: u8 = 0;
const TAG_UINT: u8 = 1;
const TAG_FLOAT: u8 = 2;
const TAG_STR: u8 = 3;
const TAG_BOOL: u8 = 4;

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub params: u16,
    /// Total slot count, parameters included.
    pub locals: u16,
    pub ret: TypeTag,
    pub instructions: Instructions,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub constants: Vec<Object>,
    pub functions: Vec<Function>,
    /// Index of `main` in `functions`.
    pub entry: u16,
}

#[derive(Debug, Snafu)]
pub enum LoadError {
    #[snafu(display("failed to read module: {}", source))]
    Io { source: io::Error },

    #[snafu(display("not an ELAN module (bad magic {:?})", found))]
    BadMagic { found: [u8; 4] },

    #[snafu(display("unsupported module version {} (expected {})", found, VERSION))]
    VersionMismatch { found: u16 },

    #[snafu(display("invalid constant tag {} at constant {}", tag, index))]
    InvalidConstantTag { tag: u8, index: u32 },

    #[snafu(display("invalid return type tag {} in function {}", tag, index))]
    InvalidTypeTag { tag: u8, index: u32 },

    #[snafu(display("string in module is not valid UTF-8"))]
    InvalidUtf8 { source: std::string::FromUtf8Error },

    #[snafu(display("entry index {} out of range for {} function(s)", entry, count))]
    EntryOutOfRange { entry: u16, count: usize },
}

fn write_str<W: Write>(writer: &mut W, text: &str) -> io::Result<()> {
    writer.write_u32::<BigEndian>(text.len() as u32)?;
    writer.write_all(text.as_bytes())
}

fn read_bytes<R: Read>(reader: &mut R) -> Result<Vec<u8>, LoadError> {
    let len = reader.read_u32::<BigEndian>().context(IoSnafu)?;
    let mut buf = Vec::new();
    reader
        .take(len as u64)
        .read_to_end(&mut buf)
        .context(IoSnafu)?;
    if buf.len() != len as usize {
        return Err(io::Error::from(io::ErrorKind::UnexpectedEof)).context(IoSnafu);
    }
    Ok(buf)
}

fn read_str<R: Read>(reader: &mut R) -> Result<String, LoadError> {
    String::from_utf8(read_bytes(reader)?).context(InvalidUtf8Snafu)
}

impl Module {
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(MAGIC)?;
        writer.write_u16::<BigEndian>(VERSION)?;
        writer.write_u16::<BigEndian>(self.entry)?;

        writer.write_u32::<BigEndian>(self.constants.len() as u32)?;
        for constant in &self.constants {
            match constant {
                Object::Int(val) => {
                    writer.write_u8(TAG_INT)?;
                    writer.write_i64::<BigEndian>(*val)?;
                }
                Object::UInt(val) => {
                    writer.write_u8(TAG_UINT)?;
                    writer.write_u64::<BigEndian>(*val)?;
                }
                Object::Float(val) => {
                    writer.write_u8(TAG_FLOAT)?;
                    writer.write_u64::<BigEndian>(val.to_bits())?;
                }
                Object::Str(val) => {
                    writer.write_u8(TAG_STR)?;
                    write_str(writer, val)?;
                }
                Object::Bool(val) => {
                    writer.write_u8(TAG_BOOL)?;
                    writer.write_u8(*val as u8)?;
                }
                Object::Void => unreachable!("void is never a constant"),
            }
        }

        writer.write_u32::<BigEndian>(self.functions.len() as u32)?;
        for function in &self.functions {
            write_str(writer, &function.name)?;
            writer.write_u16::<BigEndian>(function.params)?;
            writer.write_u16::<BigEndian>(function.locals)?;
            writer.write_u8(function.ret as u8)?;
            writer.write_u32::<BigEndian>(function.instructions.len() as u32)?;
            writer.write_all(&function.instructions)?;
        }

        Ok(())
    }

    pub fn read_from<R: Read>(reader: &mut R) -> Result<Module, LoadError> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic).context(IoSnafu)?;
        ensure!(&magic == MAGIC, BadMagicSnafu { found: magic });

        let version = reader.read_u16::<BigEndian>().context(IoSnafu)?;
        ensure!(version == VERSION, VersionMismatchSnafu { found: version });
        let entry = reader.read_u16::<BigEndian>().context(IoSnafu)?;

        let constant_count = reader.read_u32::<BigEndian>().context(IoSnafu)?;
        let mut constants = Vec::new();
        for index in 0..constant_count {
            let tag = reader.read_u8().context(IoSnafu)?;
            let constant = match tag {
                TAG_INT => Object::Int(reader.read_i64::<BigEndian>().context(IoSnafu)?),
                TAG_UINT => Object::UInt(reader.read_u64::<BigEndian>().context(IoSnafu)?),
                TAG_FLOAT => Object::Float(f64::from_bits(
                    reader.read_u64::<BigEndian>().context(IoSnafu)?,
                )),
                TAG_STR => Object::Str(Rc::from(read_str(reader)?)),
                TAG_BOOL => Object::Bool(reader.read_u8().context(IoSnafu)? != 0),
                _ => return InvalidConstantTagSnafu { tag, index }.fail(),
            };
            constants.push(constant);
        }

        let function_count = reader.read_u32::<BigEndian>().context(IoSnafu)?;
        let mut functions = Vec::new();
        for index in 0..function_count {
            let name = read_str(reader)?;
            let params = reader.read_u16::<BigEndian>().context(IoSnafu)?;
            let locals = reader.read_u16::<BigEndian>().context(IoSnafu)?;
            let tag = reader.read_u8().context(IoSnafu)?;
            let ret = TypeTag::try_from(tag)
                .ok()
                .ok_or(LoadError::InvalidTypeTag { tag, index })?;
            let instructions = read_bytes(reader)?;

            functions.push(Function {
                name,
                params,
                locals,
                ret,
                instructions,
            });
        }

        ensure!(
            (entry as usize) < functions.len(),
            EntryOutOfRangeSnafu {
                entry,
                count: functions.len()
            }
        );

        Ok(Module {
            constants,
            functions,
            entry,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        // writing into a Vec cannot fail
        let _ = self.write_to(&mut bytes);
        bytes
    }

    pub fn from_bytes(mut bytes: &[u8]) -> Result<Module, LoadError> {
        Module::read_from(&mut bytes)
    }

    /// Whether `bytes` starts with the module magic.
    pub fn is_module(bytes: &[u8]) -> bool {
        bytes.starts_with(MAGIC)
    }

    /// Human-readable listing of the constant pool and every function.
    pub fn disassemble(&self) -> String {
        let mut out = String::new();

        let _ = writeln!(out, "constants:");
        for (idx, constant) in self.constants.iter().enumerate() {
            match constant {
                Object::Str(val) => {
                    let _ = writeln!(out, "  {:04} str {:?}", idx, val);
                }
                other => {
                    let _ = writeln!(out, "  {:04} {} {}", idx, other.type_name(), other);
                }
            }
        }

        for (idx, function) in self.functions.iter().enumerate() {
            let entry = if idx == self.entry as usize { " (entry)" } else { "" };
            let _ = writeln!(
                out,
                "\nfn {} {}: params={} locals={} ret={}{}",
                idx, function.name, function.params, function.locals, function.ret, entry
            );
            match code::disassemble(&function.instructions) {
                Ok(listing) => out.push_str(&listing),
                Err(err) => {
                    let _ = writeln!(out, "  <{}>", err);
                }
            }
        }

        out
    }
}
