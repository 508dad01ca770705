use std::{cmp::Ordering, fmt::Display, rc::Rc};

use crate::{
    code::TypeTag,
    vm::{OperandMismatchSnafu, OverflowSnafu, RuntimeError},
};

/// A runtime value. Integers are stored widened; the [TypeTag] carried by
/// arithmetic instructions gives their actual width.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
    Str(Rc<str>),
    Void,
}

impl Object {
    pub fn type_name(&self) -> &'static str {
        match self {
            Object::Int(_) => "signed integer",
            Object::UInt(_) => "unsigned integer",
            Object::Float(_) => "f64",
            Object::Bool(_) => "bool",
            Object::Str(_) => "str",
            Object::Void => "void",
        }
    }

    /// Constant-pool identity: floats compare by bit pattern.
    pub fn same_constant(&self, other: &Object) -> bool {
        match (self, other) {
            (Object::Float(a), Object::Float(b)) => a.to_bits() == b.to_bits(),
            _ => self == other,
        }
    }
}

impl Default for Object {
    fn default() -> Self {
        Object::Void
    }
}

impl Display for Object {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Object::Int(val) => write!(f, "{}", val),
            Object::UInt(val) => write!(f, "{}", val),
            Object::Float(val) => write!(f, "{}", val),
            Object::Bool(val) => write!(f, "{}", val),
            Object::Str(val) => f.write_str(val),
            Object::Void => f.write_str("void"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl ArithOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
            ArithOp::Rem => "%",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
}

fn signed_bounds(bits: u32) -> (i64, i64) {
    if bits == 64 {
        (i64::MIN, i64::MAX)
    } else {
        let half = 1i64 << (bits - 1);
        (-half, half - 1)
    }
}

fn unsigned_mask(bits: u32) -> u64 {
    if bits == 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

fn mismatch(op: &'static str, tag: TypeTag, lhs: &Object, rhs: &Object) -> RuntimeError {
    OperandMismatchSnafu {
        op,
        expected: tag,
        found: format!("{} and {}", lhs.type_name(), rhs.type_name()),
    }
    .build()
}

/// Applies an arithmetic operator to two operands of type `tag`.
///
/// Unsigned results wrap modulo 2^width, signed results that leave the
/// range of the type are [RuntimeError::Overflow], floats follow IEEE 754.
pub fn arith(
    op: ArithOp,
    tag: TypeTag,
    lhs: &Object,
    rhs: &Object,
) -> Result<Object, RuntimeError> {
    let symbol = op.symbol();

    match (lhs, rhs) {
        (Object::Int(a), Object::Int(b)) if tag.is_signed() => {
            let (a, b) = (*a, *b);
            let bits = tag.int_bits().unwrap_or(64);
            let (min, max) = signed_bounds(bits);

            if matches!(op, ArithOp::Div | ArithOp::Rem) {
                if b == 0 {
                    return Err(RuntimeError::DivisionByZero);
                }
                if a == min && b == -1 {
                    return OverflowSnafu { op: symbol, ty: tag }.fail();
                }
            }

            let value = match op {
                ArithOp::Add => a.checked_add(b),
                ArithOp::Sub => a.checked_sub(b),
                ArithOp::Mul => a.checked_mul(b),
                ArithOp::Div => a.checked_div(b),
                ArithOp::Rem => a.checked_rem(b),
            };

            match value {
                Some(value) if (min..=max).contains(&value) => Ok(Object::Int(value)),
                _ => OverflowSnafu { op: symbol, ty: tag }.fail(),
            }
        }
        (Object::UInt(a), Object::UInt(b)) if tag.int_bits().is_some() && !tag.is_signed() => {
            let (a, b) = (*a, *b);
            let mask = unsigned_mask(tag.int_bits().unwrap_or(64));

            let value = match op {
                ArithOp::Add => a.wrapping_add(b),
                ArithOp::Sub => a.wrapping_sub(b),
                ArithOp::Mul => a.wrapping_mul(b),
                ArithOp::Div => a.checked_div(b).ok_or(RuntimeError::DivisionByZero)?,
                ArithOp::Rem => a.checked_rem(b).ok_or(RuntimeError::DivisionByZero)?,
            };

            Ok(Object::UInt(value & mask))
        }
        (Object::Float(a), Object::Float(b)) if tag == TypeTag::F64 => {
            let value = match op {
                ArithOp::Add => a + b,
                ArithOp::Sub => a - b,
                ArithOp::Mul => a * b,
                ArithOp::Div => a / b,
                ArithOp::Rem => a % b,
            };
            Ok(Object::Float(value))
        }
        _ => Err(mismatch(symbol, tag, lhs, rhs)),
    }
}

pub fn negate(tag: TypeTag, operand: &Object) -> Result<Object, RuntimeError> {
    match operand {
        Object::Int(val) if tag.is_signed() => {
            let (min, _) = signed_bounds(tag.int_bits().unwrap_or(64));
            if *val == min {
                return OverflowSnafu { op: "-", ty: tag }.fail();
            }
            Ok(Object::Int(-val))
        }
        Object::Float(val) if tag == TypeTag::F64 => Ok(Object::Float(-val)),
        _ => OperandMismatchSnafu {
            op: "-",
            expected: tag,
            found: operand.type_name(),
        }
        .fail(),
    }
}

pub fn bang(operand: &Object) -> Result<Object, RuntimeError> {
    match operand {
        Object::Bool(val) => Ok(Object::Bool(!val)),
        _ => OperandMismatchSnafu {
            op: "!",
            expected: TypeTag::Bool,
            found: operand.type_name(),
        }
        .fail(),
    }
}

/// Compares two operands of the same runtime kind. Comparisons involving
/// NaN are false except `!=`.
pub fn compare(op: CompareOp, lhs: &Object, rhs: &Object) -> Result<bool, RuntimeError> {
    let ordering = match (lhs, rhs) {
        (Object::Int(a), Object::Int(b)) => a.partial_cmp(b),
        (Object::UInt(a), Object::UInt(b)) => a.partial_cmp(b),
        (Object::Float(a), Object::Float(b)) => a.partial_cmp(b),
        (Object::Bool(a), Object::Bool(b)) => a.partial_cmp(b),
        (Object::Str(a), Object::Str(b)) => a.partial_cmp(b),
        (Object::Void, Object::Void) => Some(Ordering::Equal),
        _ => {
            return OperandMismatchSnafu {
                op: "comparison",
                expected: TypeTag::Void,
                found: format!("{} and {}", lhs.type_name(), rhs.type_name()),
            }
            .fail()
        }
    };

    let result = match op {
        CompareOp::Equal => ordering == Some(Ordering::Equal),
        CompareOp::NotEqual => ordering != Some(Ordering::Equal),
        CompareOp::LessThan => ordering == Some(Ordering::Less),
        CompareOp::LessEqual => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
        CompareOp::GreaterThan => ordering == Some(Ordering::Greater),
        CompareOp::GreaterEqual => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
    };
    Ok(result)
}
