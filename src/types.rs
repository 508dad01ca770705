//! Interned type representation.
//!
//! The language only has primitive types, all of which are interned up front
//! so the well-known ones can be named by constant [TypeId]s.

use std::{collections::HashMap, fmt};

use crate::code::TypeTag;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(u32);

impl TypeId {
    pub const VOID: TypeId = TypeId(0);
    pub const BOOL: TypeId = TypeId(1);
    pub const STR: TypeId = TypeId(2);
    /// Poison type given to expressions that already produced a diagnostic.
    pub const ERROR: TypeId = TypeId(3);
    pub const U8: TypeId = TypeId(4);
    pub const U16: TypeId = TypeId(5);
    pub const U32: TypeId = TypeId(6);
    pub const U64: TypeId = TypeId(7);
    pub const I8: TypeId = TypeId(8);
    pub const I16: TypeId = TypeId(9);
    pub const I32: TypeId = TypeId(10);
    pub const I64: TypeId = TypeId(11);
    pub const F64: TypeId = TypeId(12);

    /// Type of an unsuffixed integer literal with no numeric context.
    pub const DEFAULT_INT: TypeId = TypeId::I64;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Void,
    Bool,
    Str,
    Int { bits: u8, signed: bool },
    Float { bits: u8 },
    Error,
}

impl Type {
    pub fn is_integer(&self) -> bool {
        matches!(self, Type::Int { .. })
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Int { .. } | Type::Float { .. })
    }

    /// Whether unary `-` applies.
    pub fn is_negatable(&self) -> bool {
        matches!(self, Type::Int { signed: true, .. } | Type::Float { .. })
    }

    /// Inclusive value range of an integer type.
    pub fn int_range(&self) -> Option<(i128, i128)> {
        match *self {
            Type::Int { bits, signed: true } => {
                let half = 1i128 << (bits - 1);
                Some((-half, half - 1))
            }
            Type::Int { bits, signed: false } => Some((0, (1i128 << bits) - 1)),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Type::Void => "void",
            Type::Bool => "bool",
            Type::Str => "str",
            Type::Int { bits: 8, signed: false } => "u8",
            Type::Int { bits: 16, signed: false } => "u16",
            Type::Int { bits: 32, signed: false } => "u32",
            Type::Int { bits: 64, signed: false } => "u64",
            Type::Int { bits: 8, signed: true } => "i8",
            Type::Int { bits: 16, signed: true } => "i16",
            Type::Int { bits: 32, signed: true } => "i32",
            Type::Int { bits: 64, signed: true } => "i64",
            Type::Int { .. } => "int",
            Type::Float { .. } => "f64",
            Type::Error => "{error}",
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug)]
pub struct TypeTable {
    types: Vec<Type>,
    ids: HashMap<Type, TypeId>,
}

impl TypeTable {
    pub fn new() -> Self {
        let mut table = Self {
            types: Vec::new(),
            ids: HashMap::new(),
        };

        // order must match the TypeId constants
        for ty in [
            Type::Void,
            Type::Bool,
            Type::Str,
            Type::Error,
            Type::Int { bits: 8, signed: false },
            Type::Int { bits: 16, signed: false },
            Type::Int { bits: 32, signed: false },
            Type::Int { bits: 64, signed: false },
            Type::Int { bits: 8, signed: true },
            Type::Int { bits: 16, signed: true },
            Type::Int { bits: 32, signed: true },
            Type::Int { bits: 64, signed: true },
            Type::Float { bits: 64 },
        ] {
            table.intern(ty);
        }

        table
    }

    pub fn intern(&mut self, ty: Type) -> TypeId {
        if let Some(id) = self.ids.get(&ty) {
            return *id;
        }

        let id = TypeId(self.types.len() as u32);
        self.types.push(ty);
        self.ids.insert(ty, id);
        id
    }

    pub fn get(&self, id: TypeId) -> Type {
        self.types[id.0 as usize]
    }

    pub fn name(&self, id: TypeId) -> &'static str {
        self.get(id).name()
    }

    /// Resolves a type as written in source.
    pub fn lookup_name(&self, name: &str) -> Option<TypeId> {
        let id = match name {
            "void" => TypeId::VOID,
            "bool" => TypeId::BOOL,
            "str" => TypeId::STR,
            "u8" => TypeId::U8,
            "u16" => TypeId::U16,
            "u32" => TypeId::U32,
            "u64" => TypeId::U64,
            "i8" => TypeId::I8,
            "i16" => TypeId::I16,
            "i32" => TypeId::I32,
            "i64" => TypeId::I64,
            "f64" => TypeId::F64,
            _ => return None,
        };
        Some(id)
    }

    /// Runtime tag of a type; `None` for the poison type.
    pub fn tag(&self, id: TypeId) -> Option<TypeTag> {
        let tag = match self.get(id) {
            Type::Void => TypeTag::Void,
            Type::Bool => TypeTag::Bool,
            Type::Str => TypeTag::Str,
            Type::Int { bits: 8, signed: false } => TypeTag::U8,
            Type::Int { bits: 16, signed: false } => TypeTag::U16,
            Type::Int { bits: 32, signed: false } => TypeTag::U32,
            Type::Int { bits: 64, signed: false } => TypeTag::U64,
            Type::Int { bits: 8, signed: true } => TypeTag::I8,
            Type::Int { bits: 16, signed: true } => TypeTag::I16,
            Type::Int { bits: 32, signed: true } => TypeTag::I32,
            Type::Int { bits: 64, signed: true } => TypeTag::I64,
            Type::Float { bits: 64 } => TypeTag::F64,
            Type::Int { .. } | Type::Float { .. } | Type::Error => return None,
        };
        Some(tag)
    }
}

impl Default for TypeTable {
    fn default() -> Self {
        Self::new()
    }
}
