use std::collections::HashMap;

use crate::{token::Span, types::TypeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Global,
    Procedure,
    Block,
}

#[derive(Debug)]
pub struct Scope {
    pub parent: Option<ScopeId>,
    pub kind: ScopeKind,
    symbols: HashMap<String, SymbolId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Print,
    Println,
}

impl Builtin {
    pub const ALL: [Builtin; 2] = [Builtin::Print, Builtin::Println];

    pub fn name(&self) -> &'static str {
        match self {
            Builtin::Print => "print",
            Builtin::Println => "println",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Builtin(Builtin),
    Procedure { index: u32 },
    Parameter { slot: u32 },
    Local { slot: u32, mutable: bool },
}

impl SymbolKind {
    /// Frame slot of a value symbol.
    pub fn slot(&self) -> Option<u32> {
        match self {
            SymbolKind::Parameter { slot } | SymbolKind::Local { slot, .. } => Some(*slot),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub scope: ScopeId,
    /// Declaration site; `None` for built-ins.
    pub span: Option<Span>,
    /// Filled in by the type checker.
    pub ty: Option<TypeId>,
}

/// Arena of scopes and symbols. Scopes refer to their parent by index, so
/// chains always end at the global scope.
#[derive(Debug)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    symbols: Vec<Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope {
                parent: None,
                kind: ScopeKind::Global,
                symbols: HashMap::new(),
            }],
            symbols: Vec::new(),
        }
    }

    pub fn global(&self) -> ScopeId {
        ScopeId(0)
    }

    pub fn push_scope(&mut self, parent: ScopeId, kind: ScopeKind) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope {
            parent: Some(parent),
            kind,
            symbols: HashMap::new(),
        });
        id
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0 as usize]
    }

    /// Adds a symbol to the arena without making it visible in any scope.
    pub fn add(&mut self, symbol: Symbol) -> SymbolId {
        let id = SymbolId(self.symbols.len() as u32);
        self.symbols.push(symbol);
        id
    }

    /// Declares `name` in `scope`. On a duplicate nothing is declared and
    /// the existing symbol is returned as the error.
    pub fn define(
        &mut self,
        scope: ScopeId,
        name: &str,
        kind: SymbolKind,
        span: Option<Span>,
    ) -> Result<SymbolId, SymbolId> {
        if let Some(existing) = self.lookup_local(scope, name) {
            return Err(existing);
        }

        let id = self.add(Symbol {
            name: name.to_string(),
            kind,
            scope,
            span,
            ty: None,
        });
        self.scopes[scope.0 as usize]
            .symbols
            .insert(name.to_string(), id);
        Ok(id)
    }

    pub fn lookup_local(&self, scope: ScopeId, name: &str) -> Option<SymbolId> {
        self.scope(scope).symbols.get(name).copied()
    }

    /// Finds `name` in `scope` or the nearest enclosing scope.
    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<SymbolId> {
        let mut current = Some(scope);
        while let Some(scope) = current {
            if let Some(id) = self.lookup_local(scope, name) {
                return Some(id);
            }
            current = self.scope(scope).parent;
        }

        None
    }

    pub fn get(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.0 as usize]
    }

    pub fn set_type(&mut self, id: SymbolId, ty: TypeId) {
        self.symbols[id.0 as usize].ty = Some(ty);
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn scope_count(&self) -> usize {
        self.scopes.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SymbolId, &Symbol)> {
        self.symbols
            .iter()
            .enumerate()
            .map(|(idx, symbol)| (SymbolId(idx as u32), symbol))
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_define() {
        let mut table = SymbolTable::new();
        let global = table.global();

        let a = table
            .define(global, "a", SymbolKind::Procedure { index: 0 }, None)
            .unwrap();
        let b = table
            .define(global, "b", SymbolKind::Procedure { index: 1 }, None)
            .unwrap();

        assert_eq!(table.get(a).name, "a");
        assert_eq!(table.get(b).kind, SymbolKind::Procedure { index: 1 });
        assert_eq!(
            table.define(global, "a", SymbolKind::Procedure { index: 2 }, None),
            Err(a)
        );
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_local() {
        let mut table = SymbolTable::new();
        let global = table.global();
        let outer = table
            .define(global, "x", SymbolKind::Procedure { index: 0 }, None)
            .unwrap();

        let proc_scope = table.push_scope(global, ScopeKind::Procedure);
        let param = table
            .define(proc_scope, "n", SymbolKind::Parameter { slot: 0 }, None)
            .unwrap();

        let block = table.push_scope(proc_scope, ScopeKind::Block);
        let shadow = table
            .define(
                block,
                "x",
                SymbolKind::Local {
                    slot: 1,
                    mutable: true,
                },
                None,
            )
            .unwrap();

        assert_eq!(table.lookup(block, "x"), Some(shadow));
        assert_eq!(table.lookup(block, "n"), Some(param));
        assert_eq!(table.lookup(proc_scope, "x"), Some(outer));
        assert_eq!(table.lookup(global, "n"), None);
        assert_eq!(table.scope(block).parent, Some(proc_scope));
        assert_eq!(table.get(shadow).kind.slot(), Some(1));
    }
}
