//! Symbol environment: global labels/equates and per-procedure scopes.
//!
//! The reference assembler keeps these as prepend-ordered linked lists; here
//! they are `HashMap`s keyed by a case-folded name, with insertion order kept
//! separately so the listing dump can still be produced most-recent-first.

use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub value: u32,
    pub line: usize,
}

/// Name -> symbol, plus the order symbols were inserted in (front = newest),
/// matching the reference's `prev`-linked singly-linked list traversal order.
#[derive(Debug, Default, Clone)]
pub struct SymbolTable {
    entries: HashMap<String, Symbol>,
    order: Vec<String>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable::default()
    }

    fn key(name: &str, case_sensitive: bool) -> String {
        if case_sensitive {
            name.to_string()
        } else {
            name.to_lowercase()
        }
    }

    pub fn find(&self, name: &str, case_sensitive: bool) -> Option<&Symbol> {
        self.entries.get(&Self::key(name, case_sensitive))
    }

    /// Insert a symbol, failing if one with the same (case-folded) name
    /// already exists in this table.
    pub fn insert(
        &mut self,
        name: &str,
        value: u32,
        line: usize,
        case_sensitive: bool,
    ) -> Result<(), ()> {
        let key = Self::key(name, case_sensitive);
        if self.entries.contains_key(&key) {
            return Err(());
        }
        self.entries.insert(
            key.clone(),
            Symbol {
                name: name.to_string(),
                value,
                line,
            },
        );
        self.order.insert(0, key);
        Ok(())
    }

    /// Iterate newest-first, matching the reference's dump order.
    pub fn iter_newest_first(&self) -> impl Iterator<Item = &Symbol> {
        self.order.iter().filter_map(move |k| self.entries.get(k))
    }
}

/// A named lexical scope entered by `proc`, left by `endp`.
#[derive(Debug, Default, Clone)]
pub struct Procedure {
    pub name: String,
    pub labels: SymbolTable,
    pub equs: SymbolTable,
    pub globals: SymbolTable,
    pub line: usize,
}

impl Procedure {
    pub fn new(name: &str, line: usize) -> Self {
        Procedure {
            name: name.to_string(),
            labels: SymbolTable::new(),
            equs: SymbolTable::new(),
            globals: SymbolTable::new(),
            line,
        }
    }
}
