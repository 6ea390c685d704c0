//! Two-level scoped symbol table: class scope (static/field) persists for
//! the life of a class; subroutine scope (argument/local) is cleared at
//! the start of every subroutine.

use std::collections::HashMap;

use crate::error::N2tError;

const MAX_VAR_INDEX: i16 = 32766;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableKind {
    Static,
    Field,
    Argument,
    Local,
}

impl VariableKind {
    fn is_class_scope(&self) -> bool {
        matches!(self, VariableKind::Static | VariableKind::Field)
    }
}

struct Entry {
    var_type: String,
    kind: VariableKind,
    index: i16,
}

pub struct SymbolTable {
    class_table: HashMap<String, Entry>,
    subroutine_table: HashMap<String, Entry>,
    next_index: HashMap<VariableKind, i16>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable {
            class_table: HashMap::new(),
            subroutine_table: HashMap::new(),
            next_index: HashMap::new(),
        }
    }

    /// Clears subroutine-scope entries and resets the Argument/Local
    /// counters; class-scope entries and counters are untouched.
    pub fn start_subroutine(&mut self) {
        self.subroutine_table.clear();
        self.next_index.remove(&VariableKind::Argument);
        self.next_index.remove(&VariableKind::Local);
    }

    pub fn define(&mut self, name: &str, var_type: &str, kind: VariableKind) -> Result<(), N2tError> {
        let index = self.next_var_index(kind)?;
        let table = self.table_mut(kind);
        if table.contains_key(name) {
            return Err(N2tError::semantic(
                "<jack>",
                0,
                format!("identifier with name \"{name}\" already defined in the current scope"),
            ));
        }
        table.insert(
            name.to_string(),
            Entry {
                var_type: var_type.to_string(),
                kind,
                index,
            },
        );
        Ok(())
    }

    pub fn kind_of(&self, name: &str) -> Option<VariableKind> {
        self.lookup(name).map(|entry| entry.kind)
    }

    pub fn type_of(&self, name: &str) -> Result<&str, N2tError> {
        self.lookup(name)
            .map(|entry| entry.var_type.as_str())
            .ok_or_else(|| N2tError::semantic("<jack>", 0, format!("identifier \"{name}\" not defined in the current scope")))
    }

    pub fn index_of(&self, name: &str) -> Result<i16, N2tError> {
        self.lookup(name)
            .map(|entry| entry.index)
            .ok_or_else(|| N2tError::semantic("<jack>", 0, format!("identifier \"{name}\" not defined in the current scope")))
    }

    pub fn var_count(&self, kind: VariableKind) -> i16 {
        self.table(kind).values().filter(|entry| entry.kind == kind).count() as i16
    }

    fn lookup(&self, name: &str) -> Option<&Entry> {
        self.subroutine_table.get(name).or_else(|| self.class_table.get(name))
    }

    fn table(&self, kind: VariableKind) -> &HashMap<String, Entry> {
        if kind.is_class_scope() {
            &self.class_table
        } else {
            &self.subroutine_table
        }
    }

    fn table_mut(&mut self, kind: VariableKind) -> &mut HashMap<String, Entry> {
        if kind.is_class_scope() {
            &mut self.class_table
        } else {
            &mut self.subroutine_table
        }
    }

    fn next_var_index(&mut self, kind: VariableKind) -> Result<i16, N2tError> {
        let next = self.next_index.entry(kind).or_insert(0);
        if *next >= MAX_VAR_INDEX {
            return Err(N2tError::range(format!(
                "variable count for this kind exceeds the limit ({})",
                MAX_VAR_INDEX + 1
            )));
        }
        let index = *next;
        *next += 1;
        Ok(index)
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}
