//! Flat symbol -> address table for the assembler, pre-populated with the
//! platform's predefined names.

use std::collections::HashMap;

use crate::error::N2tError;

pub const ROM_CEILING: i32 = 32766;
pub const RAM_CEILING: i32 = 32766;
pub const FIRST_VARIABLE_ADDRESS: i32 = 0x0010;

pub struct SymbolTable {
    table: HashMap<String, i16>,
}

impl SymbolTable {
    pub fn new() -> Self {
        let mut table = HashMap::new();
        table.insert("SP".to_string(), 0);
        table.insert("LCL".to_string(), 1);
        table.insert("ARG".to_string(), 2);
        table.insert("THIS".to_string(), 3);
        table.insert("THAT".to_string(), 4);
        for r in 0..16 {
            table.insert(format!("R{r}"), r as i16);
        }
        table.insert("SCREEN".to_string(), 0x4000);
        table.insert("KBD".to_string(), 0x6000);
        SymbolTable { table }
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.table.contains_key(symbol)
    }

    pub fn get_address(&self, symbol: &str) -> Option<i16> {
        self.table.get(symbol).copied()
    }

    /// Adds `(symbol, address)` to the table. Fails if `symbol` is already
    /// present or `address` falls outside `[0, 32766]`.
    pub fn add_entry(&mut self, symbol: &str, address: i32) -> Result<(), N2tError> {
        if self.table.contains_key(symbol) {
            return Err(N2tError::range(format!(
                "symbol \"{symbol}\" already defined"
            )));
        }
        if !(0..=ROM_CEILING).contains(&address) {
            return Err(N2tError::range(format!(
                "address {address} for symbol \"{symbol}\" out of range"
            )));
        }
        self.table.insert(symbol.to_string(), address as i16);
        Ok(())
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn predefined_symbols_present() {
        let table = SymbolTable::new();
        assert_eq!(table.get_address("SP"), Some(0));
        assert_eq!(table.get_address("SCREEN"), Some(0x4000));
        assert_eq!(table.get_address("R15"), Some(15));
    }

    #[test]
    fn duplicate_definition_fails() {
        let mut table = SymbolTable::new();
        assert!(table.add_entry("SP", 100).is_err());
    }

    #[test]
    fn new_entry_is_retrievable() {
        let mut table = SymbolTable::new();
        table.add_entry("LOOP", 4).unwrap();
        assert_eq!(table.get_address("LOOP"), Some(4));
    }
}
