use indexmap::IndexMap;
use std::fmt;

use crate::error::AsmError;
use crate::numeric::Numeric;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    /// The control section's name symbol, declared by START or CSECT.
    RepresentsSection,
    /// Declared by EXTREF; owned by another section, never has an address.
    External,
    /// A label whose address is known.
    AddressAssigned,
    /// Referenced in an operand before its label line was seen.
    AddressPending,
}

#[derive(Debug, Clone)]
pub struct Symbol {
    name: String,
    address: Option<Numeric>,
    kind: SymbolKind,
}

impl Symbol {
    /// Symbol names are at most 6 alphanumeric characters starting with a
    /// letter.
    pub fn is_symbol_name(s: &str) -> bool {
        s.len() <= 6
            && s.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
            && s.chars().all(|c| c.is_ascii_alphanumeric())
    }

    fn new(name: &str, address: Option<Numeric>, kind: SymbolKind) -> Result<Self, AsmError> {
        if !Self::is_symbol_name(name) {
            return Err(AsmError::IllegalSymbolName(name.to_string()));
        }
        Ok(Symbol {
            name: name.to_string(),
            address,
            kind,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> SymbolKind {
        self.kind
    }

    pub fn address(&self) -> Option<&Numeric> {
        self.address.as_ref()
    }

    /// True for symbols that never carry a section-relative address
    /// (section representatives and externals).
    pub fn is_sectional(&self) -> bool {
        matches!(
            self.kind,
            SymbolKind::RepresentsSection | SymbolKind::External
        )
    }

    fn assign(&mut self, address: Numeric) {
        self.address = Some(address);
        self.kind = SymbolKind::AddressAssigned;
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let address = match (&self.kind, &self.address) {
            (SymbolKind::External, _) => "REF".to_string(),
            (_, Some(addr)) => addr.to_string().replace('+', " \t+ "),
            (_, None) => "(not assigned)".to_string(),
        };
        write!(f, "{:<12}{}", self.name, address)
    }
}

/// Insertion-ordered symbol table, owned by exactly one control section.
/// Mutated only during pass 1; pass 2 reads it.
#[derive(Debug)]
pub struct SymbolTable {
    map: IndexMap<String, Symbol>,
    rep: Option<String>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable {
            map: IndexMap::new(),
            rep: None,
        }
    }

    /// Record that `name` was referenced in an operand: creates an
    /// address-pending symbol unless the name is already known.
    pub fn touch(&mut self, name: &str) -> Result<(), AsmError> {
        if !self.map.contains_key(name) {
            let symbol = Symbol::new(name, None, SymbolKind::AddressPending)?;
            self.map.insert(name.to_string(), symbol);
        }
        Ok(())
    }

    /// Register a label at an address, promoting a pending symbol if one
    /// exists. Re-defining any other kind of symbol is an error.
    pub fn put(&mut self, name: &str, locctr: u32) -> Result<(), AsmError> {
        let address = match &self.rep {
            Some(base) => Numeric::relative(locctr, base),
            None => Numeric::absolute(locctr as i64),
        };
        self.bind(name, address)
    }

    /// Register an EQU label: evaluates the operand and binds the result.
    /// Returns the evaluated value so the caller can reuse it.
    pub fn put_formula(
        &mut self,
        name: &str,
        operand: &str,
        locctr: u32,
    ) -> Result<Numeric, AsmError> {
        let value = if crate::section::is_plain_constant(operand) {
            Numeric::constant(operand)?
        } else {
            Numeric::formula(operand, self, locctr)?
        };
        self.bind(name, value.clone())?;
        Ok(value)
    }

    fn bind(&mut self, name: &str, value: Numeric) -> Result<(), AsmError> {
        match self.map.get_mut(name) {
            Some(existing) if existing.kind == SymbolKind::AddressPending => {
                existing.assign(value);
                Ok(())
            }
            Some(_) => Err(AsmError::RedefinedSymbol(name.to_string())),
            None => {
                let symbol = Symbol::new(name, Some(value), SymbolKind::AddressAssigned)?;
                self.map.insert(name.to_string(), symbol);
                Ok(())
            }
        }
    }

    /// Register the section's representative symbol (START/CSECT label).
    pub fn put_rep(&mut self, name: &str, address: u32) -> Result<(), AsmError> {
        let symbol = Symbol::new(
            name,
            Some(Numeric::absolute(address as i64)),
            SymbolKind::RepresentsSection,
        )?;
        self.map.insert(name.to_string(), symbol);
        self.rep = Some(name.to_string());
        Ok(())
    }

    /// Register an external symbol named by an EXTREF operand.
    pub fn put_refer(&mut self, name: &str) -> Result<(), AsmError> {
        let symbol = Symbol::new(name, None, SymbolKind::External)?;
        self.map.insert(name.to_string(), symbol);
        Ok(())
    }

    pub fn search(&self, name: &str) -> Option<&Symbol> {
        self.map.get(name)
    }

    pub fn rep(&self) -> Option<&Symbol> {
        self.rep.as_deref().and_then(|name| self.map.get(name))
    }

    pub fn rep_name(&self) -> Option<&str> {
        self.rep.as_deref()
    }

    /// Convenience: the resolved address value of `name`, if it has one.
    pub fn address_of(&self, name: &str) -> Option<i64> {
        self.search(name)
            .and_then(|s| s.address())
            .map(|a| a.integer())
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SymbolTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for symbol in self.map.values() {
            if !first {
                writeln!(f)?;
            }
            write!(f, "{}", symbol)?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_rules() {
        assert!(Symbol::is_symbol_name("COPY"));
        assert!(Symbol::is_symbol_name("A1B2C3"));
        assert!(!Symbol::is_symbol_name("TOOLONG7"));
        assert!(!Symbol::is_symbol_name("1ABC"));
        assert!(!Symbol::is_symbol_name("A-B"));
    }

    #[test]
    fn pending_promotion() {
        let mut table = SymbolTable::new();
        table.put_rep("SECT", 0).unwrap();
        table.touch("FWD").unwrap();
        assert_eq!(table.search("FWD").unwrap().kind(), SymbolKind::AddressPending);
        table.put("FWD", 0x30).unwrap();
        let sym = table.search("FWD").unwrap();
        assert_eq!(sym.kind(), SymbolKind::AddressAssigned);
        assert_eq!(sym.address().unwrap().integer(), 0x30);
    }

    #[test]
    fn redefinition_is_an_error() {
        let mut table = SymbolTable::new();
        table.put("HERE", 0x10).unwrap();
        assert!(matches!(
            table.put("HERE", 0x20),
            Err(AsmError::RedefinedSymbol(_))
        ));
    }

    #[test]
    fn equ_difference_binds_absolute() {
        let mut table = SymbolTable::new();
        table.put_rep("SECT", 0).unwrap();
        table.put("A", 0x10).unwrap();
        table.put("B", 0x20).unwrap();
        let value = table.put_formula("C", "A-B", 0x23).unwrap();
        assert!(value.is_absolute());
        assert_eq!(value.integer(), -16);
        assert_eq!(table.address_of("C"), Some(-16));
    }

    #[test]
    fn externals_have_no_address() {
        let mut table = SymbolTable::new();
        table.put_refer("BUFFER").unwrap();
        let sym = table.search("BUFFER").unwrap();
        assert!(sym.is_sectional());
        assert!(sym.address().is_none());
        assert_eq!(table.address_of("BUFFER"), None);
    }

    #[test]
    fn rep_is_tracked() {
        let mut table = SymbolTable::new();
        assert!(table.rep().is_none());
        table.put_rep("COPY", 0x1000).unwrap();
        assert_eq!(table.rep().unwrap().name(), "COPY");
        assert_eq!(table.rep().unwrap().address().unwrap().integer(), 0x1000);
    }
}
