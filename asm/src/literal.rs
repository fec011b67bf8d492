use indexmap::IndexMap;
use std::fmt;

use crate::error::AsmError;
use crate::numeric::Numeric;

/// One literal constant: created address-less on first occurrence, given an
/// address exactly once when its pool is flushed.
#[derive(Debug, Clone)]
pub struct Literal {
    text: String,
    value: Numeric,
    address: Option<u32>,
}

impl Literal {
    fn new(text: &str) -> Result<Self, AsmError> {
        Ok(Literal {
            text: text.to_string(),
            value: Numeric::constant(text)?,
            address: None,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn value(&self) -> &Numeric {
        &self.value
    }

    pub fn address(&self) -> Option<u32> {
        self.address
    }

    pub fn byte_size(&self) -> u32 {
        self.value.byte_size()
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let address = match self.address {
            Some(a) => format!("{:X}", a),
            None => "(not assigned)".to_string(),
        };
        write!(f, "{:<12}{}", self.text, address)
    }
}

/// Insertion-ordered literal pool, one per control section.
#[derive(Debug)]
pub struct LiteralTable {
    map: IndexMap<String, Literal>,
}

impl LiteralTable {
    pub fn new() -> Self {
        LiteralTable {
            map: IndexMap::new(),
        }
    }

    /// Intern a literal by its text; the same text always maps to the same
    /// entry.
    pub fn intern(&mut self, text: &str) -> Result<&Literal, AsmError> {
        if !self.map.contains_key(text) {
            let literal = Literal::new(text)?;
            self.map.insert(text.to_string(), literal);
        }
        Ok(&self.map[text])
    }

    pub fn search(&self, text: &str) -> Option<&Literal> {
        self.map.get(text)
    }

    /// Assign `address` to the first literal still waiting for one.
    /// Returns its text and byte size, or `None` when the pool is drained.
    pub fn assign_next(&mut self, address: u32) -> Option<(String, u32)> {
        for literal in self.map.values_mut() {
            if literal.address.is_none() {
                literal.address = Some(address);
                return Some((literal.text.clone(), literal.byte_size()));
            }
        }
        None
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl Default for LiteralTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LiteralTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for literal in self.map.values() {
            if !first {
                writeln!(f)?;
            }
            write!(f, "{}", literal)?;
            first = false;
        }
        Ok(())
    }
}
