use num_bigint::{BigInt, Sign};
use num_traits::ToPrimitive;
use std::fmt;

use crate::error::AsmError;
use crate::symbol::SymbolTable;

/// A computed value: an arbitrary-precision absolute part, a multiset of
/// section-relative symbol contributions, and optionally the original
/// symbolic operand text when resolution has to wait for pass 2 or for a
/// literal-pool flush.
///
/// A pure constant has an empty `relative` part. A single relocatable
/// address has exactly one `relative` entry with multiplicity 1. The
/// difference of two addresses in the same section cancels down to a pure
/// absolute value, keeping the formula text around so the encoder can still
/// emit the paired modification records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Numeric {
    value: BigInt,
    relative: Vec<(String, i32)>,
    symbolic: Option<String>,
}

impl Numeric {
    pub fn absolute(value: i64) -> Self {
        Numeric {
            value: BigInt::from(value),
            relative: Vec::new(),
            symbolic: None,
        }
    }

    /// An address relative to a section's representative symbol.
    pub fn relative(value: u32, base: &str) -> Self {
        Numeric {
            value: BigInt::from(value),
            relative: vec![(base.to_string(), 1)],
            symbolic: None,
        }
    }

    /// A reference whose resolution is deferred until pass 2.
    pub fn deferred(name: &str) -> Self {
        Numeric {
            value: BigInt::from(0),
            relative: Vec::new(),
            symbolic: Some(name.to_string()),
        }
    }

    /// Parse a constant: decimal (`3`), characters (`C'EOF'`), hex
    /// (`X'F1'`). A leading `=` (literal notation) is accepted and skipped.
    pub fn constant(text: &str) -> Result<Self, AsmError> {
        let body = text.strip_prefix('=').unwrap_or(text);
        if let Some(rest) = body.strip_prefix("C'") {
            let chars = rest
                .strip_suffix('\'')
                .ok_or_else(|| AsmError::BadConstant(text.to_string()))?;
            let value = BigInt::from_bytes_be(Sign::Plus, chars.as_bytes());
            return Ok(Numeric {
                value,
                relative: Vec::new(),
                symbolic: None,
            });
        }
        if let Some(rest) = body.strip_prefix("X'") {
            let digits = rest
                .strip_suffix('\'')
                .ok_or_else(|| AsmError::BadConstant(text.to_string()))?;
            let value = BigInt::parse_bytes(digits.as_bytes(), 16)
                .ok_or_else(|| AsmError::BadConstant(text.to_string()))?;
            return Ok(Numeric {
                value,
                relative: Vec::new(),
                symbolic: None,
            });
        }
        let value = BigInt::parse_bytes(body.as_bytes(), 10)
            .ok_or_else(|| AsmError::BadNumber(text.to_string()))?;
        Ok(Numeric {
            value,
            relative: Vec::new(),
            symbolic: None,
        })
    }

    /// Evaluate a formula operand against the symbol table.
    ///
    /// `*` is the current location counter (as a section-relative address
    /// when a representative symbol exists). A single binary `+`/`-`
    /// combines two symbol addresses; a lookup failure yields absolute zero
    /// with the formula kept in the symbolic slot rather than failing, so
    /// forward references a section cannot resolve yet stay assemblable.
    /// Anything else is recorded as a deferred symbolic reference.
    pub fn formula(text: &str, table: &SymbolTable, locctr: u32) -> Result<Self, AsmError> {
        if text == "*" {
            return Ok(match table.rep_name() {
                Some(base) => Numeric::relative(locctr, base),
                None => Numeric::absolute(locctr as i64),
            });
        }

        let split = text
            .split_once('+')
            .map(|(l, r)| (l, '+', r))
            .or_else(|| text.split_once('-').map(|(l, r)| (l, '-', r)));
        if let Some((lhs, op, rhs)) = split {
            let left = table.search(lhs).and_then(|s| s.address());
            let right = table.search(rhs).and_then(|s| s.address());
            let mut result = match (left, right) {
                (Some(a), Some(b)) => {
                    if op == '+' {
                        a.combine(b, 1)
                    } else {
                        a.combine(b, -1)
                    }
                }
                _ => Numeric::absolute(0),
            };
            result.symbolic = Some(text.to_string());
            return Ok(result);
        }

        Ok(Numeric::deferred(text))
    }

    /// Sum or difference with another numeric, merging the relative
    /// multisets; cancelled entries are dropped.
    fn combine(&self, other: &Numeric, sign: i32) -> Numeric {
        let value = if sign >= 0 {
            &self.value + &other.value
        } else {
            &self.value - &other.value
        };
        let mut relative = self.relative.clone();
        for (name, mult) in &other.relative {
            match relative.iter_mut().find(|(n, _)| n == name) {
                Some(entry) => entry.1 += sign * mult,
                None => relative.push((name.clone(), sign * mult)),
            }
        }
        relative.retain(|(_, m)| *m != 0);
        Numeric {
            value,
            relative,
            symbolic: None,
        }
    }

    /// The absolute part truncated to 32 bits, two's complement.
    pub fn integer(&self) -> i64 {
        let low = &self.value & &BigInt::from(0xFFFF_FFFFu64);
        low.to_u32().unwrap_or(0) as i32 as i64
    }

    /// Bytes needed to store the absolute part.
    pub fn byte_size(&self) -> u32 {
        ((self.value.magnitude().to_str_radix(16).len() + 1) / 2) as u32
    }

    /// The low `bytes` bytes of the value as zero-padded uppercase hex.
    pub fn hex(&self, bytes: usize) -> String {
        let mask = (BigInt::from(1) << (8 * bytes)) - 1;
        let low = &self.value & &mask;
        format!("{:0width$X}", low, width = 2 * bytes)
    }

    pub fn is_absolute(&self) -> bool {
        self.relative.is_empty()
    }

    pub fn is_relative(&self) -> bool {
        self.relative.len() == 1 && self.relative[0].1 == 1
    }

    /// The single symbol this value is relative to, if there is exactly one.
    pub fn name(&self) -> Option<&str> {
        if self.relative.len() == 1 {
            Some(&self.relative[0].0)
        } else {
            None
        }
    }

    /// The unresolved operand text, when resolution was deferred.
    pub fn symbolic(&self) -> Option<&str> {
        self.symbolic.as_deref()
    }
}

impl fmt::Display for Numeric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:X}", self.value)?;
        for (name, mult) in &self.relative {
            let sign = if *mult > 0 { '+' } else { '-' };
            write!(f, "{}{}", sign, name)?;
            if mult.abs() != 1 {
                write!(f, "*{}", mult.abs())?;
            }
        }
        Ok(())
    }
}
