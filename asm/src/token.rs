use std::fmt;

use sicxe::directive::Directive;
use sicxe::op::{Format, Opcode, OperandKind};
use sicxe::reg::Reg;

use crate::error::AsmError;
use crate::literal::LiteralTable;
use crate::numeric::Numeric;
use crate::symbol::{SymbolKind, SymbolTable};

/// The five addressing-mode bits. Base-relative is unsupported and always 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flags {
    pub n: bool,
    pub i: bool,
    pub x: bool,
    pub p: bool,
    pub e: bool,
}

impl Default for Flags {
    /// Simple direct addressing: the architecture encodes it as indirect
    /// and immediate both set, PC-relative on.
    fn default() -> Self {
        Flags {
            n: true,
            i: true,
            x: false,
            p: true,
            e: false,
        }
    }
}

/// One raw source line split into its tab-delimited fields, with the
/// addressing-mode intent read off the prefix characters.
#[derive(Debug, Clone)]
pub struct SourceLine {
    raw: String,
    label: Option<String>,
    operator: Option<String>,
    operands: Vec<String>,
    comment: Option<String>,
    pub flags: Flags,
}

impl SourceLine {
    /// Split a line into label / operator / operands / comment.
    ///
    /// `+` before the operator selects extended format (and turns
    /// PC-relative off); `@` on the first operand selects indirect, `#`
    /// immediate; a second operand of `X` selects indexed. A line of just
    /// `.` is a no-op placeholder.
    pub fn parse(input: &str) -> SourceLine {
        let mut flags = Flags::default();
        let mut fields: Vec<&str> = input.split('\t').collect();
        while fields.last() == Some(&"") {
            fields.pop();
        }

        let mut line = SourceLine {
            raw: input.to_string(),
            label: None,
            operator: None,
            operands: Vec::new(),
            comment: None,
            flags,
        };
        if fields.first() == Some(&".") {
            return line;
        }

        if let Some(label) = fields.first() {
            if !label.is_empty() {
                line.label = Some(label.to_string());
            }
        }
        if let Some(operator) = fields.get(1) {
            if let Some(stripped) = operator.strip_prefix('+') {
                flags.e = true;
                flags.p = false;
                line.operator = Some(stripped.to_string());
            } else if !operator.is_empty() {
                line.operator = Some(operator.to_string());
            }
        }
        if let Some(field) = fields.get(2) {
            if !field.is_empty() {
                let mut parts: Vec<String> = field.split(',').map(str::to_string).collect();
                if let Some(stripped) = parts[0].strip_prefix('@') {
                    flags.i = false;
                    parts[0] = stripped.to_string();
                } else if let Some(stripped) = parts[0].strip_prefix('#') {
                    flags.n = false;
                    flags.p = false;
                    parts[0] = stripped.to_string();
                }
                if parts.get(1).map(String::as_str) == Some("X") {
                    flags.x = true;
                }
                line.operands = parts;
            }
        }
        if let Some(comment) = fields.get(3) {
            line.comment = Some(comment.to_string());
        }
        if line.operands.is_empty() {
            flags.p = false;
        }
        line.flags = flags;
        line
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn operator(&self) -> Option<&str> {
        self.operator.as_deref()
    }

    pub fn operands(&self) -> &[String] {
        &self.operands
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }
}

/// A resolved operand as stored in a token.
#[derive(Debug, Clone)]
pub enum Operand {
    Register(Reg),
    Numeric(Numeric),
    /// Key into the owning section's literal table.
    Literal(String),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Register(r) => write!(f, "{}", r),
            Operand::Numeric(n) => write!(f, "{}", n),
            Operand::Literal(text) => write!(f, "{}", text),
        }
    }
}

/// A pass-1 resolved line. `address` is the location counter *after* the
/// token, so the token starts at `address - size`. Immutable once built;
/// pass 2 only reads.
#[derive(Debug, Clone)]
pub enum Token {
    Instruction(InstructionToken),
    Directive(DirectiveToken),
}

impl Token {
    pub fn address(&self) -> u32 {
        match self {
            Token::Instruction(t) => t.address,
            Token::Directive(t) => t.address,
        }
    }

    pub fn size(&self) -> u32 {
        match self {
            Token::Instruction(t) => t.size,
            Token::Directive(t) => t.size,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Instruction(t) => write!(f, "{}", t),
            Token::Directive(t) => write!(f, "{}", t),
        }
    }
}

#[derive(Debug, Clone)]
pub struct InstructionToken {
    /// First operand text after prefix stripping; names relocation targets.
    pub source: String,
    pub address: u32,
    pub size: u32,
    pub op: Opcode,
    pub operands: Vec<Operand>,
    pub flags: Flags,
}

impl fmt::Display for InstructionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let operands = if self.operands.is_empty() {
            "(empty)".to_string()
        } else {
            self.operands
                .iter()
                .map(|o| o.to_string())
                .collect::<Vec<_>>()
                .join("/")
        };
        let b = |v: bool| v as u8;
        write!(
            f,
            "InstructionToken{{name:{}, operands:{}, nixbpe:0b{}{}{}0{}{}}}",
            self.op.name,
            operands,
            b(self.flags.n),
            b(self.flags.i),
            b(self.flags.x),
            b(self.flags.p),
            b(self.flags.e),
        )
    }
}

#[derive(Debug, Clone)]
pub struct DirectiveToken {
    pub source: String,
    pub address: u32,
    pub size: u32,
    pub directive: Directive,
    pub operands: Vec<Operand>,
}

impl fmt::Display for DirectiveToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let operands = if self.operands.is_empty() {
            "(empty)".to_string()
        } else {
            self.operands
                .iter()
                .map(|o| o.to_string())
                .collect::<Vec<_>>()
                .join("/")
        };
        write!(
            f,
            "DirectiveToken{{name:{}, operands:{}}}",
            self.directive, operands
        )
    }
}

/// One encoded text fragment plus its optional relocation entry.
#[derive(Debug)]
pub struct TextInfo {
    /// Start address of the fragment.
    pub address: u32,
    pub hex: String,
    pub size: u32,
    pub modification: Option<ModInfo>,
}

#[derive(Debug)]
pub struct ModInfo {
    /// Symbol name the linker must add in; the sign is applied by the
    /// object-code accumulator.
    pub name: String,
    pub address: u32,
    pub half_bytes: u32,
}

impl InstructionToken {
    fn flag_bits3(&self) -> u32 {
        (self.flags.n as u32) << 17
            | (self.flags.i as u32) << 16
            | (self.flags.x as u32) << 15
            | (self.flags.p as u32) << 13
            | (self.flags.e as u32) << 12
    }

    fn flag_bits4(&self) -> u32 {
        (self.flags.n as u32) << 25
            | (self.flags.i as u32) << 24
            | (self.flags.x as u32) << 23
            | (self.flags.p as u32) << 21
            | (self.flags.e as u32) << 20
    }

    /// Encode this instruction against the completed tables.
    pub fn text_info(
        &self,
        symbols: &SymbolTable,
        literals: &LiteralTable,
    ) -> Result<TextInfo, AsmError> {
        let start = self.address - self.size;
        match self.op.format {
            Format::Two => self.encode_format2(start),
            Format::ThreeOrFour => {
                if self.flags.e {
                    self.encode_format4(start, symbols, literals)
                } else if !self.flags.n && self.flags.i {
                    self.encode_immediate(start, symbols)
                } else {
                    self.encode_simple(start, symbols, literals)
                }
            }
        }
    }

    fn encode_format2(&self, start: u32) -> Result<TextInfo, AsmError> {
        let reg = |operand: Option<&Operand>| -> Result<u8, AsmError> {
            match operand {
                Some(Operand::Register(r)) => Ok(r.code()),
                _ => Err(AsmError::OperandMismatch(
                    self.op.name.clone(),
                    "register operand expected".to_string(),
                )),
            }
        };
        let r1 = reg(self.operands.first())?;
        let r2 = match self.op.kind {
            OperandKind::TwoReg => reg(self.operands.get(1))?,
            _ => 0,
        };
        let code = (self.op.code as u32) << 8 | (r1 as u32) << 4 | r2 as u32;
        Ok(TextInfo {
            address: start,
            hex: format!("{:04X}", code),
            size: self.size,
            modification: None,
        })
    }

    /// Extended format: the target address is left for the linker whenever
    /// the operand is symbolic, with one 5-half-byte modification entry at
    /// start+1. A constant operand fills the 20-bit field directly.
    fn encode_format4(
        &self,
        start: u32,
        symbols: &SymbolTable,
        literals: &LiteralTable,
    ) -> Result<TextInfo, AsmError> {
        let mut code = (self.op.code as u32) << 24 | self.flag_bits4();
        let mut modification = None;
        match self.operands.first() {
            Some(Operand::Numeric(num)) => match num.symbolic() {
                Some(name) => {
                    // A symbol still pending after pass 1 was referenced
                    // but never defined anywhere.
                    match symbols.search(name) {
                        None => return Err(AsmError::UndefinedExtern(name.to_string())),
                        Some(sym) if sym.kind() == SymbolKind::AddressPending => {
                            return Err(AsmError::UndefinedExtern(name.to_string()));
                        }
                        Some(_) => {}
                    }
                    modification = Some(ModInfo {
                        name: name.to_string(),
                        address: start + 1,
                        half_bytes: 5,
                    });
                }
                None => {
                    let value = num.integer();
                    if !(0..=0xF_FFFF).contains(&value) {
                        return Err(AsmError::FieldOverflow(value, 20, self.source.clone()));
                    }
                    code |= value as u32;
                }
            },
            Some(Operand::Literal(key)) => {
                let literal = literals
                    .search(key)
                    .ok_or_else(|| AsmError::UndefinedSymbol(key.clone()))?;
                let address = literal
                    .address()
                    .ok_or_else(|| AsmError::UnaddressedLiteral(key.clone()))?;
                code |= address & 0xF_FFFF;
            }
            Some(Operand::Register(_)) => {
                return Err(AsmError::OperandMismatch(
                    self.op.name.clone(),
                    "memory operand expected".to_string(),
                ));
            }
            None => {}
        }
        Ok(TextInfo {
            address: start,
            hex: format!("{:08X}", code),
            size: self.size,
            modification,
        })
    }

    /// Immediate addressing: the operand value is the 12-bit field, with no
    /// PC-relative math and no relocation.
    fn encode_immediate(&self, start: u32, symbols: &SymbolTable) -> Result<TextInfo, AsmError> {
        let mut code = (self.op.code as u32) << 16 | self.flag_bits3();
        let value: i64 = match self.operands.first() {
            Some(Operand::Numeric(num)) => match num.symbolic() {
                Some(name) => symbols
                    .address_of(name)
                    .ok_or_else(|| AsmError::UndefinedSymbol(name.to_string()))?,
                None => num.integer(),
            },
            Some(_) => {
                return Err(AsmError::OperandMismatch(
                    self.op.name.clone(),
                    "immediate operand expected".to_string(),
                ));
            }
            None => 0,
        };
        if !(0..=0xFFF).contains(&value) {
            return Err(AsmError::FieldOverflow(value, 12, self.source.clone()));
        }
        code |= value as u32;
        Ok(TextInfo {
            address: start,
            hex: format!("{:06X}", code),
            size: self.size,
            modification: None,
        })
    }

    /// Simple/direct addressing: resolve the target address, then encode
    /// the PC-relative displacement with 12-bit wraparound.
    fn encode_simple(
        &self,
        start: u32,
        symbols: &SymbolTable,
        literals: &LiteralTable,
    ) -> Result<TextInfo, AsmError> {
        let mut code = (self.op.code as u32) << 16 | self.flag_bits3();
        if let Some(operand) = self.operands.first() {
            let target: i64 = match operand {
                Operand::Numeric(num) => match num.symbolic() {
                    None => num.integer(),
                    Some(name) => symbols
                        .address_of(name)
                        .ok_or_else(|| AsmError::UndefinedSymbol(name.to_string()))?,
                },
                Operand::Literal(key) => {
                    let literal = literals
                        .search(key)
                        .ok_or_else(|| AsmError::UndefinedSymbol(key.clone()))?;
                    literal
                        .address()
                        .ok_or_else(|| AsmError::UnaddressedLiteral(key.clone()))?
                        as i64
                }
                Operand::Register(_) => {
                    return Err(AsmError::OperandMismatch(
                        self.op.name.clone(),
                        "memory operand expected".to_string(),
                    ));
                }
            };
            // Displacement is relative to the next instruction, i.e. this
            // token's end address.
            let next = self.address as i64;
            let disp = target - next;
            if !(-2048..=2047).contains(&disp) {
                return Err(AsmError::DisplacementOverflow(disp, self.source.clone()));
            }
            let field = if disp >= 0 {
                disp as u32
            } else {
                (0x1000 - (next - target)) as u32
            };
            code |= field;
        }
        Ok(TextInfo {
            address: start,
            hex: format!("{:06X}", code),
            size: self.size,
            modification: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_flags_are_simple_direct() {
        let line = SourceLine::parse("\tLDA\tBUFFER");
        assert!(line.flags.n && line.flags.i && line.flags.p);
        assert!(!line.flags.x && !line.flags.e);
        assert_eq!(line.operator(), Some("LDA"));
        assert_eq!(line.operands(), ["BUFFER"]);
    }

    #[test]
    fn extended_prefix_sets_e_and_clears_p() {
        let line = SourceLine::parse("CLOOP\t+JSUB\tRDREC");
        assert_eq!(line.label(), Some("CLOOP"));
        assert_eq!(line.operator(), Some("JSUB"));
        assert!(line.flags.e);
        assert!(!line.flags.p);
    }

    #[test]
    fn immediate_prefix_clears_n_and_p() {
        let line = SourceLine::parse("\tCOMP\t#0");
        assert!(!line.flags.n);
        assert!(line.flags.i);
        assert!(!line.flags.p);
        assert_eq!(line.operands(), ["0"]);
    }

    #[test]
    fn indirect_prefix_clears_i() {
        let line = SourceLine::parse("\tJ\t@RETADR");
        assert!(line.flags.n);
        assert!(!line.flags.i);
        assert_eq!(line.operands(), ["RETADR"]);
    }

    #[test]
    fn index_suffix_sets_x() {
        let line = SourceLine::parse("\tSTCH\tBUFFER,X");
        assert!(line.flags.x);
        assert_eq!(line.operands()[0], "BUFFER");
    }

    #[test]
    fn missing_operand_clears_p() {
        let line = SourceLine::parse("\tRSUB");
        assert!(!line.flags.p);
        let line = SourceLine::parse("\tRSUB\t\tcomment");
        assert!(!line.flags.p);
    }

    #[test]
    fn placeholder_line_is_empty() {
        let line = SourceLine::parse(".");
        assert!(line.label().is_none());
        assert!(line.operator().is_none());
        assert!(line.operands().is_empty());
    }

    #[test]
    fn comment_field_is_kept() {
        let line = SourceLine::parse("FIRST\tSTL\tRETADR\tsave return address");
        assert_eq!(line.comment(), Some("save return address"));
    }

    fn opcode(name: &str) -> Opcode {
        sicxe::op::OpTable::builtin().search(name).unwrap().clone()
    }

    fn instruction(
        name: &str,
        end: u32,
        size: u32,
        operands: Vec<Operand>,
        flags: Flags,
    ) -> InstructionToken {
        InstructionToken {
            source: String::new(),
            address: end,
            size,
            op: opcode(name),
            operands,
            flags,
        }
    }

    #[test]
    fn format2_single_register() {
        let token = instruction(
            "CLEAR",
            2,
            2,
            vec![Operand::Register(Reg::X)],
            Flags::default(),
        );
        let info = token
            .text_info(&SymbolTable::new(), &LiteralTable::new())
            .unwrap();
        assert_eq!(info.hex, "B410");
        assert_eq!(info.address, 0);
    }

    #[test]
    fn format2_register_pair() {
        let token = instruction(
            "COMPR",
            2,
            2,
            vec![Operand::Register(Reg::A), Operand::Register(Reg::S)],
            Flags::default(),
        );
        let info = token
            .text_info(&SymbolTable::new(), &LiteralTable::new())
            .unwrap();
        assert_eq!(info.hex, "A004");
    }

    #[test]
    fn simple_forward_displacement() {
        let mut symbols = SymbolTable::new();
        symbols.put_rep("COPY", 0).unwrap();
        symbols.put("RETADR", 0x30).unwrap();
        let token = instruction(
            "STL",
            3,
            3,
            vec![Operand::Numeric(Numeric::deferred("RETADR"))],
            Flags::default(),
        );
        let info = token.text_info(&symbols, &LiteralTable::new()).unwrap();
        assert_eq!(info.hex, "17202D");
    }

    #[test]
    fn simple_backward_displacement_wraps() {
        let mut symbols = SymbolTable::new();
        symbols.put_rep("COPY", 0).unwrap();
        symbols.put("CLOOP", 0x6).unwrap();
        let token = instruction(
            "J",
            0x1E,
            3,
            vec![Operand::Numeric(Numeric::deferred("CLOOP"))],
            Flags::default(),
        );
        let info = token.text_info(&symbols, &LiteralTable::new()).unwrap();
        assert_eq!(info.hex, "3F2FE8");
    }

    #[test]
    fn displacement_out_of_range_is_an_error() {
        let mut symbols = SymbolTable::new();
        symbols.put_rep("COPY", 0).unwrap();
        symbols.put("FAR", 0x2000).unwrap();
        let token = instruction(
            "J",
            3,
            3,
            vec![Operand::Numeric(Numeric::deferred("FAR"))],
            Flags::default(),
        );
        let err = token
            .text_info(&symbols, &LiteralTable::new())
            .unwrap_err();
        assert!(matches!(err, AsmError::DisplacementOverflow(_, _)));
    }

    #[test]
    fn immediate_constant() {
        let flags = Flags {
            n: false,
            p: false,
            ..Flags::default()
        };
        let token = instruction(
            "COMP",
            0xD,
            3,
            vec![Operand::Numeric(Numeric::absolute(0))],
            flags,
        );
        let info = token
            .text_info(&SymbolTable::new(), &LiteralTable::new())
            .unwrap();
        assert_eq!(info.hex, "290000");
    }

    #[test]
    fn extended_constant_fills_address_field() {
        let flags = Flags {
            n: false,
            p: false,
            e: true,
            ..Flags::default()
        };
        let token = instruction(
            "LDT",
            4,
            4,
            vec![Operand::Numeric(Numeric::absolute(4096))],
            flags,
        );
        let info = token
            .text_info(&SymbolTable::new(), &LiteralTable::new())
            .unwrap();
        assert_eq!(info.hex, "75101000");
        assert!(info.modification.is_none());
    }

    #[test]
    fn extended_symbolic_defers_to_linker() {
        let mut symbols = SymbolTable::new();
        symbols.put_refer("RDREC").unwrap();
        let flags = Flags {
            p: false,
            e: true,
            ..Flags::default()
        };
        let token = instruction(
            "JSUB",
            7,
            4,
            vec![Operand::Numeric(Numeric::deferred("RDREC"))],
            flags,
        );
        let info = token.text_info(&symbols, &LiteralTable::new()).unwrap();
        assert_eq!(info.hex, "4B100000");
        let m = info.modification.unwrap();
        assert_eq!(m.name, "RDREC");
        assert_eq!(m.address, 4);
        assert_eq!(m.half_bytes, 5);
    }

    #[test]
    fn extended_unknown_symbol_is_fatal() {
        let flags = Flags {
            e: true,
            p: false,
            ..Flags::default()
        };
        let token = instruction(
            "JSUB",
            7,
            4,
            vec![Operand::Numeric(Numeric::deferred("NOBODY"))],
            flags,
        );
        let err = token
            .text_info(&SymbolTable::new(), &LiteralTable::new())
            .unwrap_err();
        assert!(matches!(err, AsmError::UndefinedExtern(_)));
    }

    #[test]
    fn simple_literal_target() {
        let mut symbols = SymbolTable::new();
        symbols.put_rep("COPY", 0).unwrap();
        let mut literals = LiteralTable::new();
        literals.intern("=C'EOF'").unwrap();
        literals.assign_next(0x2F).unwrap();
        let token = instruction(
            "LDA",
            0x16,
            3,
            vec![Operand::Literal("=C'EOF'".to_string())],
            Flags::default(),
        );
        let info = token.text_info(&symbols, &literals).unwrap();
        assert_eq!(info.hex, "032019");
    }

    #[test]
    fn no_operand_encodes_zero_displacement() {
        let flags = Flags {
            p: false,
            ..Flags::default()
        };
        let token = instruction("RSUB", 0x16, 3, vec![], flags);
        let info = token
            .text_info(&SymbolTable::new(), &LiteralTable::new())
            .unwrap();
        assert_eq!(info.hex, "4F0000");
    }
}
