use sicxe::directive::Directive;
use sicxe::op::{Format, OpTable, Opcode, OperandKind};
use sicxe::reg::Reg;

use crate::error::AsmError;
use crate::literal::LiteralTable;
use crate::numeric::Numeric;
use crate::objcode::ObjectCode;
use crate::symbol::{Symbol, SymbolTable};
use crate::token::{DirectiveToken, InstructionToken, Operand, SourceLine, Token};

/// One independently relocatable assembly unit. Pass 1 populates the tables
/// and the token list; pass 2 reads them and builds the object module.
#[derive(Debug)]
pub struct ControlSection {
    tokens: Vec<Token>,
    symbols: SymbolTable,
    literals: LiteralTable,
    started_with_start: bool,
}

/// True for operands the expression evaluator must not split: quoted
/// constants and plain digit runs.
pub(crate) fn is_plain_constant(s: &str) -> bool {
    s.contains('\'') || (!s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()))
}

impl ControlSection {
    /// Pass 1: tokenize each line, thread the location counter, fill the
    /// symbol and literal tables.
    pub fn pass1(optable: &OpTable, input: &[String]) -> Result<Self, AsmError> {
        let mut symbols = SymbolTable::new();
        let mut literals = LiteralTable::new();
        let mut tokens = Vec::new();
        let mut locctr: u32 = 0;
        let mut started_with_start = false;

        for raw in input {
            let line = SourceLine::parse(raw);
            let Some(operator) = line.operator() else {
                if line.label().is_some() || !line.operands().is_empty() {
                    return Err(AsmError::MissingOperator(raw.clone()));
                }
                continue;
            };

            let token = match optable.search(operator) {
                Some(op) => {
                    pass1_instruction(op, &line, &mut locctr, &mut symbols, &mut literals)?
                }
                None => pass1_directive(
                    &line,
                    &mut locctr,
                    &mut symbols,
                    &mut literals,
                    &mut started_with_start,
                )?,
            };
            tokens.push(token);
        }

        Ok(ControlSection {
            tokens,
            symbols,
            literals,
            started_with_start,
        })
    }

    /// Pass 2: encode every token against the completed tables.
    pub fn pass2(&self) -> Result<ObjectCode, AsmError> {
        let rep = self.symbols.rep().ok_or(AsmError::MissingSection)?;
        let mut obj = ObjectCode::new();

        for token in &self.tokens {
            match token {
                Token::Instruction(inst) => {
                    let info = inst.text_info(&self.symbols, &self.literals)?;
                    obj.add_text(info.address, info.hex, info.size);
                    if let Some(m) = info.modification {
                        obj.add_modification('+', &m.name, m.address, m.half_bytes);
                    }
                }
                Token::Directive(dir) => {
                    self.pass2_directive(&mut obj, dir, rep)?;
                }
            }
        }
        Ok(obj)
    }

    fn pass2_directive(
        &self,
        obj: &mut ObjectCode,
        token: &DirectiveToken,
        rep: &Symbol,
    ) -> Result<(), AsmError> {
        match token.directive {
            Directive::START => {
                let Some(Operand::Numeric(start)) = token.operands.first() else {
                    return Err(AsmError::MissingOperand(token.source.clone()));
                };
                obj.set_section_name(rep.name());
                obj.set_start_address(start.integer() as u32);
            }
            Directive::CSECT => {
                obj.set_section_name(rep.name());
                obj.set_start_address(0);
            }
            Directive::EXTDEF => {
                for operand in &token.operands {
                    let Operand::Numeric(num) = operand else {
                        continue;
                    };
                    let Some(name) = num.symbolic().or_else(|| num.name()) else {
                        continue;
                    };
                    let address = self
                        .symbols
                        .address_of(name)
                        .ok_or_else(|| AsmError::UndefinedSymbol(name.to_string()))?;
                    obj.add_define(name, address as u32);
                }
            }
            Directive::EXTREF => {
                for operand in &token.operands {
                    if let Operand::Numeric(num) = operand {
                        if let Some(name) = num.symbolic() {
                            obj.add_refer(name);
                        }
                    }
                }
            }
            Directive::BYTE => {
                let Some(Operand::Numeric(num)) = token.operands.first() else {
                    return Err(AsmError::MissingOperand(token.source.clone()));
                };
                let start = token.address - token.size;
                let bytes = num.byte_size();
                obj.add_text(start, num.hex(bytes as usize), bytes);
            }
            Directive::WORD => {
                let Some(Operand::Numeric(num)) = token.operands.first() else {
                    return Err(AsmError::MissingOperand(token.source.clone()));
                };
                let start = token.address - token.size;
                self.emit_word(obj, num, start);
            }
            Directive::LTORG => {
                self.emit_literals(obj, token)?;
            }
            Directive::END => {
                self.emit_literals(obj, token)?;
                obj.set_program_length(token.address);
                let entry = if self.started_with_start {
                    Some(rep.address().map(|a| a.integer()).unwrap_or(0) as u32)
                } else {
                    None
                };
                obj.set_entry_point(entry);
            }
            Directive::RESB | Directive::RESW => {
                obj.add_gap();
            }
            Directive::EQU => {}
        }
        Ok(())
    }

    /// WORD emission: a resolved constant is written directly; a symbolic
    /// formula leaves a zero placeholder for the linker, with one 6-half-
    /// byte modification per term.
    fn emit_word(&self, obj: &mut ObjectCode, num: &Numeric, start: u32) {
        match num.symbolic() {
            None => obj.add_text(start, num.hex(3), 3),
            Some(formula) => {
                if let Some((lhs, rhs)) = formula.split_once('-') {
                    obj.add_text(start, "000000".to_string(), 3);
                    obj.add_modification('+', lhs, start, 6);
                    obj.add_modification('-', rhs, start, 6);
                } else if let Some((lhs, rhs)) = formula.split_once('+') {
                    obj.add_text(start, "000000".to_string(), 3);
                    obj.add_modification('+', lhs, start, 6);
                    obj.add_modification('+', rhs, start, 6);
                } else if let Some(address) = self.symbols.address_of(formula) {
                    obj.add_text(start, Numeric::absolute(address).hex(3), 3);
                } else {
                    obj.add_text(start, "000000".to_string(), 3);
                    obj.add_modification('+', formula, start, 6);
                }
            }
        }
    }

    /// One text fragment per literal flushed at this LTORG/END, at its
    /// assigned address.
    fn emit_literals(&self, obj: &mut ObjectCode, token: &DirectiveToken) -> Result<(), AsmError> {
        for operand in &token.operands {
            let Operand::Literal(key) = operand else {
                continue;
            };
            let literal = self
                .literals
                .search(key)
                .ok_or_else(|| AsmError::UndefinedSymbol(key.clone()))?;
            let address = literal
                .address()
                .ok_or_else(|| AsmError::UnaddressedLiteral(key.clone()))?;
            let bytes = literal.byte_size();
            obj.add_text(address, literal.value().hex(bytes as usize), bytes);
        }
        Ok(())
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn literals(&self) -> &LiteralTable {
        &self.literals
    }

    pub fn started_with_start(&self) -> bool {
        self.started_with_start
    }
}

fn pass1_instruction(
    op: &Opcode,
    line: &SourceLine,
    locctr: &mut u32,
    symbols: &mut SymbolTable,
    literals: &mut LiteralTable,
) -> Result<Token, AsmError> {
    if let Some(label) = line.label() {
        symbols.put(label, *locctr)?;
    }

    let mut operands = Vec::new();
    match op.kind {
        OperandKind::NoOperand => {}
        OperandKind::Memory => {
            let opd = line
                .operands()
                .first()
                .ok_or_else(|| AsmError::MissingOperand(line.raw().to_string()))?;
            if opd.starts_with('=') {
                literals.intern(opd)?;
                operands.push(Operand::Literal(opd.clone()));
            } else if is_plain_constant(opd) {
                operands.push(Operand::Numeric(Numeric::constant(opd)?));
            } else {
                if Symbol::is_symbol_name(opd) {
                    symbols.touch(opd)?;
                }
                operands.push(Operand::Numeric(Numeric::formula(opd, symbols, *locctr)?));
            }
        }
        OperandKind::OneReg => {
            let opd = line
                .operands()
                .first()
                .ok_or_else(|| AsmError::MissingOperand(line.raw().to_string()))?;
            let reg = Reg::parse(opd).map_err(AsmError::UnknownName)?;
            operands.push(Operand::Register(reg));
        }
        OperandKind::TwoReg => {
            let [opd1, opd2] = line.operands() else {
                return Err(AsmError::OperandMismatch(
                    op.name.clone(),
                    "two register operands expected".to_string(),
                ));
            };
            operands.push(Operand::Register(
                Reg::parse(opd1).map_err(AsmError::UnknownName)?,
            ));
            operands.push(Operand::Register(
                Reg::parse(opd2).map_err(AsmError::UnknownName)?,
            ));
        }
    }

    let size = match op.format {
        Format::Two => 2,
        Format::ThreeOrFour => {
            if line.flags.e {
                4
            } else {
                3
            }
        }
    };
    *locctr += size;

    Ok(Token::Instruction(InstructionToken {
        source: line.operands().first().cloned().unwrap_or_default(),
        address: *locctr,
        size,
        op: op.clone(),
        operands,
        flags: line.flags,
    }))
}

fn pass1_directive(
    line: &SourceLine,
    locctr: &mut u32,
    symbols: &mut SymbolTable,
    literals: &mut LiteralTable,
    started_with_start: &mut bool,
) -> Result<Token, AsmError> {
    let operator = line.operator().unwrap_or_default();
    let directive = Directive::parse(operator)
        .map_err(|e| AsmError::UnknownName(format!("{}\n\n{}", e, line.raw())))?;

    let mut size: u32 = 0;
    let mut operands = Vec::new();

    match directive {
        Directive::START => {
            let opd = first_operand(line)?;
            *locctr = opd
                .parse::<u32>()
                .map_err(|_| AsmError::BadNumber(opd.to_string()))?;
            let label = line
                .label()
                .ok_or_else(|| AsmError::MissingLabel(line.raw().to_string()))?;
            symbols.put_rep(label, *locctr)?;
            operands.push(Operand::Numeric(Numeric::absolute(*locctr as i64)));
            *started_with_start = true;
        }
        Directive::CSECT => {
            *locctr = 0;
            let label = line
                .label()
                .ok_or_else(|| AsmError::MissingLabel(line.raw().to_string()))?;
            symbols.put_rep(label, 0)?;
        }
        Directive::EXTDEF => {
            for opd in line.operands() {
                operands.push(Operand::Numeric(Numeric::formula(opd, symbols, *locctr)?));
            }
        }
        Directive::EXTREF => {
            for opd in line.operands() {
                symbols.put_refer(opd)?;
                operands.push(Operand::Numeric(Numeric::deferred(opd)));
            }
        }
        Directive::BYTE => {
            size = 1;
            if let Some(label) = line.label() {
                symbols.put(label, *locctr)?;
            }
            *locctr += 1;
            let opd = first_operand(line)?;
            operands.push(Operand::Numeric(Numeric::constant(opd)?));
        }
        Directive::WORD => {
            size = 3;
            if let Some(label) = line.label() {
                symbols.put(label, *locctr)?;
            }
            *locctr += 3;
            let opd = first_operand(line)?;
            let num = if is_plain_constant(opd) {
                Numeric::constant(opd)?
            } else {
                Numeric::formula(opd, symbols, *locctr)?
            };
            operands.push(Operand::Numeric(num));
        }
        Directive::RESB => {
            let opd = first_operand(line)?;
            size = opd
                .parse::<u32>()
                .map_err(|_| AsmError::BadNumber(opd.to_string()))?;
            if let Some(label) = line.label() {
                symbols.put(label, *locctr)?;
            }
            *locctr += size;
            operands.push(Operand::Numeric(Numeric::absolute(size as i64)));
        }
        Directive::RESW => {
            let opd = first_operand(line)?;
            let words = opd
                .parse::<u32>()
                .map_err(|_| AsmError::BadNumber(opd.to_string()))?;
            size = 3 * words;
            if let Some(label) = line.label() {
                symbols.put(label, *locctr)?;
            }
            *locctr += size;
            operands.push(Operand::Numeric(Numeric::absolute(size as i64)));
        }
        Directive::LTORG | Directive::END => {
            while let Some((key, lit_size)) = literals.assign_next(*locctr) {
                operands.push(Operand::Literal(key));
                *locctr += lit_size;
                size += lit_size;
            }
        }
        Directive::EQU => {
            let label = line
                .label()
                .ok_or_else(|| AsmError::MissingLabel(line.raw().to_string()))?;
            let opd = first_operand(line)?;
            let value = symbols.put_formula(label, opd, *locctr)?;
            operands.push(Operand::Numeric(value));
        }
    }

    Ok(Token::Directive(DirectiveToken {
        source: line.operands().first().cloned().unwrap_or_default(),
        address: *locctr,
        size,
        directive,
        operands,
    }))
}

fn first_operand(line: &SourceLine) -> Result<&str, AsmError> {
    line.operands()
        .first()
        .map(String::as_str)
        .ok_or_else(|| AsmError::MissingOperand(line.raw().to_string()))
}
