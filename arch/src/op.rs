use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Operand shape declared for an opcode in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    /// No operand at all (`no`).
    NoOperand,
    /// One memory operand: symbol, constant, formula or literal (`m`).
    Memory,
    /// One register (`r1`).
    OneReg,
    /// Two registers (`r1,r2`).
    TwoReg,
}

impl OperandKind {
    pub fn parse(tag: &str) -> Result<Self, String> {
        match tag {
            "no" => Ok(OperandKind::NoOperand),
            "m" => Ok(OperandKind::Memory),
            "r1" => Ok(OperandKind::OneReg),
            "r1,r2" => Ok(OperandKind::TwoReg),
            _ => Err(format!("unrecognizable operand type `{}`", tag)),
        }
    }
}

/// Instruction format. Format 1 is not part of the supported subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Two,
    ThreeOrFour,
}

impl Format {
    pub fn parse(tag: &str) -> Result<Self, String> {
        match tag {
            "2" => Ok(Format::Two),
            "3/4" => Ok(Format::ThreeOrFour),
            _ => Err(format!("unrecognizable instruction format `{}`", tag)),
        }
    }
}

/// One opcode catalog entry: mnemonic, operand shape, format and opcode byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opcode {
    pub name: String,
    pub kind: OperandKind,
    pub format: Format,
    pub code: u8,
}

impl Opcode {
    /// Parse one tab-separated catalog line: `mnemonic \t kind \t format \t hex`.
    pub fn parse(line: &str) -> Result<Self, String> {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != 4 {
            return Err(format!("wrong opcode table line (wrong format): `{}`", line));
        }
        if fields[0].is_empty() || fields[0].len() > 6 {
            return Err(format!(
                "wrong opcode table line (bad mnemonic): `{}`",
                line
            ));
        }
        let kind = OperandKind::parse(fields[1])
            .map_err(|e| format!("wrong opcode table line ({}): `{}`", e, line))?;
        let format = Format::parse(fields[2])
            .map_err(|e| format!("wrong opcode table line ({}): `{}`", e, line))?;
        let code = u8::from_str_radix(fields[3], 16)
            .map_err(|_| format!("wrong opcode table line (wrong opcode): `{}`", line))?;
        Ok(Opcode {
            name: fields[0].to_string(),
            kind,
            format,
            code,
        })
    }
}

/// Immutable mnemonic lookup, consumed read-only by the assembler passes.
#[derive(Debug, Clone)]
pub struct OpTable {
    map: HashMap<String, Opcode>,
}

impl OpTable {
    /// Parse a whole catalog text, one opcode per line. Blank lines are
    /// skipped; any malformed line fails with its text.
    pub fn parse(text: &str) -> Result<Self, String> {
        let mut map = HashMap::new();
        for line in text.lines() {
            if line.is_empty() {
                continue;
            }
            let op = Opcode::parse(line)?;
            map.insert(op.name.clone(), op);
        }
        Ok(OpTable { map })
    }

    pub fn search(&self, name: &str) -> Option<&Opcode> {
        self.map.get(name)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// The built-in standard SIC/XE catalog.
    pub fn builtin() -> &'static OpTable {
        &BUILTIN
    }
}

static BUILTIN: Lazy<OpTable> = Lazy::new(|| OpTable::parse(DEFAULT_TABLE).unwrap());

/// The standard SIC/XE opcode set in the catalog file format.
pub const DEFAULT_TABLE: &str = "\
LDA\tm\t3/4\t00
LDX\tm\t3/4\t04
LDL\tm\t3/4\t08
STA\tm\t3/4\t0C
STX\tm\t3/4\t10
STL\tm\t3/4\t14
ADD\tm\t3/4\t18
SUB\tm\t3/4\t1C
MUL\tm\t3/4\t20
DIV\tm\t3/4\t24
COMP\tm\t3/4\t28
TIX\tm\t3/4\t2C
JEQ\tm\t3/4\t30
JGT\tm\t3/4\t34
JLT\tm\t3/4\t38
J\tm\t3/4\t3C
AND\tm\t3/4\t40
OR\tm\t3/4\t44
JSUB\tm\t3/4\t48
RSUB\tno\t3/4\t4C
LDCH\tm\t3/4\t50
STCH\tm\t3/4\t54
ADDF\tm\t3/4\t58
SUBF\tm\t3/4\t5C
MULF\tm\t3/4\t60
DIVF\tm\t3/4\t64
LDB\tm\t3/4\t68
LDS\tm\t3/4\t6C
LDF\tm\t3/4\t70
LDT\tm\t3/4\t74
STB\tm\t3/4\t78
STS\tm\t3/4\t7C
STF\tm\t3/4\t80
STT\tm\t3/4\t84
COMPF\tm\t3/4\t88
ADDR\tr1,r2\t2\t90
SUBR\tr1,r2\t2\t94
MULR\tr1,r2\t2\t98
DIVR\tr1,r2\t2\t9C
COMPR\tr1,r2\t2\tA0
SHIFTL\tr1,r2\t2\tA4
SHIFTR\tr1,r2\t2\tA8
RMO\tr1,r2\t2\tAC
SVC\tr1\t2\tB0
CLEAR\tr1\t2\tB4
TIXR\tr1\t2\tB8
LPS\tm\t3/4\tD0
STI\tm\t3/4\tD4
RD\tm\t3/4\tD8
WD\tm\t3/4\tDC
TD\tm\t3/4\tE0
STSW\tm\t3/4\tE8
SSK\tm\t3/4\tEC
";
