use thiserror::Error;

/// Every failure the assembler can surface. One section's assembly aborts on
/// the first error; `UndefinedExtern` additionally invalidates the whole run,
/// since a missing external reference makes the module unlinkable.
#[derive(Error, Debug)]
pub enum AsmError {
    #[error("missing operator\n\n{0}")]
    MissingOperator(String),

    #[error("missing label\n\n{0}")]
    MissingLabel(String),

    #[error("missing operand\n\n{0}")]
    MissingOperand(String),

    #[error("{0}")]
    UnknownName(String),

    #[error("cannot parse `{0}` as a number")]
    BadNumber(String),

    #[error("malformed constant `{0}`")]
    BadConstant(String),

    #[error("illegal symbol name `{0}`")]
    IllegalSymbolName(String),

    #[error("re-defined symbol `{0}`")]
    RedefinedSymbol(String),

    #[error("undefined symbol `{0}`")]
    UndefinedSymbol(String),

    #[error("undefined external reference `{0}`")]
    UndefinedExtern(String),

    #[error("literal `{0}` was never assigned an address")]
    UnaddressedLiteral(String),

    #[error("displacement {0} does not fit in 12 bits\n\n{1}")]
    DisplacementOverflow(i64, String),

    #[error("operand value {0} does not fit in {1} bits\n\n{2}")]
    FieldOverflow(i64, u32, String),

    #[error("operand mismatch for `{0}`: {1}")]
    OperandMismatch(String, String),

    #[error("no section name: object code requires START or CSECT")]
    MissingSection,

    #[error("{0}")]
    OpTableFormat(String),

    #[error("failed to open file: {0}")]
    FileOpen(String, #[source] std::io::Error),

    #[error("failed to write file: {0}")]
    FileWrite(String, #[source] std::io::Error),
}
