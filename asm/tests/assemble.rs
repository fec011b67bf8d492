use sicasm::section::ControlSection;
use sicasm::token::Token;
use sicasm::{assemble, Assembler};
use sicxe::op::OpTable;

/// A two-section program exercising extended format, immediate and indexed
/// addressing, literals, reserved storage, EQU formulas and cross-section
/// linkage.
const COPY: &str = "COPY\tSTART\t0\n\
\tEXTDEF\tBUFFER,LENGTH,MAXLEN\n\
\tEXTREF\tRDREC\n\
FIRST\tSTL\tRETADR\n\
CLOOP\t+JSUB\tRDREC\n\
\tLDA\tLENGTH\n\
\tCOMP\t#0\n\
\tJEQ\tENDFIL\n\
\tJ\tCLOOP\n\
ENDFIL\tLDA\t=C'EOF'\n\
\tSTA\tBUFFER,X\n\
RETADR\tRESW\t1\n\
LENGTH\tRESW\t1\n\
BUFFER\tRESB\t16\n\
BUFEND\tEQU\t*\n\
MAXLEN\tEQU\tBUFEND-BUFFER\n\
\tLTORG\n\
RDREC\tCSECT\n\
\tEXTREF\tBUFFER,LENGTH,MAXLEN\n\
\tCLEAR\tX\n\
\tCLEAR\tA\n\
\t+LDT\t#MAXLEN\n\
\tLDA\t#3\n\
\t+STA\tBUFFER\n\
\t+STX\tLENGTH\n\
\tRSUB\n\
\tEND\tFIRST";

const COPY_OBJECT: &str = "HCOPY  000000000032\n\
DBUFFER00001FLENGTH00001CMAXLEN000010\n\
RRDREC \n\
T000000191720164B1000000320122900003320033F2FF00320190FA006\n\
T00002F03454F46\n\
M00000405+RDREC\n\
E000000\n\
\n\
HRDREC 000000000016\n\
RBUFFERLENGTHMAXLEN\n\
T00000016B410B400751000000100030F100000131000004F0000\n\
M00000505+MAXLEN\n\
M00000C05+BUFFER\n\
M00001005+LENGTH\n\
E";

#[test]
fn copy_program_round_trips_exactly() {
    assert_eq!(assemble(COPY).unwrap(), COPY_OBJECT);
}

#[test]
fn copy_program_listings() {
    let assembly = Assembler::with_builtin().assemble(COPY).unwrap();
    assert_eq!(assembly.sections.len(), 2);

    let symbols = assembly.symbol_text();
    assert!(symbols.contains("MAXLEN"));
    assert!(symbols.contains("0x10"));
    assert!(symbols.contains("REF"));

    let literals = assembly.literal_text();
    assert!(literals.contains("=C'EOF'"));
    assert!(literals.contains("2F"));
}

#[test]
fn entry_point_depends_on_each_sections_own_start() {
    let assembly = Assembler::with_builtin().assemble(COPY).unwrap();
    // Section one opened with START, section two with CSECT: only the
    // first carries an entry point.
    let first = assembly.objects[0].serialize().unwrap();
    let second = assembly.objects[1].serialize().unwrap();
    assert!(first.ends_with("E000000"));
    assert!(second.ends_with("\nE"));
}

#[test]
fn extended_immediate_constant_alone() {
    let lines = vec!["RDREC\t+LDT\t#4096".to_string()];
    let cs = ControlSection::pass1(OpTable::builtin(), &lines).unwrap();
    let Token::Instruction(inst) = &cs.tokens()[0] else {
        panic!("expected an instruction token");
    };
    assert_eq!(inst.size, 4);
    assert!(inst.flags.e);
    assert!(!inst.flags.p);
}

#[test]
fn long_text_runs_split_into_thirty_byte_records() {
    let mut src = String::from("S\tSTART\t0\n");
    for _ in 0..12 {
        src.push_str("\tWORD\t1\n");
    }
    src.push_str("\tEND\tS");
    let object = assemble(&src).unwrap();
    let records: Vec<&str> = object.lines().filter(|l| l.starts_with('T')).collect();
    assert_eq!(records.len(), 2);
    assert!(records[0].starts_with("T0000001E"));
    assert!(records[1].starts_with("T00001E06"));
}

#[test]
fn program_length_covers_trailing_literals() {
    let src = "S\tSTART\t0\n\
\tLDA\t=X'05'\n\
\tEND\tS";
    let object = assemble(src).unwrap();
    // 3 bytes of code plus the 1-byte literal flushed at END.
    assert!(object.starts_with("HS     000000000004\n"));
    assert!(object.contains("T0000000403200005"));
}

#[test]
fn missing_operator_is_reported_with_the_line() {
    let src = "S\tSTART\t0\nORPHAN\n\tEND\tS";
    let err = assemble(src).unwrap_err();
    assert!(err.to_string().contains("ORPHAN"));
}

#[test]
fn undefined_extended_target_aborts_the_run() {
    let src = "S\tSTART\t0\n\t+JSUB\tNOWHERE\n\tEND\tS";
    let err = assemble(src).unwrap_err();
    assert!(err.to_string().contains("NOWHERE"));
}
