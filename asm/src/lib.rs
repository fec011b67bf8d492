//! Two-pass assembler for the SIC/XE instructional architecture.
//!
//! Source text is split into control sections, each of which is resolved
//! (pass 1: location counter, symbol table, literal pool) and then encoded
//! (pass 2: addressing-mode bits, PC-relative displacements, relocation
//! entries) into the H/D/R/T/M/E object record format.
//!
//! ```
//! let source = "COPY\tSTART\t0\nFIRST\tRSUB\n\tEND\tFIRST";
//! let object = sicasm::assemble(source).unwrap();
//! assert!(object.starts_with("HCOPY  "));
//! ```

pub mod assembler;
pub mod error;
pub mod literal;
pub mod numeric;
pub mod objcode;
pub mod section;
pub mod symbol;
pub mod token;

pub use assembler::{Assembler, Assembly};
pub use error::AsmError;
pub use section::ControlSection;

/// Assemble a complete source text with the built-in opcode catalog and
/// return the object module text, sections joined by blank lines.
pub fn assemble(source: &str) -> Result<String, AsmError> {
    Assembler::with_builtin().assemble(source)?.object_text()
}
