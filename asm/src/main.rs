use color_print::cprintln;
use sicasm::{Assembler, AsmError};
use sicxe::op::OpTable;

const HELP_TEMPLATE: &str = "\
{before-help}{bin} {version}
  {about}

{usage-heading}
{tab}{usage}

{all-args}{after-help}";

#[derive(Debug, clap::Parser)]
#[clap(version, about, help_template = HELP_TEMPLATE)]
struct Args {
    /// Input source file
    #[clap(default_value = "input.txt")]
    input: String,

    /// Opcode table file (uses the built-in catalog when omitted)
    #[clap(short, long)]
    table: Option<String>,

    /// Object code output file
    #[clap(short, long, default_value = "output_objectcode.txt")]
    output: String,

    /// Symbol table listing output file
    #[clap(long, default_value = "output_symtab.txt")]
    symtab: String,

    /// Literal table listing output file
    #[clap(long, default_value = "output_littab.txt")]
    littab: String,

    /// Dump resolved tokens per section
    #[clap(short, long)]
    dump: bool,
}

fn main() {
    use clap::Parser;

    let args: Args = Args::parse();
    if let Err(err) = run(&args) {
        cprintln!("<red,bold>error</>: {}", err);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), AsmError> {
    println!("SIC/XE Two-Pass Assembler");

    println!("1. Load Opcode Catalog");
    let optable = match &args.table {
        Some(path) => {
            println!("  < {}", path);
            let text = std::fs::read_to_string(path)
                .map_err(|e| AsmError::FileOpen(path.clone(), e))?;
            OpTable::parse(&text).map_err(AsmError::OpTableFormat)?
        }
        None => OpTable::builtin().clone(),
    };

    println!("2. Assemble Control Sections");
    println!("  < {}", args.input);
    let source = std::fs::read_to_string(&args.input)
        .map_err(|e| AsmError::FileOpen(args.input.clone(), e))?;
    let assembly = Assembler::new(optable).assemble(&source)?;

    if args.dump {
        for (idx, section) in assembly.sections.iter().enumerate() {
            println!("--- control section {} ---", idx + 1);
            for token in section.tokens() {
                println!("{:06X}  {}", token.address() - token.size(), token);
            }
        }
    }

    println!("3. Write Outputs");
    let object = assembly.object_text()?;
    write_file(&args.symtab, &assembly.symbol_text())?;
    write_file(&args.littab, &assembly.literal_text())?;
    write_file(&args.output, &object)?;

    Ok(())
}

fn write_file(path: &str, content: &str) -> Result<(), AsmError> {
    println!("  > {}", path);
    std::fs::write(path, content).map_err(|e| AsmError::FileWrite(path.to_string(), e))
}
