use std::path::PathBuf;

use clap::Parser;
use n2t::hack_asm::Assembler;
use n2t::logging::{error, init_tracing};

/// Hack assembler: translates `.asm` source into `.hack` binary.
#[derive(Parser)]
#[command(name = "asm", version, about)]
struct Cli {
    /// Input `.asm` file
    input: PathBuf,

    /// Output file (defaults to the input path with a `.hack` extension)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let output = cli.output.clone().unwrap_or_else(|| cli.input.with_extension("hack"));

    if let Err(e) = run(&cli.input, &output) {
        error(e.to_string());
        std::process::exit(1);
    }
}

fn run(input: &std::path::Path, output: &std::path::Path) -> Result<(), n2t::error::N2tError> {
    let source = std::fs::read_to_string(input).map_err(|source| n2t::error::N2tError::ReadFile {
        path: input.to_path_buf(),
        source,
    })?;
    let file_name = input.to_string_lossy().into_owned();

    Assembler::create(output)?.assemble(&source, &file_name)
}
