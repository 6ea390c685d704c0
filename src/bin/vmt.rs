use std::path::PathBuf;

use clap::Parser;
use n2t::logging::{error, init_tracing};
use n2t::vm_translate::{collect_vm_files, translate_files};

/// VM translator: translates Hack VM (`.vm`) commands into Hack assembly.
#[derive(Parser)]
#[command(name = "vmt", version, about)]
struct Cli {
    /// Input `.vm` file or a directory of `.vm` files
    input: PathBuf,

    /// Output `.asm` file (defaults to the input path/name with a `.asm` extension)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run(&cli) {
        error(e.to_string());
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), n2t::error::N2tError> {
    let is_dir = cli.input.is_dir();

    let (inputs, default_output) = if is_dir {
        let files = collect_vm_files(&cli.input)?;
        if files.is_empty() {
            return Err(n2t::error::N2tError::range(format!(
                "input directory ({}) does not contain VM files",
                cli.input.display()
            )));
        }
        let name = cli
            .input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "out".to_string());
        (files, cli.input.join(format!("{name}.asm")))
    } else {
        (vec![cli.input.clone()], cli.input.with_extension("asm"))
    };

    let output = cli.output.clone().unwrap_or(default_output);
    translate_files(&inputs, &output, is_dir)
}
