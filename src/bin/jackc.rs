use std::path::PathBuf;

use clap::Parser;
use n2t::jack::{collect_jack_files, compile_paths, CompilationOptions};
use n2t::logging::{error, init_tracing};

/// Jack compiler: translates `.jack` class source into Hack VM code.
#[derive(Parser)]
#[command(name = "jackc", version, about)]
struct Cli {
    /// Input `.jack` file or a directory of `.jack` files
    input: PathBuf,

    /// Also emit the parse tree as XML alongside the generated VM code
    #[arg(short = 't', long = "parse-tree")]
    parse_tree: bool,

    /// Number of worker threads (defaults to the available parallelism)
    #[arg(short, long)]
    jobs: Option<usize>,
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error(e.to_string());
            std::process::exit(2);
        }
    }
}

fn run(cli: &Cli) -> Result<bool, n2t::error::N2tError> {
    let inputs = if cli.input.is_dir() {
        let files = collect_jack_files(&cli.input)?;
        if files.is_empty() {
            return Err(n2t::error::N2tError::range(format!(
                "input directory ({}) does not contain Jack files",
                cli.input.display()
            )));
        }
        files
    } else {
        vec![cli.input.clone()]
    };

    let jobs = cli.jobs.unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    });

    let options = CompilationOptions {
        output_parse_tree: cli.parse_tree,
    };

    Ok(compile_paths(&inputs, jobs, options))
}
