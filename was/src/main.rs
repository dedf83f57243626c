use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use was::assemble;

/// WRAMP assembler: turns one `.s` source file into a relocatable object module.
#[derive(Parser)]
#[command(name = "as")]
struct Args {
    /// Source file to assemble.
    input: PathBuf,

    /// Output object file. Defaults to the input name with its `.s`/`.S`
    /// suffix replaced by `.o` (or `.o` appended, if there was none).
    #[arg(short = 'o', long = "output", value_name = "OUTPUT")]
    output: Option<PathBuf>,
}

#[derive(Debug)]
enum IoContext {
    ReadInput,
    WriteOutput,
}

fn default_output_path(input: &Path) -> PathBuf {
    match input.extension().and_then(|ext| ext.to_str()) {
        Some("s") | Some("S") => input.with_extension("o"),
        _ => {
            let mut name = input.as_os_str().to_owned();
            name.push(".o");
            PathBuf::from(name)
        }
    }
}

fn report_io(context: IoContext, path: &Path, err: impl std::fmt::Display) {
    let verb = match context {
        IoContext::ReadInput => "reading input",
        IoContext::WriteOutput => "writing output",
    };
    eprintln!("as: {} \"{}\": {}", verb, path.display(), err);
}

fn main() -> ExitCode {
    let args = Args::parse();

    let source = match fs::read_to_string(&args.input) {
        Ok(s) => s,
        Err(err) => {
            report_io(IoContext::ReadInput, &args.input, err);
            return ExitCode::FAILURE;
        }
    };

    let output_path = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&args.input));

    let input_name = args.input.display().to_string();
    match assemble(&source) {
        Ok((module, warnings)) => {
            for warning in &warnings {
                eprintln!("{}: {}", input_name, warning);
            }
            if let Err(err) = wobj::write_file(&output_path, &module) {
                report_io(IoContext::WriteOutput, &output_path, err);
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{}", err.with_path(&input_name));
            ExitCode::FAILURE
        }
    }
}
