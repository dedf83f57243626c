use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use wld::{link, Flags, LinkError};

/// WRAMP linker: merges relocatable object modules into a Motorola S-record
/// load image.
#[derive(Parser)]
#[command(name = "ld")]
struct Args {
    /// Object modules to link, in the order their segments are concatenated.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output S-record file.
    #[arg(short = 'o', long = "output", value_name = "OUTPUT", default_value = "link.out")]
    output: PathBuf,

    /// Base address of the .text segment.
    #[arg(long = "Ttext", value_name = "ADDRESS")]
    ttext: Option<String>,

    /// Base address of the .data segment.
    #[arg(long = "Tdata", value_name = "ADDRESS")]
    tdata: Option<String>,

    /// Base address of the .bss segment.
    #[arg(long = "Tbss", value_name = "ADDRESS")]
    tbss: Option<String>,

    /// End address of the .bss segment; the base is derived from its size.
    #[arg(long = "Ebss", value_name = "ADDRESS")]
    ebss: Option<String>,

    /// Print the address and disassembly of every word as it's placed.
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

/// Addresses are accepted in decimal or `0x`-prefixed hex, matching the
/// reference linker's `-T`/`-E` flags.
fn parse_address(text: &str) -> Result<u32, String> {
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).map_err(|err| err.to_string()),
        None => text.parse::<u32>().map_err(|err| err.to_string()),
    }
}

fn parse_flag(flag: &str, raw: &Option<String>) -> Result<Option<u32>, ExitCode> {
    match raw {
        None => Ok(None),
        Some(text) => match parse_address(text) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                eprintln!("ld: invalid address for {}: \"{}\": {}", flag, text, err);
                Err(ExitCode::FAILURE)
            }
        },
    }
}

fn resolve_flags(args: &Args) -> Result<Flags, ExitCode> {
    Ok(Flags {
        text_base: parse_flag("-Ttext", &args.ttext)?,
        data_base: parse_flag("-Tdata", &args.tdata)?,
        bss_base: parse_flag("-Tbss", &args.tbss)?,
        bss_end: parse_flag("-Ebss", &args.ebss)?,
        verbose: args.verbose,
    })
}

fn main() -> ExitCode {
    let args = Args::parse();

    let flags = match resolve_flags(&args) {
        Ok(flags) => flags,
        Err(code) => return code,
    };

    match link(&args.inputs, &flags) {
        Ok(image) => {
            let lines = wld::srecord_emit::emit(&image);
            let contents = lines.join("\n") + "\n";
            if let Err(err) = std::fs::write(&args.output, contents) {
                eprintln!("ld: writing output \"{}\": {}", args.output.display(), err);
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        Err(errors) => {
            for err in &errors {
                eprintln!("ld: {}", err);
            }
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod main_test {
    use super::parse_address;

    #[test]
    fn parses_decimal_and_hex() {
        assert_eq!(parse_address("1024").unwrap(), 1024);
        assert_eq!(parse_address("0x400").unwrap(), 0x400);
        assert_eq!(parse_address("0X400").unwrap(), 0x400);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_address("not-a-number").is_err());
    }
}
