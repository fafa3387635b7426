//! pyc-dis
//!
//! Prints every field of a `.pyc` file (or bare marshal stream) as it is
//! decoded.
//!
//! Usage: `pyc-dis [PATH] [--bare] [--json] [--quiet]`

use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process;

use anyhow::Context;
use clap::Parser;
use pyc_dis::{Config, Format};
use pyc_marshal::limits::MAX_DEPTH;
use pyc_marshal::DecodeOptions;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "pyc-dis")]
#[command(about = "Disassemble a .pyc file or marshal stream field by field")]
struct Args {
    /// Input file; reads stdin when omitted or `-`
    path: Option<PathBuf>,

    /// Input is a bare marshal stream without the 16-byte .pyc header
    #[arg(long)]
    bare: bool,

    /// Print events as JSON lines
    #[arg(long)]
    json: bool,

    /// Print only the summary line
    #[arg(long, short)]
    quiet: bool,

    /// Maximum value nesting depth
    #[arg(long, default_value_t = MAX_DEPTH)]
    max_depth: usize,

    /// Fail if bytes remain after the root value
    #[arg(long)]
    require_eof: bool,
}

fn read_input(path: Option<&PathBuf>) -> anyhow::Result<Vec<u8>> {
    match path {
        Some(path) if path.as_os_str() != "-" => {
            fs::read(path).with_context(|| format!("failed to read '{}'", path.display()))
        }
        _ => {
            let mut data = Vec::new();
            io::stdin()
                .read_to_end(&mut data)
                .context("failed to read stdin")?;
            Ok(data)
        }
    }
}

fn main() {
    pyc_dis::init_logging();

    let args = Args::parse();

    let input = match read_input(args.path.as_ref()) {
        Ok(input) => input,
        Err(e) => {
            error!("{e:#}");
            process::exit(1);
        }
    };
    info!(bytes = input.len(), "read input");

    let config = Config {
        bare: args.bare,
        format: if args.json { Format::Json } else { Format::Human },
        quiet: args.quiet,
        options: DecodeOptions::new()
            .with_max_depth(args.max_depth)
            .with_require_eof(args.require_eof),
    };

    let result = pyc_dis::disassemble(&input, &config, &mut io::stderr().lock());
    if let Err(e) = result {
        error!("{e:#}");
        process::exit(1);
    }
}
