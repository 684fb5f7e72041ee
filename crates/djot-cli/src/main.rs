//! djot CLI - Convert djot documents to HTML or inspect their structure
//!
//! Usage:
//!   djot [OPTIONS] [FILE]
//!
//! Reads FILE, or standard input when no file is given, and writes the
//! requested output to standard output.

use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process;

use clap::{Parser, ValueEnum};
use djot_core::dump::{to_ast_json, to_ast_pretty, to_matches_json, to_matches_pretty};
use djot_core::{parse_with, render_with, ParseOptions, RenderOptions};
use log::{debug, LevelFilter};

#[derive(Debug, Parser)]
#[command(name = "djot", version, about = "Convert djot documents")]
struct Cli {
    /// Output to produce
    #[arg(short, long, value_enum, default_value_t = Output::Html)]
    to: Output,

    /// Include source positions in AST output
    #[arg(short, long)]
    sourcepos: bool,

    /// Log parser phases to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Input file (standard input when omitted)
    file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Output {
    /// Rendered HTML
    Html,
    /// Indented AST listing
    Ast,
    /// AST as JSON
    AstJson,
    /// Node kinds with byte ranges
    Matches,
    /// Matches as JSON
    MatchesJson,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(()) => {}
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(default)
        .parse_default_env()
        .init();
}

fn run(cli: &Cli) -> Result<(), String> {
    let input = read_input(cli.file.as_ref())?;
    let options = ParseOptions::new().with_sourcepos(cli.sourcepos);
    let doc = parse_with(&input, &options);
    debug!("converting to {:?}", cli.to);

    let output = match cli.to {
        Output::Html => render_with(&doc, &RenderOptions::new()),
        Output::Ast => to_ast_pretty(&doc, options.sourcepos()),
        Output::AstJson => to_ast_json(&doc, options.sourcepos()).map_err(|e| e.to_string())? + "\n",
        Output::Matches => to_matches_pretty(&doc),
        Output::MatchesJson => to_matches_json(&doc).map_err(|e| e.to_string())? + "\n",
    };

    io::stdout()
        .lock()
        .write_all(output.as_bytes())
        .map_err(|e| format!("failed to write output: {}", e))
}

// =============================================================================
// Input
// =============================================================================

fn read_input(file: Option<&PathBuf>) -> Result<String, String> {
    match file {
        Some(path) => fs::read_to_string(path)
            .map_err(|e| format!("failed to read '{}': {}", path.display(), e)),
        None => {
            let mut input = String::new();
            io::stdin()
                .read_to_string(&mut input)
                .map_err(|e| format!("failed to read stdin: {}", e))?;
            Ok(input)
        }
    }
}
