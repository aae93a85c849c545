//! # ropscope - command-line entry point
//!
//! Opens one binary and runs the requested actions in a fixed order:
//! format information, gadget search, byte-pattern search, integer search.

use std::io::{self, Write};

use anyhow::{Context, Result};
use clap::Parser;
use regex::Regex;
use tracing::info;

use ropscope::cli::{parse_hex_pattern, render_json, render_text, Args, GadgetFilter};
use ropscope::logging::{init_tracing_json, init_tracing_with_level};
use ropscope::{Program, ProgramOptions, SearchConfig, Syntax, VerbosityLevel};

const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;

fn main() {
    let args = Args::parse();
    if args.log_json {
        init_tracing_json();
    } else {
        init_tracing_with_level("warn");
    }

    std::process::exit(match run(&args) {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            EXIT_ERROR
        }
    });
}

fn run(args: &Args) -> Result<()> {
    let options = ProgramOptions {
        arch: args.raw,
        raw_base: args.va,
        syntax: if args.att { Syntax::Att } else { Syntax::Intel },
        ..ProgramOptions::default()
    };
    let program = Program::open_with(&args.file, options)
        .with_context(|| format!("Failed to load {}", args.file.display()))?;

    let stdout = io::stdout();
    let mut out = stdout.lock();

    if let Some(level) = args.info {
        write!(
            out,
            "{}",
            program.display_information(VerbosityLevel::from(level))
        )?;
    }

    if let Some(depth) = args.rop {
        let config = SearchConfig {
            max_depth: depth,
            parallel: !args.sequential,
        };
        let catalog = program
            .find_gadgets_with(&config)
            .context("Gadget search failed")?;

        let filter = GadgetFilter {
            unique: args.unique,
            bad_bytes: match &args.bad_bytes {
                Some(hex) => parse_hex_pattern(hex).context("Invalid --bad-bytes")?,
                None => Vec::new(),
            },
            pattern: args
                .filter
                .as_deref()
                .map(Regex::new)
                .transpose()
                .context("Invalid --filter regex")?,
            address_bytes: program.cpu().address_bytes(),
        };
        let gadgets = filter.apply(&catalog);
        info!(
            found = catalog.len(),
            shown = gadgets.len(),
            "Gadgets filtered"
        );

        if args.json {
            writeln!(out, "{}", render_json(&gadgets)?)?;
        } else {
            write!(out, "{}", render_text(&gadgets))?;
        }
    }

    if let Some(hex) = &args.search_hexa {
        let pattern = parse_hex_pattern(hex).context("Invalid --search-hexa")?;
        report_pattern(&program, &pattern, args.json, &mut out)?;
    }

    if let Some(value) = args.search_int {
        let pattern = program.cpu().encode_u32(value);
        report_pattern(&program, &pattern, args.json, &mut out)?;
    }

    out.flush()?;
    Ok(())
}

fn report_pattern<W: Write>(program: &Program, pattern: &[u8], json: bool, out: &mut W) -> Result<()> {
    if json {
        let matches = program.search_bytes(pattern)?;
        writeln!(out, "{}", serde_json::to_string_pretty(&matches)?)?;
    } else {
        let hits = program.search_and_display(pattern, out)?;
        if hits == 0 {
            writeln!(out, "Pattern {} not found", hex::encode(pattern))?;
        }
    }
    Ok(())
}
