//! # frameof - Main Entry Point
//!
//! Nests a configurable number of wrapper calls, captures frames from the
//! innermost one and prints them, as a quick check that a build resolves its
//! own frames.

use anyhow::{Context, Result};
use clap::Parser;
use frameof::cli::{Args, OutputFormat};
use frameof::{capture_skip, capture_stack, export, preflight, symbolization, Frame};
use log::{info, warn};
use std::fs::File;
use std::io::{self, BufWriter};

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_USAGE: i32 = 2;

fn main() {
    env_logger::init();
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let code = if e.use_stderr() { EXIT_USAGE } else { EXIT_SUCCESS };
            let _ = e.print();
            std::process::exit(code);
        }
    };
    std::process::exit(match run(&args) {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            EXIT_ERROR
        }
    });
}

fn run(args: &Args) -> Result<()> {
    let exe = std::env::current_exe().context("Failed to locate the current executable")?;

    if !args.quiet {
        match preflight::check_debug_symbols(&exe) {
            Ok(symbols) => {
                if let Some(warning) = symbols.warning() {
                    eprintln!("warning: {warning}");
                }
            }
            Err(e) => warn!("Pre-flight check skipped: {e:#}"),
        }
    }

    let stats = symbolization::init();
    if args.stats {
        println!("executable: {}", exe.display());
        println!("functions:  {}", stats.functions);
        println!("line rows:  {}", stats.line_rows);
        println!("inlined:    {}", stats.logical_frames.saturating_sub(stats.line_rows));
        println!("files:      {}", stats.files);
        println!("load bias:  0x{:x}", stats.load_bias);
    }

    info!("Capturing under {} nested wrappers", args.depth);
    let frames = nest(args.depth, args.skip);

    match args.format {
        OutputFormat::Text => {
            for (i, frame) in frames.iter().enumerate() {
                println!("#{i:<2} {} {frame}", frame.pc());
            }
        }
        OutputFormat::Json => export::write_json(&frames, io::stdout().lock())?,
    }

    if let Some(path) = &args.export {
        let file = File::create(path)
            .with_context(|| format!("Failed to create export file {}", path.display()))?;
        export::write_json(&frames, BufWriter::new(file))
            .with_context(|| format!("Failed to write {}", path.display()))?;
        if !args.quiet {
            eprintln!("exported {} frames to {}", frames.len(), path.display());
        }
    }

    Ok(())
}

/// Recurse `depth` times, then capture from the innermost call
#[inline(never)]
fn nest(depth: usize, skip: Option<usize>) -> Vec<Frame> {
    if depth > 0 {
        // Not a tail call, so every level keeps its own frame
        let frames = nest(depth - 1, skip);
        return std::hint::black_box(frames);
    }
    match skip {
        Some(n) => vec![capture_skip(n)],
        None => capture_stack(),
    }
}
