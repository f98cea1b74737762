//! CLI argument definitions

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "frameof",
    about = "Capture and print call frames of this process",
    after_help = "\
EXAMPLES:
    frameof                          Print the stack under 4 nested wrappers
    frameof --depth 8 --skip 3       Print the single frame 3 levels up
    frameof --format json            Print frames as JSON records
    frameof --stats                  Show what the symbol table holds"
)]
pub struct Args {
    /// Number of nested wrapper calls to make before capturing
    #[arg(short, long, default_value = "4")]
    pub depth: usize,

    /// Capture a single frame this many levels above the innermost wrapper
    #[arg(short, long)]
    pub skip: Option<usize>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Also write the frames as JSON to a file
    #[arg(long, value_name = "FILE")]
    pub export: Option<PathBuf>,

    /// Print symbol table statistics
    #[arg(long)]
    pub stats: bool,

    /// Suppress non-essential output
    #[arg(short, long)]
    pub quiet: bool,
}
