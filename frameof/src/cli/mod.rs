//! Command-line interface for the `frameof` binary

pub mod args;

pub use args::{Args, OutputFormat};
