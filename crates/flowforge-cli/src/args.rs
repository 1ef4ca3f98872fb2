//! Command-line argument definitions for the Flowforge CLI.
//!
//! This module defines the [`Args`] structure parsed from the command line
//! using [`clap`]. Arguments select the input and output, the output format,
//! configuration file and logging verbosity.

use clap::{Parser, ValueEnum};

/// Command-line arguments for the Flowforge flowchart tool
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the input file
    ///
    /// `.js`, `.jsx`, `.mjs`, `.cjs`, `.ts`, `.tsx`, `.mts` and `.cts` files
    /// are read as source code, anything else as the Flowforge language.
    #[arg(required_unless_present = "serve")]
    pub input: Option<String>,

    /// Path to the output file; standard output when absent
    #[arg(short, long)]
    pub output: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Mermaid)]
    pub format: OutputFormat,

    /// Source language, overriding detection by file extension
    #[arg(long)]
    pub language: Option<String>,

    /// Theme used when the diagram declares none
    #[arg(long)]
    pub theme: Option<String>,

    /// Answer JSON requests read line by line from standard input
    #[arg(long, conflicts_with = "input")]
    pub serve: bool,

    /// Path to configuration file (TOML)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// What to write for the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Mermaid flowchart text
    Mermaid,
    /// The full result as JSON
    Json,
    /// Node positions as JSON
    Layout,
}
