//! src/args.rs
//!
//! Command-line interface for linkcheck, using `clap`'s derive API.

use clap::Parser;
use std::path::PathBuf;

/// Top-level CLI configuration for linkcheck.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct Args {
    /// Path to the line-oriented hyperlink source file.
    #[arg(long)]
    pub input: PathBuf,

    /// Optional TOML config file (see `config::RawConfig` for fields).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory `output.txt`/`output.json` are written to.
    #[arg(long, default_value = ".")]
    pub out_dir: PathBuf,

    /// Overrides `config.workers` (number of concurrent checker tasks).
    #[arg(long)]
    pub workers: Option<usize>,

    /// Overrides `config.timeout_secs` (per-request timeout).
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Overrides `config.retries` (outer retry attempts per hyperlink).
    #[arg(long)]
    pub retries: Option<u32>,

    /// Overrides `config.anchors` (whether to validate `#fragment`s).
    #[arg(long)]
    pub anchors: Option<bool>,
}
