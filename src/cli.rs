//! Command-line interface definitions for rotcheck.
//!
//! This module defines all CLI arguments and subcommands using the clap
//! derive API. Global options (verbosity, configuration file, error format)
//! apply to every subcommand.
//!
//! # Example
//!
//! ```bash
//! # Verify every configured root and ping the health check on success
//! rotcheck verify
//!
//! # Verify with 8 workers and a JSON summary, without pinging
//! rotcheck verify --workers 8 --no-health-check --summary json
//!
//! # Force a file to be re-verified on the next run
//! rotcheck clear-cache /srv/photos/2019/img_0001.jpg
//!
//! # Restore a file's modification time from its baseline
//! rotcheck fix-timestamp /srv/photos/2019/img_0001.jpg /srv/photos
//!
//! # Drop every baseline listed in ids.txt
//! rotcheck delete-records ids.txt
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Bit-rot detector for mutable and archival file trees.
///
/// rotcheck re-reads files, recomputes their CRC-32 and compares it with the
/// baselines in a shared store. Files on immutable roots must never change;
/// files on mutable roots get a new baseline when they do.
#[derive(Debug, Parser)]
#[command(name = "rotcheck")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Configuration file (default: ./rotcheck.toml, then the user config directory)
    #[arg(short, long, global = true, value_name = "FILE", env = "ROTCHECK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Print errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands for rotcheck.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Verify every configured mutable and immutable root
    Verify(VerifyArgs),
    /// Remove one file from the recency cache so it is verified next run
    ClearCache(ClearCacheArgs),
    /// Restore a file's modification time from its stored baseline
    FixTimestamp(FixTimestampArgs),
    /// Delete baselines by file ID, read from a newline-delimited file
    DeleteRecords(DeleteRecordsArgs),
    /// Print the effective configuration as TOML
    ShowConfig,
}

/// Arguments for the verify subcommand.
#[derive(Debug, Args)]
pub struct VerifyArgs {
    /// Number of verification workers (default: host parallelism)
    #[arg(short, long, value_name = "N", value_parser = clap::value_parser!(u16).range(1..))]
    pub workers: Option<u16>,

    /// Do not call the health-check URL, even after a clean run
    #[arg(long)]
    pub no_health_check: bool,

    /// Format of the end-of-run summary on stdout
    #[arg(long, value_enum, default_value = "text")]
    pub summary: SummaryFormat,
}

/// Arguments for the clear-cache subcommand.
#[derive(Debug, Args)]
pub struct ClearCacheArgs {
    /// Absolute path of the file, exactly as it was verified
    #[arg(value_name = "ABSOLUTE_PATH")]
    pub path: PathBuf,
}

/// Arguments for the fix-timestamp subcommand.
#[derive(Debug, Args)]
pub struct FixTimestampArgs {
    /// File whose modification time is restored
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Configured root the file lives under
    #[arg(value_name = "ROOT")]
    pub root: PathBuf,
}

/// Arguments for the delete-records subcommand.
#[derive(Debug, Args)]
pub struct DeleteRecordsArgs {
    /// File with one file ID per line; blank lines are ignored
    #[arg(value_name = "IDS_FILE")]
    pub ids_file: PathBuf,
}

/// Format of the verification summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SummaryFormat {
    /// Human-readable totals
    Text,
    /// JSON document for scripting
    Json,
}

impl std::fmt::Display for SummaryFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SummaryFormat::Text => write!(f, "text"),
            SummaryFormat::Json => write!(f, "json"),
        }
    }
}
