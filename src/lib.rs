//! rotcheck - Bit rot detector
//!
//! Periodically re-reads files, recomputes their CRC-32 and compares it with
//! a baseline in a shared store. Files under *mutable* roots may change as
//! long as a new baseline backs the change; files under *immutable* roots
//! must never change. A local recency cache keeps unchanged files from being
//! re-read too often.
//!
//! The binary is a thin wrapper around [`run_app`].

pub mod actions;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod progress;
pub mod report;
pub mod scanner;
pub mod signal;
pub mod store;
pub mod verify;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;

use crate::cache::RecencyCache;
use crate::cli::{Cli, Commands, SummaryFormat, VerifyArgs};
use crate::config::Config;
use crate::error::ExitCode;
use crate::progress::Progress;
use crate::report::{FileRunLog, HealthReporter, RunLog};
use crate::store::{BaselineStore, Reconciler, SqliteBaselineStore};
use crate::verify::orchestrator::default_workers;
use crate::verify::{
    Histogram, Mutability, OrchestratorConfig, Outcome, VerificationOrchestrator,
};

/// End-of-run summary printed by `verify`.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    /// Outcome counts over all roots
    pub totals: Histogram,
    /// Whether an error was written to the run log
    pub errors_logged: bool,
    /// Whether the run counts as healthy (no FAIL, no logged error)
    pub healthy: bool,
}

/// Run the application for parsed command-line arguments.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or a command fails.
/// Verification failures are not errors; they map to
/// [`ExitCode::VerificationFailed`].
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);
    let config = Config::load(cli.config.as_deref())?;
    run_command(&cli.command, &config, cli.quiet)
}

/// Run a single command against an already loaded configuration.
///
/// # Errors
///
/// See [`run_app`].
pub fn run_command(command: &Commands, config: &Config, quiet: bool) -> Result<ExitCode> {
    match command {
        Commands::Verify(args) => {
            let summary = run_verify(config, args, quiet)?;
            if summary.healthy {
                Ok(ExitCode::Success)
            } else {
                Ok(ExitCode::VerificationFailed)
            }
        }
        Commands::ClearCache(args) => {
            let cache = RecencyCache::open(&config.cache_path).with_context(|| {
                format!("Failed to open recency cache at {}", config.cache_path.display())
            })?;
            let removed = actions::clear_cache(&cache, &args.path)?;
            if removed {
                println!("Removed {} from the recency cache", args.path.display());
            } else {
                println!("{} was not in the recency cache", args.path.display());
            }
            Ok(ExitCode::Success)
        }
        Commands::FixTimestamp(args) => {
            let store = open_store(&config.store_path)?;
            let fix = actions::fix_timestamp(&store, &args.file, &args.root)?;
            println!(
                "{}: modification time {} -> {}",
                fix.path.display(),
                fix.previous,
                fix.restored
            );
            Ok(ExitCode::Success)
        }
        Commands::DeleteRecords(args) => {
            let store = open_store(&config.store_path)?;
            let summary = actions::delete_records_from_file(&store, &args.ids_file)?;
            println!("{summary}");
            Ok(ExitCode::Success)
        }
        Commands::ShowConfig => {
            print!("{}", config.to_toml()?);
            Ok(ExitCode::Success)
        }
    }
}

/// Verify every configured root and print the summary.
///
/// The health check is pinged only after a healthy run.
///
/// # Errors
///
/// Returns an error if a database cannot be opened, a fatal verification
/// error occurs, or the run was interrupted.
pub fn run_verify(config: &Config, args: &VerifyArgs, quiet: bool) -> Result<RunSummary> {
    let now = Utc::now();

    let cache = RecencyCache::open(&config.cache_path)
        .with_context(|| {
            format!("Failed to open recency cache at {}", config.cache_path.display())
        })?
        .with_filter(config.skip_filter())
        .with_policy(config.cache_policy());
    let evicted = cache.cleanup_at(now).context("Recency cache cleanup failed")?;
    log::info!("Removed {} expired rows from the recency cache", evicted);

    let store = open_store(&config.store_path)?;
    let expired = store
        .expire_older_than(now - config.baseline_ttl())
        .context("Baseline expiry failed")?;
    log::info!("Expired {} unmatched baselines", expired);

    let run_log = Arc::new(FileRunLog::open(&config.log_dir)?);
    log_roots(run_log.as_ref(), "Mutable", &config.mutable_paths);
    log_roots(run_log.as_ref(), "Immutable", &config.immutable_paths);

    let workers = args
        .workers
        .map(usize::from)
        .or(config.workers)
        .unwrap_or_else(default_workers);
    let handler = signal::install_handler()?;
    let orchestrator_config = OrchestratorConfig::default()
        .with_workers(workers)
        .with_preload(config.preload_mode())
        .with_shutdown_flag(handler.get_flag())
        .with_progress_callback(Arc::new(Progress::new(quiet)));

    let store: Arc<dyn BaselineStore> = Arc::new(store);
    let reconciler = Reconciler::new(store).with_policy(config.reconcile_policy());
    let orchestrator = VerificationOrchestrator::new(
        Arc::new(cache),
        Arc::new(reconciler),
        run_log.clone(),
        orchestrator_config,
    )?;

    for (roots, mutability) in [
        (&config.mutable_paths, Mutability::Mutable),
        (&config.immutable_paths, Mutability::Immutable),
    ] {
        for root in roots {
            orchestrator
                .process_files(root, mutability)
                .with_context(|| format!("Verification of {} aborted", root.display()))?;
        }
    }

    orchestrator.log_run_totals();
    let errors_logged = run_log.encountered_error();
    let summary = RunSummary {
        totals: orchestrator.run_totals(),
        errors_logged,
        healthy: orchestrator.no_failures() && !errors_logged,
    };
    print_summary(&summary, args.summary)?;

    if summary.healthy {
        report_health(config, args, run_log.as_ref());
    } else {
        log::warn!("Run was not clean, skipping the health check");
    }
    Ok(summary)
}

fn open_store(path: &Path) -> Result<SqliteBaselineStore> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    SqliteBaselineStore::open(path)
        .with_context(|| format!("Failed to open baseline store at {}", path.display()))
}

fn log_roots(run_log: &dyn RunLog, label: &str, roots: &[std::path::PathBuf]) {
    let joined = roots
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ");
    run_log.log(&format!("{label} paths: [{joined}]"));
}

fn print_summary(summary: &RunSummary, format: SummaryFormat) -> Result<()> {
    match format {
        SummaryFormat::Text => {
            println!("Totals:");
            for outcome in Outcome::ALL {
                println!("  {}: {} files", outcome, summary.totals.get(outcome));
            }
            if summary.errors_logged {
                println!("Errors were logged during the run, see the run log");
            }
        }
        SummaryFormat::Json => {
            let json = serde_json::to_string_pretty(summary)
                .context("Failed to serialize the run summary")?;
            println!("{json}");
        }
    }
    Ok(())
}

fn report_health(config: &Config, args: &VerifyArgs, run_log: &dyn RunLog) {
    if args.no_health_check {
        log::debug!("Health check disabled on the command line");
        return;
    }
    let Some(url) = config.health_check_url.as_deref() else {
        log::debug!("No health check URL configured");
        return;
    };

    // A dead monitoring endpoint does not make the verification unhealthy
    match HealthReporter::new(url).and_then(|reporter| reporter.ping()) {
        Ok(response) => run_log.log(&response.to_string()),
        Err(e) => log::warn!("Health check failed: {}", e),
    }
}
