//! Verification orchestrator.
//!
//! # Overview
//!
//! [`VerificationOrchestrator::process_files`] verifies one root:
//!
//! 1. The calling thread walks the root sequentially, builds the identity of
//!    every regular file and preloads its metadata.
//! 2. Each file becomes one unit of work on a `rayon` pool: skip check,
//!    reconciliation, and on PASS only, the recency cache update.
//! 3. Outcomes come back over a channel. The pool scope is the join fence,
//!    so the histogram is built only after every unit has finished.
//!
//! A fatal error in any unit stops the walk; units still queued return
//! without doing any work and the first error is returned. Errors limited
//! to a single file (a path outside the root, a file deleted mid-run) are
//! written to the run log and the run continues.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};

use super::{Histogram, Mutability, Outcome, VerifyError};
use crate::cache::RecencyCache;
use crate::progress::ProgressCallback;
use crate::report::RunLog;
use crate::scanner::{FileIdentity, FileRecord, PreloadMode, Walker};
use crate::store::Reconciler;

/// Worker count used when the host parallelism cannot be determined.
pub const FALLBACK_WORKERS: usize = 4;

/// Configuration of the orchestrator.
#[derive(Clone)]
pub struct OrchestratorConfig {
    /// Number of verification workers.
    pub workers: usize,
    /// What to read on the enumeration thread.
    pub preload: PreloadMode,
    /// Optional shutdown flag for graceful termination.
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress callback.
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for OrchestratorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrchestratorConfig")
            .field("workers", &self.workers)
            .field("preload", &self.preload)
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            preload: PreloadMode::Metadata,
            shutdown_flag: None,
            progress_callback: None,
        }
    }
}

impl OrchestratorConfig {
    /// Set the worker count (at least one).
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Set the preload mode.
    #[must_use]
    pub fn with_preload(mut self, preload: PreloadMode) -> Self {
        self.preload = preload;
        self
    }

    /// Set the shutdown flag for graceful termination.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }
}

/// Parallelism of the host, or [`FALLBACK_WORKERS`].
#[must_use]
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(FALLBACK_WORKERS)
}

/// Walks roots and verifies their files on a worker pool.
pub struct VerificationOrchestrator {
    cache: Arc<RecencyCache>,
    reconciler: Arc<Reconciler>,
    run_log: Arc<dyn RunLog>,
    config: OrchestratorConfig,
    pool: rayon::ThreadPool,
    run_totals: Mutex<Histogram>,
}

impl std::fmt::Debug for VerificationOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerificationOrchestrator")
            .field("cache", &self.cache)
            .field("reconciler", &self.reconciler)
            .field("config", &self.config)
            .field("run_totals", &self.run_totals)
            .finish()
    }
}

impl VerificationOrchestrator {
    /// Create an orchestrator and its worker pool.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::Pool`] if the worker threads cannot be spawned.
    pub fn new(
        cache: Arc<RecencyCache>,
        reconciler: Arc<Reconciler>,
        run_log: Arc<dyn RunLog>,
        config: OrchestratorConfig,
    ) -> Result<Self, VerifyError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers.max(1))
            .thread_name(|i| format!("rotcheck-verify-{i}"))
            .build()?;
        log::debug!("Verification pool started with {} workers", pool.current_num_threads());

        Ok(Self {
            cache,
            reconciler,
            run_log,
            config,
            pool,
            run_totals: Mutex::new(Histogram::new()),
        })
    }

    /// Verify every regular file under `root`.
    ///
    /// Returns the histogram of this root and adds it to the run totals.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error of any unit of work, or
    /// [`VerifyError::Interrupted`] if a shutdown was requested. Nothing is
    /// added to the run totals in either case.
    pub fn process_files(&self, root: &Path, mutability: Mutability) -> Result<Histogram, VerifyError> {
        log::info!("Processing {} path {}", mutability, root.display());
        if let Some(ref callback) = self.config.progress_callback {
            callback.on_root_start(root, mutability);
        }

        let abort = AtomicBool::new(false);
        let first_error: Mutex<Option<VerifyError>> = Mutex::new(None);
        let (tx, rx) = mpsc::channel::<Outcome>();

        let fail_run = |err: VerifyError| {
            abort.store(true, Ordering::SeqCst);
            let mut slot = match first_error.lock() {
                Ok(slot) => slot,
                Err(poisoned) => poisoned.into_inner(),
            };
            if slot.is_none() {
                *slot = Some(err);
            } else {
                log::debug!("Additional fatal error after abort: {}", err);
            }
        };

        let mut walker = Walker::new(root);
        if let Some(ref flag) = self.config.shutdown_flag {
            walker = walker.with_shutdown_flag(Arc::clone(flag));
        }

        self.pool.in_place_scope(|scope| {
            for entry in walker.walk() {
                if abort.load(Ordering::SeqCst) {
                    log::debug!("Run aborted, stopping enumeration of {}", root.display());
                    break;
                }

                let path = match entry {
                    Ok(path) => path,
                    Err(e) => {
                        // Only a missing or unreadable root is reported by the walker
                        self.run_log.log_error(&e);
                        break;
                    }
                };

                let identity = match FileIdentity::new(&path, root) {
                    Ok(identity) => identity,
                    Err(e) => {
                        self.run_log.log_error(&e);
                        continue;
                    }
                };

                let record = match FileRecord::preload(identity, self.config.preload) {
                    Ok(record) => record,
                    Err(e) if e.is_not_found() => {
                        self.run_log.log_error(&e);
                        continue;
                    }
                    Err(e) => {
                        fail_run(e.into());
                        break;
                    }
                };

                let tx = tx.clone();
                let abort = &abort;
                let fail_run = &fail_run;
                scope.spawn(move |_| {
                    if abort.load(Ordering::SeqCst) {
                        return;
                    }
                    match self.verify_file(&record, mutability) {
                        Ok(outcome) => {
                            if let Some(ref callback) = self.config.progress_callback {
                                callback.on_file_done(outcome, record.absolute_path());
                            }
                            let _ = tx.send(outcome);
                        }
                        Err(e) if e.is_vanished_file() => self.run_log.log_error(&e),
                        Err(e) => fail_run(e),
                    }
                });
            }
        });
        drop(tx);

        let histogram: Histogram = rx.into_iter().collect();

        let first_error = match first_error.into_inner() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(err) = first_error {
            self.run_log.log_error(&err);
            return Err(err);
        }
        if self.config.is_shutdown_requested() {
            return Err(VerifyError::Interrupted);
        }

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_root_end(root, &histogram);
        }
        log::info!(
            "Finished {}: PASS={} FAIL={} SKIP={}",
            root.display(),
            histogram.get(Outcome::Pass),
            histogram.get(Outcome::Fail),
            histogram.get(Outcome::Skip)
        );

        self.totals_mut().merge(&histogram);
        Ok(histogram)
    }

    /// One unit of work: skip check, reconciliation, cache update on PASS.
    fn verify_file(&self, record: &FileRecord, mutability: Mutability) -> Result<Outcome, VerifyError> {
        if self.cache.should_skip(record)? {
            log::info!("Skipping file {}", record.absolute_path().display());
            return Ok(Outcome::Skip);
        }

        let verdict = self.reconciler.reconcile(record, mutability)?;
        match verdict.outcome {
            Outcome::Pass => {
                log::info!("{}", verdict);
                self.cache.record_verification(record)?;
            }
            Outcome::Fail => self.run_log.log(&verdict.to_string()),
            Outcome::Skip => log::info!("{}", verdict),
        }
        Ok(verdict.outcome)
    }

    fn totals_mut(&self) -> std::sync::MutexGuard<'_, Histogram> {
        match self.run_totals.lock() {
            Ok(totals) => totals,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Outcomes accumulated over every successfully processed root.
    #[must_use]
    pub fn run_totals(&self) -> Histogram {
        self.totals_mut().clone()
    }

    /// Whether no file failed so far.
    #[must_use]
    pub fn no_failures(&self) -> bool {
        self.totals_mut().get(Outcome::Fail) == 0
    }

    /// Write the run totals to the run log.
    pub fn log_run_totals(&self) {
        let totals = self.run_totals();
        self.run_log.log("--------------------------");
        self.run_log.log("Totals:");
        for outcome in Outcome::ALL {
            self.run_log
                .log(&format!("{}: {} files", outcome, totals.get(outcome)));
        }
    }
}
