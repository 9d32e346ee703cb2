//! Run reporting: the durable run log and the health-check ping.
//!
//! Most progress goes to the `log` facade. Lines that must survive the run
//! (failed verifications, errors, the final totals) go through a [`RunLog`]
//! so they can be triaged later. The run log also remembers whether any
//! error was logged; a run with a logged error never reports healthy.

pub mod health;

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use chrono::Local;

pub use health::{HealthReporter, HealthResponse};

/// Name of the run log rewritten on every run.
pub const LATEST_FILE_NAME: &str = "latest.txt";

/// `chrono` format of the per-run log file name.
pub const DATED_FILE_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Errors from reporting.
#[derive(thiserror::Error, Debug)]
pub enum ReportError {
    /// A run log file could not be created.
    #[error("Failed to create run log {path}: {source}")]
    Io {
        /// Log file path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The health-check request failed.
    #[error("Health check to {url} failed: {source}")]
    Health {
        /// Health-check URL
        url: String,
        /// Underlying error
        #[source]
        source: reqwest::Error,
    },
}

/// Durable log of a single run.
pub trait RunLog: Send + Sync {
    /// Append a line.
    fn log(&self, message: &str);

    /// Append an error and remember that one occurred.
    fn log_error(&self, error: &dyn std::error::Error) {
        self.mark_error();
        self.log(&format!("ERROR: {}", error_chain(error)));
    }

    /// Remember that an error occurred without writing anything.
    fn mark_error(&self);

    /// Whether an error was logged during this run.
    fn encountered_error(&self) -> bool;
}

/// Render an error with its sources, outermost first.
fn error_chain(error: &dyn std::error::Error) -> String {
    let mut rendered = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}

struct LogFiles {
    latest: File,
    dated: File,
}

/// Run log writing `latest.txt` and a timestamped file side by side.
///
/// `latest.txt` is truncated when the log is opened. Every line is also
/// mirrored to the `log` facade.
pub struct FileRunLog {
    dir: PathBuf,
    dated_path: PathBuf,
    files: Mutex<LogFiles>,
    error: AtomicBool,
}

impl std::fmt::Debug for FileRunLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileRunLog")
            .field("dir", &self.dir)
            .field("dated_path", &self.dated_path)
            .field("error", &self.error)
            .finish()
    }
}

impl FileRunLog {
    /// Create `dir` if needed and open both log files.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Io`] if the directory or a file cannot be created.
    pub fn open(dir: &Path) -> Result<Self, ReportError> {
        fs::create_dir_all(dir).map_err(|source| ReportError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let latest_path = dir.join(LATEST_FILE_NAME);
        let latest = File::create(&latest_path).map_err(|source| ReportError::Io {
            path: latest_path,
            source,
        })?;

        let dated_path = dir.join(format!("{}.txt", Local::now().format(DATED_FILE_FORMAT)));
        let dated = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&dated_path)
            .map_err(|source| ReportError::Io {
                path: dated_path.clone(),
                source,
            })?;

        log::debug!("Run log: {}", dated_path.display());

        Ok(Self {
            dir: dir.to_path_buf(),
            dated_path,
            files: Mutex::new(LogFiles { latest, dated }),
            error: AtomicBool::new(false),
        })
    }

    /// Path of `latest.txt`.
    #[must_use]
    pub fn latest_path(&self) -> PathBuf {
        self.dir.join(LATEST_FILE_NAME)
    }

    /// Path of this run's timestamped file.
    #[must_use]
    pub fn dated_path(&self) -> &Path {
        &self.dated_path
    }
}

impl RunLog for FileRunLog {
    fn log(&self, message: &str) {
        log::info!("[run log] {}", message);

        let mut files = match self.files.lock() {
            Ok(files) => files,
            Err(poisoned) => poisoned.into_inner(),
        };
        let written = writeln!(files.latest, "{message}")
            .and_then(|()| writeln!(files.dated, "{message}"));
        if let Err(e) = written {
            // Losing a durable line must keep the run from reporting healthy
            self.error.store(true, Ordering::SeqCst);
            log::error!("Failed to write run log in {}: {}", self.dir.display(), e);
        }
    }

    fn mark_error(&self) {
        self.error.store(true, Ordering::SeqCst);
    }

    fn encountered_error(&self) -> bool {
        self.error.load(Ordering::SeqCst)
    }
}

/// Run log kept in memory. Useful for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryRunLog {
    lines: Mutex<Vec<String>>,
    error: AtomicBool,
}

impl MemoryRunLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines logged so far.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        match self.lines.lock() {
            Ok(lines) => lines.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl RunLog for MemoryRunLog {
    fn log(&self, message: &str) {
        log::debug!("[run log] {}", message);
        match self.lines.lock() {
            Ok(mut lines) => lines.push(message.to_string()),
            Err(poisoned) => poisoned.into_inner().push(message.to_string()),
        }
    }

    fn mark_error(&self) {
        self.error.store(true, Ordering::SeqCst);
    }

    fn encountered_error(&self) -> bool {
        self.error.load(Ordering::SeqCst)
    }
}
