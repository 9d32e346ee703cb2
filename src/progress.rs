//! Progress reporting utilities using indicatif.
//!
//! The orchestrator reports through the [`ProgressCallback`] trait. The
//! terminal implementation, [`Progress`], shows one spinner per root with
//! running PASS / FAIL / SKIP counters. The total number of files is not
//! known up front because enumeration and verification overlap.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::verify::{Histogram, Mutability, Outcome};

/// Progress callback for a verification run.
///
/// Implementations are shared by every worker, so they must be `Send + Sync`.
pub trait ProgressCallback: Send + Sync {
    /// Called before a root is enumerated.
    fn on_root_start(&self, root: &Path, mutability: Mutability);

    /// Called once per verified file, from the worker that verified it.
    fn on_file_done(&self, outcome: Outcome, path: &Path);

    /// Called after every file of a root has been verified.
    fn on_root_end(&self, root: &Path, histogram: &Histogram);
}

/// Terminal progress reporter.
pub struct Progress {
    bar: Mutex<Option<ProgressBar>>,
    pass: AtomicUsize,
    fail: AtomicUsize,
    skip: AtomicUsize,
    quiet: bool,
}

impl Progress {
    /// Create a new progress reporter.
    ///
    /// # Arguments
    ///
    /// * `quiet` - If true, nothing is displayed.
    ///
    /// # Examples
    ///
    /// ```
    /// use rotcheck::progress::Progress;
    ///
    /// let progress = Progress::new(true);
    /// ```
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            bar: Mutex::new(None),
            pass: AtomicUsize::new(0),
            fail: AtomicUsize::new(0),
            skip: AtomicUsize::new(0),
            quiet,
        }
    }

    fn style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} {prefix} [{elapsed_precise}] {pos} files {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
    }

    fn counters(&self) -> String {
        format!(
            "PASS={} FAIL={} SKIP={}",
            self.pass.load(Ordering::Relaxed),
            self.fail.load(Ordering::Relaxed),
            self.skip.load(Ordering::Relaxed)
        )
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        let guard = match self.bar.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(ref pb) = *guard {
            f(pb);
        }
    }
}

impl ProgressCallback for Progress {
    fn on_root_start(&self, root: &Path, mutability: Mutability) {
        if self.quiet {
            return;
        }

        self.pass.store(0, Ordering::Relaxed);
        self.fail.store(0, Ordering::Relaxed);
        self.skip.store(0, Ordering::Relaxed);

        let pb = ProgressBar::new_spinner();
        pb.set_style(Self::style());
        pb.set_prefix(format!("{} {}", mutability, truncate_path(&root.to_string_lossy(), 40)));
        pb.enable_steady_tick(Duration::from_millis(100));

        let mut bar = match self.bar.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *bar = Some(pb);
    }

    fn on_file_done(&self, outcome: Outcome, _path: &Path) {
        if self.quiet {
            return;
        }

        let counter = match outcome {
            Outcome::Pass => &self.pass,
            Outcome::Fail => &self.fail,
            Outcome::Skip => &self.skip,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        let message = self.counters();
        self.with_bar(|pb| {
            pb.inc(1);
            pb.set_message(message);
        });
    }

    fn on_root_end(&self, _root: &Path, histogram: &Histogram) {
        if self.quiet {
            return;
        }

        let taken = match self.bar.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(pb) = taken {
            pb.finish_with_message(format!(
                "PASS={} FAIL={} SKIP={}",
                histogram.get(Outcome::Pass),
                histogram.get(Outcome::Fail),
                histogram.get(Outcome::Skip)
            ));
        }
    }
}

/// Truncate a path for display in the progress bar.
fn truncate_path(path: &str, max_len: usize) -> String {
    if path.chars().count() <= max_len {
        return path.to_string();
    }

    let file_name = Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let name_len = file_name.chars().count();
    if name_len + 4 > max_len {
        let tail: String = file_name
            .chars()
            .skip(name_len.saturating_sub(max_len.saturating_sub(3)))
            .collect();
        return format!("...{}", tail);
    }

    format!(".../{}", file_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_path() {
        assert_eq!(truncate_path("/srv/a", 40), "/srv/a");
    }

    #[test]
    fn test_truncate_long_path() {
        let path = "/srv/archive/photos/2019/holiday/very/deep/tree/root";
        assert_eq!(truncate_path(path, 20), ".../root");
    }

    #[test]
    fn test_truncate_long_file_name() {
        let truncated = truncate_path("/srv/aaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", 10);
        assert_eq!(truncated.chars().count(), 10);
        assert!(truncated.starts_with("..."));
    }

    #[test]
    fn test_quiet_progress_ignores_events() {
        let progress = Progress::new(true);
        progress.on_root_start(Path::new("/srv"), Mutability::Mutable);
        progress.on_file_done(Outcome::Pass, Path::new("/srv/a"));
        progress.on_root_end(Path::new("/srv"), &Histogram::new());
        assert_eq!(progress.pass.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_counters_track_outcomes() {
        let progress = Progress::new(false);
        progress.on_file_done(Outcome::Pass, Path::new("/srv/a"));
        progress.on_file_done(Outcome::Fail, Path::new("/srv/b"));
        progress.on_file_done(Outcome::Pass, Path::new("/srv/c"));
        assert_eq!(progress.counters(), "PASS=2 FAIL=1 SKIP=0");
    }
}
