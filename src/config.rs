//! Application configuration management.
//!
//! Configuration is layered with `figment`, lowest priority first:
//!
//! 1. Built-in defaults ([`Config::default`])
//! 2. A TOML file: the `--config` path, else `./rotcheck.toml`, else
//!    `config.toml` in the platform configuration directory
//! 3. Environment variables prefixed with `ROTCHECK_`
//!    (e.g. `ROTCHECK_WORKERS=8`, `ROTCHECK_MUTABLE_PATHS=[/srv/docs]`)
//!
//! CLI flags that overlap with a key (such as `--workers`) are applied by the
//! caller on top of the extracted value.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::cache::{CachePolicy, SkipFilter, DEFAULT_SKIP_PREFIXES, DEFAULT_SKIP_SUFFIXES};
use crate::scanner::PreloadMode;
use crate::store::reconcile::{DEFAULT_EXEMPT_SUFFIXES, DEFAULT_TOO_NEW_HOURS};
use crate::store::ReconcilePolicy;

/// Prefix of configuration environment variables.
pub const ENV_PREFIX: &str = "ROTCHECK_";

/// Name of the configuration file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "rotcheck.toml";

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Roots whose files are expected to change.
    pub mutable_paths: Vec<PathBuf>,
    /// Archival roots. Any change is a failure.
    pub immutable_paths: Vec<PathBuf>,
    /// Shared baseline database.
    pub store_path: PathBuf,
    /// Local recency cache database.
    pub cache_path: PathBuf,
    /// Directory of the durable run logs.
    pub log_dir: PathBuf,
    /// URL pinged after a clean run.
    pub health_check_url: Option<String>,
    /// Path segments starting with one of these are never verified.
    pub skip_prefixes: Vec<String>,
    /// Path segments ending with one of these are never verified.
    pub skip_suffixes: Vec<String>,
    /// Suffixes allowed to change on immutable roots.
    pub immutable_exempt_suffixes: Vec<String>,
    /// Days a verified, unchanged file is skipped.
    pub skip_window_days: i64,
    /// Days a recency row survives without a verification.
    pub retention_days: i64,
    /// Days a baseline survives without a match.
    pub baseline_ttl_days: i64,
    /// Hours a new immutable file waits before it is baselined.
    pub too_new_hours: i64,
    /// Verification workers. Defaults to the host parallelism.
    pub workers: Option<usize>,
    /// Read checksums on the enumeration thread instead of in the workers.
    pub preload_checksums: bool,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Self {
            mutable_paths: Vec::new(),
            immutable_paths: Vec::new(),
            store_path: data_dir.join("baselines.sqlite"),
            cache_path: data_dir.join(crate::cache::database::DEFAULT_FILE_NAME),
            log_dir: PathBuf::from("logs"),
            health_check_url: None,
            skip_prefixes: to_strings(DEFAULT_SKIP_PREFIXES),
            skip_suffixes: to_strings(DEFAULT_SKIP_SUFFIXES),
            immutable_exempt_suffixes: to_strings(DEFAULT_EXEMPT_SUFFIXES),
            skip_window_days: 90,
            retention_days: 365,
            baseline_ttl_days: crate::store::sqlite::DEFAULT_TTL_DAYS,
            too_new_hours: DEFAULT_TOO_NEW_HOURS,
            workers: None,
            preload_checksums: false,
        }
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| (*s).to_string()).collect()
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "rotcheck", "rotcheck")
}

fn default_data_dir() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

impl Config {
    /// Load the layered configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit `path` does not exist, a layer cannot
    /// be parsed, or a value is out of range.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => {
                if !path.is_file() {
                    bail!("Configuration file not found: {}", path.display());
                }
                Some(path.to_path_buf())
            }
            None => Self::discover(),
        };
        Self::figment(file.as_deref(), true)
            .extract::<Self>()
            .context("Invalid configuration")?
            .validated()
    }

    /// Build the figment for an optional TOML file.
    ///
    /// Environment variables are merged last when `with_env` is set.
    #[must_use]
    pub fn figment(file: Option<&Path>, with_env: bool) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(file) = file {
            log::debug!("Loading configuration from {}", file.display());
            figment = figment.merge(Toml::file(file));
        }
        if with_env {
            figment = figment.merge(Env::prefixed(ENV_PREFIX));
        }
        figment
    }

    /// The configuration file used when none is given explicitly.
    fn discover() -> Option<PathBuf> {
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.is_file() {
            return Some(local);
        }
        project_dirs()
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .filter(|p| p.is_file())
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid key.
    pub fn validated(self) -> Result<Self> {
        let now = chrono::Utc::now();
        let days = chrono::Duration::try_days;
        for (key, value, span) in [
            ("skip_window_days", self.skip_window_days, days(self.skip_window_days)),
            ("retention_days", self.retention_days, days(self.retention_days)),
            ("baseline_ttl_days", self.baseline_ttl_days, days(self.baseline_ttl_days)),
            (
                "too_new_hours",
                self.too_new_hours,
                chrono::Duration::try_hours(self.too_new_hours),
            ),
        ] {
            if value < 0 {
                bail!("{key} must not be negative (got {value})");
            }
            // Every span is subtracted from the current time during a run
            if span.and_then(|span| now.checked_sub_signed(span)).is_none() {
                bail!("{key} is out of range (got {value})");
            }
        }
        if self.workers == Some(0) {
            bail!("workers must be at least 1");
        }
        Ok(self)
    }

    /// Recency cache skip window and retention.
    #[must_use]
    pub fn cache_policy(&self) -> CachePolicy {
        CachePolicy {
            skip_window: chrono::Duration::days(self.skip_window_days),
            retention: chrono::Duration::days(self.retention_days),
        }
    }

    /// Static skip filters.
    #[must_use]
    pub fn skip_filter(&self) -> SkipFilter {
        SkipFilter::new(self.skip_prefixes.clone(), self.skip_suffixes.clone())
    }

    /// Reconciliation tunables.
    #[must_use]
    pub fn reconcile_policy(&self) -> ReconcilePolicy {
        ReconcilePolicy::default()
            .with_too_new(chrono::Duration::hours(self.too_new_hours))
            .with_exempt_suffixes(self.immutable_exempt_suffixes.clone())
    }

    /// Lifetime of an unmatched baseline.
    #[must_use]
    pub fn baseline_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(self.baseline_ttl_days)
    }

    /// What the orchestrator reads on the enumeration thread.
    #[must_use]
    pub fn preload_mode(&self) -> PreloadMode {
        if self.preload_checksums {
            PreloadMode::Full
        } else {
            PreloadMode::Metadata
        }
    }

    /// Render the configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if a value cannot be represented in TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to render configuration as TOML")
    }
}
