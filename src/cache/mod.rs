//! Recency cache for rotcheck.
//!
//! This module decides, without contacting the baseline store, whether a
//! file can be skipped this run, and remembers every successful verification.
//!
//! # Architecture
//!
//! The caching system is split into three components:
//!
//! * [`filters`]: Static skip-prefix / skip-suffix rules on path segments.
//! * [`database`]: SQLite-based persistence, schema management and the skip decision.
//! * [`entry`]: The row model stored per absolute path.
//!
//! # Skip Decision
//!
//! A file is skipped when a path filter matches, or when its row exists, the
//! stored modification time (whole seconds) equals the current one and the
//! last verification is inside the skip window. A changed modification time
//! always forces a re-check, however recently the file was verified.
//!
//! Rows are only ever written after a PASS, so a failing file keeps being
//! reported on every run.

pub mod database;
pub mod entry;
pub mod filters;

pub use database::{CacheError, CachePolicy, CacheResult, RecencyCache};
pub use entry::RecencyEntry;
pub use filters::{SkipFilter, DEFAULT_SKIP_PREFIXES, DEFAULT_SKIP_SUFFIXES};
