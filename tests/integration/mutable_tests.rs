use super::common::{aged, set_mtime, Harness};
use chrono::{Duration, Utc};
use rotcheck::scanner::{FileIdentity, FileRecord, PreloadMode};
use rotcheck::store::{BaselineStore, Reconciler};
use rotcheck::verify::{Mutability, Outcome};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

#[test]
fn test_mutable_change_adds_baseline() {
    let root = TempDir::new().unwrap();
    let path = root.path().join("notes.md");
    fs::write(&path, "draft").unwrap();
    let h = Harness::new();
    let orchestrator = h.orchestrator(aged());

    let first = orchestrator
        .process_files(root.path(), Mutability::Mutable)
        .unwrap();
    assert_eq!(first.get(Outcome::Pass), 1);
    let original = h.baselines(&path, root.path());
    assert_eq!(original.len(), 1);

    let second = orchestrator
        .process_files(root.path(), Mutability::Mutable)
        .unwrap();
    assert_eq!(second.get(Outcome::Skip), 1);

    fs::write(&path, "final version").unwrap();
    set_mtime(&path, 1_700_000_000);
    let third = orchestrator
        .process_files(root.path(), Mutability::Mutable)
        .unwrap();
    assert_eq!(third.get(Outcome::Pass), 1);

    let baselines = h.baselines(&path, root.path());
    assert_eq!(baselines.len(), 2);
    // The old baseline is kept as it was
    assert!(baselines.contains(&original[0]));
    assert!(baselines.iter().any(|b| b.mtime_s == 1_700_000_000 && b.size == 13));

    let totals = orchestrator.run_totals();
    assert_eq!(totals.get(Outcome::Pass), 2);
    assert_eq!(totals.get(Outcome::Skip), 1);
    assert!(orchestrator.no_failures());
}

#[test]
fn test_pass_refreshes_last_accessed() {
    let root = TempDir::new().unwrap();
    let path = root.path().join("ledger.csv");
    fs::write(&path, "1,2,3").unwrap();
    let h = Harness::new();

    // Baseline recorded a month ago by another machine
    let record = FileRecord::preload(
        FileIdentity::new(&path, root.path()).unwrap(),
        PreloadMode::Metadata,
    )
    .unwrap();
    Reconciler::new(h.store.clone())
        .reconcile_at(&record, Mutability::Mutable, Utc::now() - Duration::days(30))
        .unwrap();
    let stale = h.baselines(&path, root.path())[0].last_accessed;
    assert!(Utc::now() - stale > Duration::days(29));

    let histogram = h
        .orchestrator(aged())
        .process_files(root.path(), Mutability::Mutable)
        .unwrap();
    assert_eq!(histogram.get(Outcome::Pass), 1);

    let baselines = h.baselines(&path, root.path());
    assert_eq!(baselines.len(), 1);
    assert!(Utc::now() - baselines[0].last_accessed < Duration::seconds(60));
    assert!(h.cache.get(&path).unwrap().is_some());
}

#[test]
fn test_roots_accumulate_into_run_totals() {
    let mutable = TempDir::new().unwrap();
    let immutable = TempDir::new().unwrap();
    fs::write(mutable.path().join("a.txt"), "abc").unwrap();
    fs::write(mutable.path().join("b.txt"), "def").unwrap();
    fs::write(immutable.path().join("c.txt"), "ghi").unwrap();
    let h = Harness::new();
    let orchestrator = h.orchestrator(aged());

    let a = orchestrator
        .process_files(mutable.path(), Mutability::Mutable)
        .unwrap();
    let b = orchestrator
        .process_files(immutable.path(), Mutability::Immutable)
        .unwrap();
    assert_eq!(a.total(), 2);
    assert_eq!(b.total(), 1);
    assert_eq!(orchestrator.run_totals().get(Outcome::Pass), 3);
    assert_eq!(h.store.count().unwrap(), 3);

    // Same baselines are reachable through a second handle on the store
    let other = Arc::new(
        rotcheck::store::SqliteBaselineStore::open(&h.dir.path().join("store.sqlite")).unwrap(),
    );
    assert_eq!(other.count().unwrap(), 3);
}
