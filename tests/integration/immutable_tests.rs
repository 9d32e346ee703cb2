use super::common::{aged, set_mtime, Harness};
use rotcheck::report::RunLog;
use rotcheck::store::{BaselineStore, ReconcilePolicy};
use rotcheck::verify::{Mutability, Outcome};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_immutable_file_lifecycle() {
    let root = TempDir::new().unwrap();
    let path = root.path().join("archive.zip");
    fs::write(&path, "abc").unwrap();
    let h = Harness::new();

    // Freshly created: no baseline yet
    let fresh = h
        .orchestrator(ReconcilePolicy::default())
        .process_files(root.path(), Mutability::Immutable)
        .unwrap();
    assert_eq!(fresh.get(Outcome::Skip), 1);
    assert_eq!(h.store.count().unwrap(), 0);

    // Old enough: exactly one baseline
    let orchestrator = h.orchestrator(aged());
    let first = orchestrator
        .process_files(root.path(), Mutability::Immutable)
        .unwrap();
    assert_eq!(first.get(Outcome::Pass), 1);
    assert_eq!(h.store.count().unwrap(), 1);

    // Within the skip window: no store access at all
    let before = h.baselines(&path, root.path());
    let second = orchestrator
        .process_files(root.path(), Mutability::Immutable)
        .unwrap();
    assert_eq!(second.get(Outcome::Skip), 1);
    assert_eq!(h.baselines(&path, root.path()), before);

    // Contents and mtime change: FAIL, store untouched
    fs::write(&path, "xyz!").unwrap();
    set_mtime(&path, 1_700_000_000);
    let third = orchestrator
        .process_files(root.path(), Mutability::Immutable)
        .unwrap();
    assert_eq!(third.get(Outcome::Fail), 1);
    assert_eq!(h.baselines(&path, root.path()), before);
    assert!(!orchestrator.no_failures());
    assert!(h
        .run_log
        .lines()
        .iter()
        .any(|l| l.starts_with("FAIL: Immutable file was modified")));

    // File gone: nothing processed, nothing written
    fs::remove_file(&path).unwrap();
    let fourth = orchestrator
        .process_files(root.path(), Mutability::Immutable)
        .unwrap();
    assert!(fourth.is_empty());
    assert_eq!(h.baselines(&path, root.path()), before);
    assert!(!h.run_log.encountered_error());
}

#[test]
fn test_exempt_suffix_gets_new_baseline() {
    let root = TempDir::new().unwrap();
    let path = root.path().join("archive.vol00+01.par2");
    fs::write(&path, "parity").unwrap();
    let h = Harness::new();
    let orchestrator = h.orchestrator(aged());

    orchestrator
        .process_files(root.path(), Mutability::Immutable)
        .unwrap();
    fs::write(&path, "parity, rebuilt").unwrap();
    set_mtime(&path, 1_700_000_000);

    let histogram = orchestrator
        .process_files(root.path(), Mutability::Immutable)
        .unwrap();
    assert_eq!(histogram.get(Outcome::Pass), 1);
    assert_eq!(h.baselines(&path, root.path()).len(), 2);
    assert!(orchestrator.no_failures());
}

#[test]
fn test_same_mtime_bit_flip_is_detected() {
    let root = TempDir::new().unwrap();
    let path = root.path().join("photo.raw");
    fs::write(&path, "abc").unwrap();
    set_mtime(&path, 1_600_000_000);
    let h = Harness::new();
    let orchestrator = h.orchestrator(aged());

    orchestrator
        .process_files(root.path(), Mutability::Immutable)
        .unwrap();

    // Silent corruption keeps size and mtime
    fs::write(&path, "abd").unwrap();
    set_mtime(&path, 1_600_000_000);
    h.cache.remove(&path).unwrap();

    let histogram = orchestrator
        .process_files(root.path(), Mutability::Immutable)
        .unwrap();
    assert_eq!(histogram.get(Outcome::Fail), 1);
    assert!(h
        .run_log
        .lines()
        .iter()
        .any(|l| l.contains("File CRC mismatch")));
    assert!(h.cache.get(&path).unwrap().is_none());
}
