use super::common::{aged, file_id, set_mtime, Harness};
use rotcheck::actions::{clear_cache, delete_records, fix_timestamp};
use rotcheck::scanner::{FileStat, ModifiedTime};
use rotcheck::store::BaselineStore;
use rotcheck::verify::{Mutability, Outcome};
use std::fs;
use std::io::Cursor;
use tempfile::TempDir;

#[test]
fn test_restore_after_copy_reset_mtime() {
    let root = TempDir::new().unwrap();
    let path = root.path().join("scan_0001.tiff");
    fs::write(&path, "pixels").unwrap();
    set_mtime(&path, 1_500_000_000);
    let h = Harness::new();
    let orchestrator = h.orchestrator(aged());

    let first = orchestrator
        .process_files(root.path(), Mutability::Immutable)
        .unwrap();
    assert_eq!(first.get(Outcome::Pass), 1);

    // A copy that did not preserve timestamps
    set_mtime(&path, 1_700_000_000);
    let copied = orchestrator
        .process_files(root.path(), Mutability::Immutable)
        .unwrap();
    assert_eq!(copied.get(Outcome::Fail), 1);

    let fix = fix_timestamp(h.store.as_ref(), &path, root.path()).unwrap();
    assert_eq!(fix.previous, ModifiedTime::new(1_700_000_000, 0));
    assert_eq!(fix.restored, ModifiedTime::new(1_500_000_000, 0));
    assert_eq!(FileStat::read(&path).unwrap().modified, fix.restored);

    // Force a real re-check instead of a recency skip
    assert!(clear_cache(&h.cache, &path).unwrap());
    let restored = orchestrator
        .process_files(root.path(), Mutability::Immutable)
        .unwrap();
    assert_eq!(restored.get(Outcome::Pass), 1);
    assert_eq!(h.store.count().unwrap(), 1);
}

#[test]
fn test_deleted_records_are_recreated() {
    let root = TempDir::new().unwrap();
    let a = root.path().join("a.txt");
    let b = root.path().join("b.txt");
    fs::write(&a, "abc").unwrap();
    fs::write(&b, "xyz").unwrap();
    let h = Harness::new();
    let orchestrator = h.orchestrator(aged());
    orchestrator
        .process_files(root.path(), Mutability::Immutable)
        .unwrap();
    assert_eq!(h.store.count().unwrap(), 2);

    let ids = format!("{}\n\nnot-a-real-id\n", file_id(&a, root.path()));
    let summary = delete_records(h.store.as_ref(), Cursor::new(ids)).unwrap();
    assert_eq!(summary.processed, 2);
    assert_eq!(summary.deleted, 1);
    assert_eq!(summary.not_found, 1);
    assert_eq!(h.store.count().unwrap(), 1);

    assert!(clear_cache(&h.cache, &a).unwrap());
    let histogram = orchestrator
        .process_files(root.path(), Mutability::Immutable)
        .unwrap();
    assert_eq!(histogram.get(Outcome::Pass), 1);
    assert_eq!(histogram.get(Outcome::Skip), 1);
    assert_eq!(h.store.count().unwrap(), 2);
}
