use super::common::aged;
use rotcheck::cache::RecencyCache;
use rotcheck::report::MemoryRunLog;
use rotcheck::scanner::{FileIdentity, FileRecord, PreloadMode};
use rotcheck::store::{BaselineStore, Reconciler, SqliteBaselineStore};
use rotcheck::verify::{Mutability, OrchestratorConfig, Outcome, VerificationOrchestrator};
use std::fs;
use std::sync::{Arc, Barrier};
use tempfile::TempDir;

#[test]
fn test_racing_writers_create_one_baseline() {
    let root = TempDir::new().unwrap();
    let db = TempDir::new().unwrap();
    let path = root.path().join("new.bin");
    fs::write(&path, "fresh bytes").unwrap();
    let db_path = db.path().join("store.sqlite");

    // One connection per writer, like two machines sharing the store
    let stores: Vec<Arc<SqliteBaselineStore>> = (0..2)
        .map(|_| Arc::new(SqliteBaselineStore::open(&db_path).unwrap()))
        .collect();
    let barrier = Barrier::new(stores.len());

    let outcomes: Vec<Outcome> = std::thread::scope(|s| {
        let handles: Vec<_> = stores
            .iter()
            .map(|store| {
                let barrier = &barrier;
                let path = &path;
                let root = root.path();
                s.spawn(move || {
                    let record = FileRecord::preload(
                        FileIdentity::new(path, root).unwrap(),
                        PreloadMode::Full,
                    )
                    .unwrap();
                    let reconciler = Reconciler::new(store.clone()).with_policy(aged());
                    barrier.wait();
                    reconciler
                        .reconcile(&record, Mutability::Mutable)
                        .unwrap()
                        .outcome
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(outcomes, vec![Outcome::Pass, Outcome::Pass]);
    assert_eq!(stores[0].count().unwrap(), 1);
}

#[test]
fn test_parallel_runs_over_one_tree() {
    let root = TempDir::new().unwrap();
    for i in 0..40 {
        fs::write(root.path().join(format!("file_{i:02}.dat")), format!("payload {i}")).unwrap();
    }
    let db = TempDir::new().unwrap();
    let db_path = db.path().join("store.sqlite");
    SqliteBaselineStore::open(&db_path).unwrap();

    // Two hosts: own recency cache, shared baseline store
    let histograms = std::thread::scope(|s| {
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let db_path = &db_path;
                let root = root.path();
                s.spawn(move || {
                    let store = Arc::new(SqliteBaselineStore::open(db_path).unwrap());
                    let orchestrator = VerificationOrchestrator::new(
                        Arc::new(RecencyCache::open_in_memory().unwrap()),
                        Arc::new(Reconciler::new(store).with_policy(aged())),
                        Arc::new(MemoryRunLog::new()),
                        OrchestratorConfig::default().with_workers(8),
                    )
                    .unwrap();
                    orchestrator
                        .process_files(root, Mutability::Mutable)
                        .unwrap()
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .collect::<Vec<_>>()
    });

    for histogram in &histograms {
        assert_eq!(histogram.get(Outcome::Pass), 40);
    }
    let store = SqliteBaselineStore::open(&db_path).unwrap();
    assert_eq!(store.count().unwrap(), 40);
}
