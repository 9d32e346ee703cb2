use chrono::Duration;
use rotcheck::cache::RecencyCache;
use rotcheck::report::MemoryRunLog;
use rotcheck::scanner::FileIdentity;
use rotcheck::store::{BaselineRecord, BaselineStore, ReconcilePolicy, Reconciler, SqliteBaselineStore};
use rotcheck::verify::{OrchestratorConfig, VerificationOrchestrator};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// Databases on disk, shared by every orchestrator built from it.
pub struct Harness {
    pub dir: TempDir,
    pub cache: Arc<RecencyCache>,
    pub store: Arc<SqliteBaselineStore>,
    pub run_log: Arc<MemoryRunLog>,
}

impl Harness {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let cache = Arc::new(RecencyCache::open(&dir.path().join("cache.sqlite")).unwrap());
        let store = Arc::new(SqliteBaselineStore::open(&dir.path().join("store.sqlite")).unwrap());
        Self {
            dir,
            cache,
            store,
            run_log: Arc::new(MemoryRunLog::new()),
        }
    }

    pub fn orchestrator(&self, policy: ReconcilePolicy) -> VerificationOrchestrator {
        let reconciler = Reconciler::new(self.store.clone()).with_policy(policy);
        VerificationOrchestrator::new(
            self.cache.clone(),
            Arc::new(reconciler),
            self.run_log.clone(),
            OrchestratorConfig::default().with_workers(4),
        )
        .unwrap()
    }

    pub fn baselines(&self, path: &Path, root: &Path) -> Vec<BaselineRecord> {
        self.store.records_for(&file_id(path, root)).unwrap()
    }
}

/// Policy without the too-new guard, as if every file had been created long ago.
pub fn aged() -> ReconcilePolicy {
    ReconcilePolicy::default().with_too_new(Duration::zero())
}

pub fn file_id(path: &Path, root: &Path) -> String {
    FileIdentity::new(path, root).unwrap().file_id().to_string()
}

pub fn set_mtime(path: &Path, seconds: i64) {
    filetime::set_file_mtime(path, filetime::FileTime::from_unix_time(seconds, 0)).unwrap();
}
