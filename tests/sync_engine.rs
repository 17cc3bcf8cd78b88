use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use presetsync_lib::core::{
    PathMapper, SyncEngine, SyncOperation, SyncProgress, SyncWorker, TreeEntry,
};
use presetsync_lib::storage::{Listing, MemoryStore, ObjectInfo, ObjectStore};
use presetsync_lib::{Result, SyncError};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;
use tempfile::TempDir;
use tokio::sync::mpsc;

#[derive(Clone, Copy)]
enum Fail {
    Transfer,
    Auth,
}

/// 在指定键上注入失败的存储
struct FaultyStore {
    inner: Arc<MemoryStore>,
    fail_put: Mutex<HashMap<String, Fail>>,
    fail_listing: bool,
}

impl FaultyStore {
    fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            fail_put: Mutex::new(HashMap::new()),
            fail_listing: false,
        }
    }

    fn fail_put(self, key: &str, fail: Fail) -> Self {
        self.fail_put.lock().unwrap().insert(key.to_string(), fail);
        self
    }
}

#[async_trait]
impl ObjectStore for FaultyStore {
    async fn list_level(&self, prefix: &str) -> Result<Listing> {
        if self.fail_listing {
            return Err(SyncError::AuthFailure("InvalidAccessKeyId".into()));
        }
        self.inner.list_level(prefix).await
    }

    async fn list_recursive(&self, prefix: &str) -> Result<Vec<ObjectInfo>> {
        self.inner.list_recursive(prefix).await
    }

    async fn head(&self, key: &str) -> Result<Option<ObjectInfo>> {
        self.inner.head(key).await
    }

    async fn get_to_file(&self, key: &str, local_path: &Path) -> Result<()> {
        self.inner.get_to_file(key, local_path).await
    }

    async fn put_from_file(&self, local_path: &Path, key: &str) -> Result<()> {
        let fail = self.fail_put.lock().unwrap().get(key).copied();
        match fail {
            Some(Fail::Transfer) => Err(SyncError::Store("connection reset".into())),
            Some(Fail::Auth) => Err(SyncError::AuthFailure("ExpiredToken".into())),
            None => self.inner.put_from_file(local_path, key).await,
        }
    }

    fn name(&self) -> &str {
        "faulty"
    }
}

fn write_file(root: &Path, relative: &str, content: &str, age_secs: i64) -> PathBuf {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, content).unwrap();
    let mtime = Utc::now() - Duration::seconds(age_secs);
    std::fs::File::options()
        .write(true)
        .open(&path)
        .unwrap()
        .set_modified(SystemTime::from(mtime))
        .unwrap();
    path
}

fn mtime(path: &Path) -> DateTime<Utc> {
    std::fs::metadata(path).unwrap().modified().unwrap().into()
}

fn engine(
    store: Arc<dyn ObjectStore>,
    local_root: &Path,
    remote_root: &str,
    home: &Path,
) -> SyncEngine {
    SyncEngine::new(
        store,
        PathMapper::new(local_root.to_path_buf(), remote_root),
        home.to_path_buf(),
    )
}

/// 本地根下放三个一分钟前修改的文件
fn local_tree() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "a.fxp", "a", 60);
    write_file(dir.path(), "Synths/b.fxp", "b", 60);
    write_file(dir.path(), "Synths/Pads/c.fxp", "c", 60);
    dir
}

async fn collect(mut rx: mpsc::Receiver<SyncProgress>) -> Vec<SyncProgress> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_push_root_twice_transfers_nothing_second_time() {
    let local = local_tree();
    let store = Arc::new(MemoryStore::new());
    let engine = engine(store.clone(), local.path(), "presets", local.path());

    let first = engine.push_root(None).await.unwrap();
    assert_eq!(first.total, 3);
    assert_eq!(first.transferred, 3);
    assert_eq!(
        store.keys(),
        vec!["presets/Synths/Pads/c.fxp", "presets/Synths/b.fxp", "presets/a.fxp"]
    );

    let second = engine.push_root(None).await.unwrap();
    assert_eq!(second.transferred, 0);
    assert_eq!(second.skipped, 3);
}

#[tokio::test]
async fn test_pull_root_twice_transfers_nothing_second_time() {
    let local = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());
    let past = Utc::now() - Duration::minutes(5);
    store.insert("presets/a.fxp", "a", past);
    store.insert("presets/Synths/b.fxp", "b", past);

    let engine = engine(store, local.path(), "presets", local.path());

    let first = engine.pull_root(None).await.unwrap();
    assert_eq!(first.transferred, 2);
    assert_eq!(std::fs::read_to_string(local.path().join("Synths/b.fxp")).unwrap(), "b");

    let second = engine.pull_root(None).await.unwrap();
    assert_eq!(second.transferred, 0);
    assert_eq!(second.skipped, 2);
}

#[tokio::test]
async fn test_equal_timestamps_push_skips_pull_transfers() {
    let local = tempfile::tempdir().unwrap();
    let path = write_file(local.path(), "Lead.fxp", "local", 120);
    let t = mtime(&path);

    let store = Arc::new(MemoryStore::new());
    store.insert("presets/Lead.fxp", "remote", t);
    let engine = engine(store.clone(), local.path(), "presets", local.path());

    let push = engine.push_root(None).await.unwrap();
    assert_eq!(push.transferred, 0);
    assert_eq!(store.get("presets/Lead.fxp").unwrap(), b"remote");

    let pull = engine.pull_root(None).await.unwrap();
    assert_eq!(pull.transferred, 1);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "remote");
}

#[tokio::test]
async fn test_newer_remote_is_not_overwritten_by_push() {
    let local = tempfile::tempdir().unwrap();
    write_file(local.path(), "Lead.fxp", "old", 3600);

    let store = Arc::new(MemoryStore::new());
    store.insert("presets/Lead.fxp", "new", Utc::now());
    let engine = engine(store.clone(), local.path(), "presets", local.path());

    let report = engine.push_root(None).await.unwrap();
    assert_eq!(report.skipped, 1);
    assert_eq!(store.get("presets/Lead.fxp").unwrap(), b"new");
}

#[tokio::test]
async fn test_push_subtree_then_pull_into_empty_dir_round_trips() {
    let source = tempfile::tempdir().unwrap();
    write_file(source.path(), "Presets/a.fxp", "alpha", 30);
    write_file(source.path(), "Presets/Synths/b.fxp", "beta", 30);
    write_file(source.path(), "Presets/Synths/Pads/c.fxp", "gamma", 30);

    let store = Arc::new(MemoryStore::new());
    let pusher = engine(store.clone(), source.path(), "", source.path());
    let pushed = pusher.push_item("Presets", None).await.unwrap();
    assert_eq!(pushed.transferred, 3);

    let target = tempfile::tempdir().unwrap();
    let puller = engine(store, target.path(), "", target.path());
    let pulled = puller
        .pull_item(TreeEntry::Folder { name: "Presets".into() }, None)
        .await
        .unwrap();
    assert_eq!(pulled.transferred, 3);

    for (relative, content) in [
        ("Presets/a.fxp", "alpha"),
        ("Presets/Synths/b.fxp", "beta"),
        ("Presets/Synths/Pads/c.fxp", "gamma"),
    ] {
        assert_eq!(
            std::fs::read_to_string(target.path().join(relative)).unwrap(),
            content,
            "{}",
            relative
        );
    }
}

#[tokio::test]
async fn test_push_item_maps_relative_to_current_remote_prefix() {
    let home = tempfile::tempdir().unwrap();
    write_file(home.path(), "Lead.fxp", "lead", 30);

    let store = Arc::new(MemoryStore::new());
    store.insert("plugins/Serum/old.fxp", "x", Utc::now());
    let engine = engine(store.clone(), Path::new("/unused"), "unused", home.path());

    engine.descend_remote("plugins").await;
    engine.descend_remote("Serum").await;
    let report = engine.push_item("Lead.fxp", None).await.unwrap();

    assert_eq!(report.transferred, 1);
    assert_eq!(store.get("plugins/Serum/Lead.fxp").unwrap(), b"lead");
}

#[tokio::test]
async fn test_pull_item_single_file_into_current_local_dir() {
    let home = tempfile::tempdir().unwrap();
    std::fs::create_dir(home.path().join("Downloads")).unwrap();

    let store = Arc::new(MemoryStore::new());
    store.insert("plugins/Serum/Lead.fxp", "lead", Utc::now() - Duration::minutes(1));
    let engine = engine(store, Path::new("/unused"), "unused", home.path());

    engine.descend_remote("plugins").await;
    let entries = engine.descend_remote("Serum").await;
    let file = entries.iter().find(|e| e.is_file()).cloned().unwrap();
    engine.descend_local("Downloads").await.unwrap();

    let report = engine.pull_item(file, None).await.unwrap();

    assert_eq!(report.transferred, 1);
    assert_eq!(
        std::fs::read_to_string(home.path().join("Downloads/Lead.fxp")).unwrap(),
        "lead"
    );
}

#[tokio::test]
async fn test_subtree_with_dir_marker_yields_one_candidate() {
    let local = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());
    let now = Utc::now();
    store.insert("presets/Synths/", "", now);
    store.insert("presets/Synths/b.fxp", "b", now);

    let engine = engine(store, local.path(), "presets", local.path());
    let report = engine.pull_root(None).await.unwrap();

    assert_eq!(report.total, 1);
    assert_eq!(report.transferred, 1);
    assert!(local.path().join("Synths/b.fxp").is_file());
}

#[tokio::test]
async fn test_recurring_root_name_maps_by_prefix() {
    let local = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());
    store.insert("presets/archive/presets/a.fxp", "a", Utc::now());
    store.insert("presetsx/ignored.fxp", "x", Utc::now());

    let engine = engine(store, local.path(), "presets", local.path());
    let report = engine.pull_root(None).await.unwrap();

    assert_eq!(report.total, 1);
    assert!(local.path().join("archive/presets/a.fxp").is_file());
}

#[tokio::test]
async fn test_single_transfer_failure_does_not_abort_batch() {
    let local = tempfile::tempdir().unwrap();
    write_file(local.path(), "1.fxp", "1", 60);
    write_file(local.path(), "2.fxp", "2", 60);
    write_file(local.path(), "3.fxp", "3", 60);

    let memory = Arc::new(MemoryStore::new());
    let store = FaultyStore::new(memory.clone()).fail_put("presets/2.fxp", Fail::Transfer);
    let engine = engine(Arc::new(store), local.path(), "presets", local.path());

    let report = engine.push_root(None).await.unwrap();

    assert_eq!(report.total, 3);
    assert_eq!(report.transferred, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].contains("presets/2.fxp"));
    assert_eq!(memory.keys(), vec!["presets/1.fxp", "presets/3.fxp"]);
}

#[tokio::test]
async fn test_auth_failure_aborts_remaining_queue() {
    let local = tempfile::tempdir().unwrap();
    write_file(local.path(), "1.fxp", "1", 60);
    write_file(local.path(), "2.fxp", "2", 60);
    write_file(local.path(), "3.fxp", "3", 60);

    let memory = Arc::new(MemoryStore::new());
    let store = FaultyStore::new(memory.clone()).fail_put("presets/2.fxp", Fail::Auth);
    let engine = engine(Arc::new(store), local.path(), "presets", local.path());
    engine.descend_remote("presets").await;

    let err = engine.push_root(None).await.unwrap_err();

    assert!(matches!(err, SyncError::AuthFailure(_)));
    assert_eq!(memory.keys(), vec!["presets/1.fxp"]);
    assert_eq!(engine.remote_prefix().await, "presets/");
    assert_eq!(engine.state(), presetsync_lib::core::EngineState::Idle);
}

#[tokio::test]
async fn test_progress_is_monotonic_and_ends_at_100() {
    let local = local_tree();
    write_file(local.path(), "Synths/d.fxp", "d", 60);
    let store = Arc::new(MemoryStore::new());
    let engine = engine(store, local.path(), "presets", local.path());

    let (tx, rx) = mpsc::channel(64);
    let report = engine.push_root(Some(tx)).await.unwrap();
    let events = collect(rx).await;

    let percents: Vec<f64> = events
        .iter()
        .filter_map(|e| match e {
            SyncProgress::Progress { percent, total, .. } => {
                assert_eq!(*total, 4);
                Some(*percent)
            }
            _ => None,
        })
        .collect();

    assert_eq!(report.total, 4);
    assert_eq!(percents.len(), 4);
    assert!(percents.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(*percents.last().unwrap(), 100.0);
}

#[tokio::test]
async fn test_empty_batch_reports_100() {
    let local = tempfile::tempdir().unwrap();
    let engine = engine(Arc::new(MemoryStore::new()), local.path(), "presets", local.path());

    let (tx, rx) = mpsc::channel(8);
    let report = engine.pull_root(Some(tx)).await.unwrap();
    let events = collect(rx).await;

    assert_eq!(report.total, 0);
    assert!(matches!(
        events.as_slice(),
        [SyncProgress::Progress { percent, .. }] if *percent == 100.0
    ));
}

#[tokio::test]
async fn test_second_operation_rejected_while_running() {
    let local = local_tree();
    let engine = engine(Arc::new(MemoryStore::new()), local.path(), "presets", local.path());

    let guard = engine.begin(&SyncOperation::PullRoot).unwrap();
    let err = engine.push_root(None).await.unwrap_err();
    assert!(matches!(err, SyncError::Busy));

    drop(guard);
    assert!(engine.push_root(None).await.is_ok());
}

#[tokio::test]
async fn test_worker_rejects_concurrent_submit_and_reports_completion() {
    let local = local_tree();
    let engine = Arc::new(engine(
        Arc::new(MemoryStore::new()),
        local.path(),
        "presets",
        local.path(),
    ));
    let worker = SyncWorker::new(engine.clone());

    let (tx, rx) = mpsc::channel(64);
    let handle = worker.submit(SyncOperation::PushRoot, tx).unwrap();

    let (tx2, _rx2) = mpsc::channel(64);
    assert!(matches!(
        worker.submit(SyncOperation::PullRoot, tx2),
        Err(SyncError::Busy)
    ));

    handle.await.unwrap();
    let events = collect(rx).await;
    match events.last() {
        Some(SyncProgress::Completed(report)) => assert_eq!(report.transferred, 3),
        other => panic!("unexpected terminal event: {:?}", other),
    }
    assert_eq!(engine.state(), presetsync_lib::core::EngineState::Idle);
}

#[tokio::test]
async fn test_listing_failure_degrades_to_notice() {
    let home = tempfile::tempdir().unwrap();
    let mut store = FaultyStore::new(Arc::new(MemoryStore::new()));
    store.fail_listing = true;
    let engine = engine(Arc::new(store), home.path(), "presets", home.path());

    let entries = engine.remote_entries().await;

    assert_eq!(entries.len(), 1);
    assert!(matches!(entries[0], TreeEntry::Notice { .. }));
}

#[tokio::test]
async fn test_remote_navigation_shows_parent_link_below_root() {
    let home = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());
    store.insert("presets/Synths/a.fxp", "a", Utc::now());
    let engine = engine(store, home.path(), "presets", home.path());

    let root = engine.remote_entries().await;
    assert_eq!(root, vec![TreeEntry::Folder { name: "presets".into() }]);

    let level = engine.descend_remote("presets").await;
    assert_eq!(
        level,
        vec![
            TreeEntry::ParentLink {
                location: "/presets/".into()
            },
            TreeEntry::Folder {
                name: "Synths".into()
            },
        ]
    );

    let back = engine.ascend_remote().await;
    assert_eq!(back, root);
}

#[tokio::test]
async fn test_local_navigation_stays_under_home() {
    let home = local_tree();
    let engine = engine(Arc::new(MemoryStore::new()), home.path(), "presets", home.path());

    let top = engine.local_entries().await.unwrap();
    assert!(!top.iter().any(|e| matches!(e, TreeEntry::ParentLink { .. })));

    let synths = engine.descend_local("Synths").await.unwrap();
    assert!(matches!(synths[0], TreeEntry::ParentLink { .. }));

    engine.ascend_local().await.unwrap();
    engine.ascend_local().await.unwrap();
    assert_eq!(engine.local_dir().await, home.path());

    assert!(matches!(
        engine.descend_local("a.fxp").await,
        Err(SyncError::InvalidSelection(_))
    ));
}

#[tokio::test]
async fn test_descend_local_rejects_paths_leaving_home() {
    let root = tempfile::tempdir().unwrap();
    let home = root.path().join("home");
    std::fs::create_dir_all(home.join("Presets")).unwrap();
    std::fs::create_dir(root.path().join("outside")).unwrap();
    let engine = engine(Arc::new(MemoryStore::new()), &home, "presets", &home);

    for name in ["../outside", "Presets/../../outside", ".."] {
        assert!(
            matches!(
                engine.descend_local(name).await,
                Err(SyncError::InvalidSelection(_))
            ),
            "{}",
            name
        );
        assert_eq!(engine.local_dir().await, home);
    }

    engine.descend_local("Presets").await.unwrap();
    engine.ascend_local().await.unwrap();
    engine.ascend_local().await.unwrap();
    assert_eq!(engine.local_dir().await, home);
}

#[tokio::test]
async fn test_pull_item_rejects_parent_link() {
    let home = tempfile::tempdir().unwrap();
    let engine = engine(Arc::new(MemoryStore::new()), home.path(), "presets", home.path());

    let err = engine
        .pull_item(TreeEntry::ParentLink { location: "/".into() }, None)
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::InvalidSelection(_)));
    assert_eq!(engine.state(), presetsync_lib::core::EngineState::Idle);
}
