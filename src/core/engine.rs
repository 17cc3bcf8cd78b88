use crate::core::comparator::{needs_transfer, remote_time_for_push, SyncDirection};
use crate::core::cursor::{is_child_name, LocalCursor, RemoteCursor};
use crate::core::entry::TreeEntry;
use crate::core::lister::RemoteLister;
use crate::core::path_mapper::{join_key, PathMapper};
use crate::core::scanner::{LocalFile, LocalScanner};
use crate::error::{Result, SyncError};
use crate::storage::{local, ObjectInfo, ObjectStore};
use chrono::{DateTime, Utc};
use scopeguard::ScopeGuard;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, error, info, warn};

/// 同步操作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOperation {
    /// 上传当前本地目录下的一个文件或子目录
    PushItem { name: String },
    /// 下载当前远程层级中的一个文件或文件夹
    PullItem { entry: TreeEntry },
    /// 配置的本地根 -> 远程根
    PushRoot,
    /// 配置的远程根 -> 本地根
    PullRoot,
}

impl SyncOperation {
    pub fn direction(&self) -> SyncDirection {
        match self {
            SyncOperation::PushItem { .. } | SyncOperation::PushRoot => SyncDirection::Push,
            SyncOperation::PullItem { .. } | SyncOperation::PullRoot => SyncDirection::Pull,
        }
    }

    pub fn label(&self) -> String {
        match self {
            SyncOperation::PushItem { name } => format!("push {}", name),
            SyncOperation::PullItem { entry } => format!("pull {}", entry.name()),
            SyncOperation::PushRoot => "push-root".to_string(),
            SyncOperation::PullRoot => "pull-root".to_string(),
        }
    }
}

/// 进度通知
#[derive(Debug, Clone)]
pub enum SyncProgress {
    Progress {
        /// 0-100，单调不减
        percent: f64,
        processed: usize,
        total: usize,
        current: String,
    },
    Completed(SyncReport),
    Failed(String),
}

/// 同步报告
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub operation: String,
    pub total: usize,
    pub transferred: usize,
    pub skipped: usize,
    pub failed: usize,
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

/// 一次同步中的候选文件对，只在单次操作内存在
#[derive(Debug, Clone)]
pub struct SyncCandidate {
    pub local_path: PathBuf,
    pub remote_key: String,
    pub local_modified: Option<DateTime<Utc>>,
    pub remote_modified: Option<DateTime<Utc>>,
}

impl SyncCandidate {
    fn from_local(file: LocalFile, remote_key: String) -> Self {
        Self {
            local_path: file.path,
            remote_key,
            local_modified: Some(file.modified),
            remote_modified: None,
        }
    }

    fn from_remote(object: ObjectInfo, local_path: PathBuf) -> Self {
        Self {
            local_path,
            remote_key: object.key,
            local_modified: None,
            remote_modified: object.last_modified,
        }
    }
}

/// 引擎运行状态：Idle -> Running -> Idle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Running(String),
}

/// 离开作用域时把引擎状态复位为 Idle
pub type RunGuard = ScopeGuard<Arc<Mutex<EngineState>>, fn(Arc<Mutex<EngineState>>)>;

fn reset_idle(state: Arc<Mutex<EngineState>>) {
    *state.lock().unwrap_or_else(|e| e.into_inner()) = EngineState::Idle;
}

/// 同步引擎，持有根目录对和自己的浏览位置
pub struct SyncEngine {
    store: Arc<dyn ObjectStore>,
    lister: RemoteLister,
    scanner: LocalScanner,
    roots: PathMapper,
    remote_cursor: RwLock<RemoteCursor>,
    local_cursor: RwLock<LocalCursor>,
    state: Arc<Mutex<EngineState>>,
}

impl SyncEngine {
    pub fn new(store: Arc<dyn ObjectStore>, roots: PathMapper, browse_home: PathBuf) -> Self {
        Self::with_scanner(store, roots, browse_home, LocalScanner::default())
    }

    pub fn with_scanner(
        store: Arc<dyn ObjectStore>,
        roots: PathMapper,
        browse_home: PathBuf,
        scanner: LocalScanner,
    ) -> Self {
        Self {
            lister: RemoteLister::new(store.clone()),
            store,
            scanner,
            roots,
            remote_cursor: RwLock::new(RemoteCursor::new()),
            local_cursor: RwLock::new(LocalCursor::new(browse_home)),
            state: Arc::new(Mutex::new(EngineState::Idle)),
        }
    }

    pub fn roots(&self) -> &PathMapper {
        &self.roots
    }

    pub fn store_name(&self) -> &str {
        self.store.name()
    }

    pub fn state(&self) -> EngineState {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    // ============ 浏览 ============

    /// 当前远程层级，非根时第一行为“返回上级”
    pub async fn remote_entries(&self) -> Vec<TreeEntry> {
        let cursor = self.remote_cursor.read().await.clone();
        let mut entries = Vec::new();
        if !cursor.is_at_root() {
            entries.push(TreeEntry::ParentLink {
                location: cursor.display(),
            });
        }
        entries.extend(self.lister.list_level(&cursor.prefix()).await);
        entries
    }

    /// 进入远程文件夹并重新列举新层级
    pub async fn descend_remote(&self, folder: &str) -> Vec<TreeEntry> {
        self.remote_cursor.write().await.descend(folder);
        self.remote_entries().await
    }

    pub async fn ascend_remote(&self) -> Vec<TreeEntry> {
        self.remote_cursor.write().await.ascend();
        self.remote_entries().await
    }

    pub async fn remote_prefix(&self) -> String {
        self.remote_cursor.read().await.prefix()
    }

    pub async fn local_dir(&self) -> PathBuf {
        self.local_cursor.read().await.current().to_path_buf()
    }

    /// 当前本地目录，非起始目录时第一行为“返回上级”
    pub async fn local_entries(&self) -> Result<Vec<TreeEntry>> {
        let cursor = self.local_cursor.read().await.clone();
        let mut entries = Vec::new();
        if !cursor.is_at_root() {
            entries.push(TreeEntry::ParentLink {
                location: cursor.current().display().to_string(),
            });
        }
        entries.extend(local::list_children(cursor.current()).await?);
        Ok(entries)
    }

    pub async fn descend_local(&self, dir: &str) -> Result<Vec<TreeEntry>> {
        if !is_child_name(dir.trim_matches('/')) {
            return Err(SyncError::InvalidSelection(format!("不是当前目录的子目录: {}", dir)));
        }
        {
            let mut cursor = self.local_cursor.write().await;
            let target = cursor.current().join(dir);
            if !tokio::fs::metadata(&target).await.map(|m| m.is_dir()).unwrap_or(false) {
                return Err(SyncError::InvalidSelection(format!("不是目录: {}", dir)));
            }
            cursor.descend(dir);
        }
        self.local_entries().await
    }

    pub async fn ascend_local(&self) -> Result<Vec<TreeEntry>> {
        self.local_cursor.write().await.ascend();
        self.local_entries().await
    }

    // ============ 同步 ============

    /// 进入 Running 状态，已有操作在运行时拒绝
    pub fn begin(&self, operation: &SyncOperation) -> Result<RunGuard> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let EngineState::Running(current) = &*state {
            warn!("拒绝 {}: {} 正在运行", operation.label(), current);
            return Err(SyncError::Busy);
        }
        *state = EngineState::Running(operation.label());
        drop(state);

        Ok(scopeguard::guard(
            self.state.clone(),
            reset_idle as fn(Arc<Mutex<EngineState>>),
        ))
    }

    /// 执行一个同步操作（单飞：同一时间只允许一个）
    pub async fn run(
        &self,
        operation: SyncOperation,
        progress_tx: Option<mpsc::Sender<SyncProgress>>,
    ) -> Result<SyncReport> {
        let _guard = self.begin(&operation)?;
        self.execute(operation, progress_tx).await
    }

    pub async fn push_item(
        &self,
        name: &str,
        progress_tx: Option<mpsc::Sender<SyncProgress>>,
    ) -> Result<SyncReport> {
        let name = name.to_string();
        self.run(SyncOperation::PushItem { name }, progress_tx).await
    }

    pub async fn pull_item(
        &self,
        entry: TreeEntry,
        progress_tx: Option<mpsc::Sender<SyncProgress>>,
    ) -> Result<SyncReport> {
        self.run(SyncOperation::PullItem { entry }, progress_tx).await
    }

    pub async fn push_root(
        &self,
        progress_tx: Option<mpsc::Sender<SyncProgress>>,
    ) -> Result<SyncReport> {
        self.run(SyncOperation::PushRoot, progress_tx).await
    }

    pub async fn pull_root(
        &self,
        progress_tx: Option<mpsc::Sender<SyncProgress>>,
    ) -> Result<SyncReport> {
        self.run(SyncOperation::PullRoot, progress_tx).await
    }

    /// 调用方须已持有 `begin` 返回的守卫
    pub(crate) async fn execute(
        &self,
        operation: SyncOperation,
        progress_tx: Option<mpsc::Sender<SyncProgress>>,
    ) -> Result<SyncReport> {
        let start = Instant::now();
        let direction = operation.direction();
        info!("开始同步: {} ({})", operation.label(), self.store.name());

        let candidates = match &operation {
            SyncOperation::PushItem { name } => self.plan_push_item(name).await?,
            SyncOperation::PullItem { entry } => self.plan_pull_item(entry).await?,
            SyncOperation::PushRoot => {
                self.plan_push_tree(&self.roots, self.roots.local_root()).await?
            }
            SyncOperation::PullRoot => {
                self.plan_pull_tree(&self.roots, &self.roots.remote_prefix()).await?
            }
        };

        let mut report = SyncReport {
            operation: operation.label(),
            total: candidates.len(),
            ..Default::default()
        };

        let result = self
            .transfer_batch(direction, candidates, &progress_tx, &mut report)
            .await;
        report.duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(()) => {
                info!(
                    "同步完成: {} - 传输 {}, 跳过 {}, 失败 {}",
                    report.operation, report.transferred, report.skipped, report.failed
                );
                Ok(report)
            }
            Err(e) => {
                error!("同步中止: {} - {}", report.operation, e);
                Err(e)
            }
        }
    }

    /// 单项上传：相对当前浏览位置映射
    async fn plan_push_item(&self, name: &str) -> Result<Vec<SyncCandidate>> {
        let local_dir = self.local_dir().await;
        let mapper = PathMapper::new(local_dir.clone(), &self.remote_prefix().await);
        let path = local_dir.join(name);

        let metadata = match tokio::fs::metadata(&path).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SyncError::InvalidSelection(format!("本地不存在: {}", name)))
            }
            Err(e) => return Err(e.into()),
        };

        if metadata.is_dir() {
            return self.plan_push_tree(&mapper, &path).await;
        }

        let file = LocalFile {
            size: metadata.len(),
            modified: metadata.modified()?.into(),
            path,
        };
        let key = mapper.to_remote_key(&file.path)?;
        Ok(vec![SyncCandidate::from_local(file, key)])
    }

    async fn plan_push_tree(&self, mapper: &PathMapper, dir: &Path) -> Result<Vec<SyncCandidate>> {
        let files = self.scanner.scan(dir).await?;
        files
            .into_iter()
            .map(|file| {
                let key = mapper.to_remote_key(&file.path)?;
                Ok(SyncCandidate::from_local(file, key))
            })
            .collect()
    }

    /// 单项下载：相对当前浏览位置解析键或前缀
    async fn plan_pull_item(&self, entry: &TreeEntry) -> Result<Vec<SyncCandidate>> {
        let local_dir = self.local_dir().await;
        let prefix = self.remote_prefix().await;

        match entry {
            TreeEntry::File { name, .. } => {
                let key = join_key(&prefix, name);
                let object = self
                    .store
                    .head(&key)
                    .await
                    .map_err(|e| listing_error(e, &key))?
                    .ok_or_else(|| SyncError::InvalidSelection(format!("远程不存在: {}", key)))?;
                Ok(vec![SyncCandidate::from_remote(object, local_dir.join(name))])
            }
            TreeEntry::Folder { name } => {
                let folder_prefix = format!("{}/", join_key(&prefix, name));
                let mapper = PathMapper::new(local_dir.join(name), &folder_prefix);
                self.plan_pull_tree(&mapper, &folder_prefix).await
            }
            TreeEntry::ParentLink { .. } | TreeEntry::Notice { .. } => Err(
                SyncError::InvalidSelection(format!("无法同步该行: {}", entry.name())),
            ),
        }
    }

    async fn plan_pull_tree(
        &self,
        mapper: &PathMapper,
        prefix: &str,
    ) -> Result<Vec<SyncCandidate>> {
        let objects = self.lister.list_subtree(prefix).await?;

        let mut candidates = Vec::with_capacity(objects.len());
        for object in objects {
            // 非零字节但以 `/` 结尾的键会映射成目录本身，无法作为文件写入
            if object.key.ends_with('/') {
                warn!("跳过以 / 结尾的对象: {}", object.key);
                continue;
            }
            let local_path = mapper.to_local_path(&object.key)?;
            candidates.push(SyncCandidate::from_remote(object, local_path));
        }
        Ok(candidates)
    }

    /// 顺序处理一批候选。单个文件失败只记录并继续，认证失败终止剩余队列。
    async fn transfer_batch(
        &self,
        direction: SyncDirection,
        candidates: Vec<SyncCandidate>,
        progress_tx: &Option<mpsc::Sender<SyncProgress>>,
        report: &mut SyncReport,
    ) -> Result<()> {
        // 总数在任何传输开始之前固定
        let total = candidates.len();

        if total == 0 {
            send_progress(progress_tx, 100.0, 0, 0, String::new()).await;
            return Ok(());
        }

        for (index, mut candidate) in candidates.into_iter().enumerate() {
            match self.sync_candidate(direction, &mut candidate).await {
                Ok(true) => report.transferred += 1,
                Ok(false) => report.skipped += 1,
                Err(e) if e.is_fatal() => {
                    report.failed += 1;
                    report.errors.push(e.to_string());
                    return Err(e);
                }
                Err(e) => {
                    warn!("文件同步失败，继续下一个: {}", e);
                    report.failed += 1;
                    report.errors.push(e.to_string());
                }
            }

            let processed = index + 1;
            let percent = processed as f64 / total as f64 * 100.0;
            send_progress(progress_tx, percent, processed, total, candidate.remote_key).await;
        }

        Ok(())
    }

    /// 比较并在需要时传输，返回是否发生了传输
    async fn sync_candidate(
        &self,
        direction: SyncDirection,
        candidate: &mut SyncCandidate,
    ) -> Result<bool> {
        match direction {
            SyncDirection::Push => {
                let lookup = self.store.head(&candidate.remote_key).await;
                candidate.remote_modified = remote_time_for_push(&candidate.remote_key, lookup);
            }
            SyncDirection::Pull => {
                candidate.local_modified = match local::modified_at(&candidate.local_path).await {
                    Ok(t) => t,
                    Err(e) => {
                        warn!("读取本地文件时间失败，按需要下载处理: {:?} - {}", candidate.local_path, e);
                        None
                    }
                };
            }
        }

        if !needs_transfer(direction, candidate.local_modified, candidate.remote_modified) {
            debug!("[{}] 跳过（已是最新）", candidate.remote_key);
            return Ok(false);
        }

        let result = match direction {
            SyncDirection::Push => {
                debug!("[{}] 上传中...", candidate.remote_key);
                self.store
                    .put_from_file(&candidate.local_path, &candidate.remote_key)
                    .await
            }
            SyncDirection::Pull => {
                debug!("[{}] 下载中...", candidate.remote_key);
                self.store
                    .get_to_file(&candidate.remote_key, &candidate.local_path)
                    .await
            }
        };

        result.map_err(|e| transfer_error(e, &candidate.remote_key))?;
        Ok(true)
    }
}

async fn send_progress(
    tx: &Option<mpsc::Sender<SyncProgress>>,
    percent: f64,
    processed: usize,
    total: usize,
    current: String,
) {
    if let Some(tx) = tx {
        let _ = tx
            .send(SyncProgress::Progress {
                percent,
                processed,
                total,
                current,
            })
            .await;
    }
}

fn transfer_error(e: SyncError, key: &str) -> SyncError {
    match e {
        SyncError::AuthFailure(_) | SyncError::TransferFailure { .. } => e,
        other => SyncError::TransferFailure {
            path: key.to_string(),
            reason: other.to_string(),
        },
    }
}

fn listing_error(e: SyncError, prefix: &str) -> SyncError {
    match e {
        SyncError::AuthFailure(_) | SyncError::ListingFailure { .. } => e,
        other => SyncError::ListingFailure {
            prefix: prefix.to_string(),
            reason: other.to_string(),
        },
    }
}
