//! 后台同步执行：界面线程只负责提交和接收进度

use crate::core::engine::{SyncEngine, SyncOperation, SyncProgress};
use crate::error::Result;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::error;

/// 进度通道容量
pub const PROGRESS_CHANNEL_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct SyncWorker {
    engine: Arc<SyncEngine>,
}

impl SyncWorker {
    pub fn new(engine: Arc<SyncEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<SyncEngine> {
        &self.engine
    }

    /// 在后台任务中执行操作。已有操作在运行时立即返回 `Busy`。
    ///
    /// 结束时向通道发送一条 `Completed` 或 `Failed`。不支持中途取消。
    pub fn submit(
        &self,
        operation: SyncOperation,
        progress_tx: mpsc::Sender<SyncProgress>,
    ) -> Result<JoinHandle<()>> {
        let guard = self.engine.begin(&operation)?;
        let engine = self.engine.clone();

        Ok(tokio::spawn(async move {
            let result = engine.execute(operation, Some(progress_tx.clone())).await;
            // 先回到 Idle，再发终止通知，收到通知后即可提交下一个操作
            drop(guard);

            let notice = match result {
                Ok(report) => SyncProgress::Completed(report),
                Err(e) => {
                    error!("后台同步失败: {}", e);
                    SyncProgress::Failed(e.to_string())
                }
            };
            let _ = progress_tx.send(notice).await;
        }))
    }
}
