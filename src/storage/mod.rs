pub mod local;
pub mod memory;
pub mod s3;

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

pub use memory::MemoryStore;
pub use s3::S3Store;

// ============ 公共常量 ============

/// 非 IO 操作超时（秒）- stat, list 等
pub const OP_TIMEOUT_SECS: u64 = 60;
/// IO 操作超时（秒）- read, write 等
pub const IO_TIMEOUT_SECS: u64 = 300;

/// 远程对象信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectInfo {
    /// 完整对象键（无前导 `/`）
    pub key: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

impl ObjectInfo {
    /// 零字节且以 `/` 结尾的对象是控制台创建的“文件夹”占位符
    pub fn is_dir_marker(&self) -> bool {
        self.size == 0 && self.key.ends_with('/')
    }
}

/// 按 `/` 分隔的单层列举结果
#[derive(Debug, Clone, Default)]
pub struct Listing {
    /// 公共前缀（子“文件夹”），形如 `a/b/`
    pub folders: Vec<String>,
    pub objects: Vec<ObjectInfo>,
}

/// 对象存储抽象接口
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// 按分隔符列出一层（已处理完全部分页）
    async fn list_level(&self, prefix: &str) -> Result<Listing>;

    /// 递归列出前缀下的所有对象（已处理完全部分页）
    async fn list_recursive(&self, prefix: &str) -> Result<Vec<ObjectInfo>>;

    /// 获取对象元数据，不存在时返回 `None`
    async fn head(&self, key: &str) -> Result<Option<ObjectInfo>>;

    /// 下载对象到本地文件
    async fn get_to_file(&self, key: &str, local_path: &Path) -> Result<()>;

    /// 上传本地文件
    async fn put_from_file(&self, local_path: &Path, key: &str) -> Result<()>;

    /// 获取存储名称（用于日志）
    fn name(&self) -> &str;
}

/// 根据配置创建 S3 存储实例
pub fn create_store(config: &crate::config::AppConfig) -> Result<Arc<dyn ObjectStore>> {
    tracing::info!(
        "初始化S3存储: bucket={}, region={}",
        config.bucket,
        config.region
    );
    Ok(Arc::new(S3Store::new(
        &config.bucket,
        &config.region,
        config.endpoint.clone(),
    )?) as Arc<dyn ObjectStore>)
}
