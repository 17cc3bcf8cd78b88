use crate::core::entry::TreeEntry;
use crate::error::{Result, SyncError};
use crate::storage::{ObjectInfo, ObjectStore};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 列举失败时显示的占位信息
pub const LISTING_FAILED_NOTICE: &str = "无法列出远程内容，请检查凭证和存储桶配置";

/// 远程前缀列举器
pub struct RemoteLister {
    store: Arc<dyn ObjectStore>,
}

impl RemoteLister {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// 列出一层：先子文件夹，再文件。失败时返回单个占位行而不是错误。
    pub async fn list_level(&self, prefix: &str) -> Vec<TreeEntry> {
        match self.try_list_level(prefix).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("列举远程前缀失败: {:?} - {}", prefix, e);
                vec![TreeEntry::Notice {
                    message: LISTING_FAILED_NOTICE.to_string(),
                }]
            }
        }
    }

    async fn try_list_level(&self, prefix: &str) -> Result<Vec<TreeEntry>> {
        let listing = self.store.list_level(prefix).await?;
        debug!(
            "列举 {} {:?}: {} 个文件夹, {} 个对象",
            self.store.name(),
            prefix,
            listing.folders.len(),
            listing.objects.len()
        );

        let folders = listing.folders.iter().filter_map(|folder| {
            let name = folder
                .strip_prefix(prefix)
                .unwrap_or(folder)
                .trim_end_matches('/')
                .rsplit('/')
                .next()
                .unwrap_or_default();
            (!name.is_empty()).then(|| TreeEntry::Folder {
                name: name.to_string(),
            })
        });

        let files = listing.objects.into_iter().filter_map(|object| {
            let name = object.key.strip_prefix(prefix).unwrap_or(&object.key);
            // 前缀自身的占位对象去掉前缀后为空，不显示
            (!name.is_empty() && !name.contains('/')).then(|| TreeEntry::File {
                name: name.to_string(),
                last_modified: object.last_modified,
                size: object.size,
            })
        });

        Ok(folders.chain(files).collect())
    }

    /// 列出前缀下的全部对象（可传输集合），不含零字节目录占位对象
    pub async fn list_subtree(&self, prefix: &str) -> Result<Vec<ObjectInfo>> {
        let objects = self
            .store
            .list_recursive(prefix)
            .await
            .map_err(|e| match e {
                SyncError::AuthFailure(_) => e,
                other => SyncError::ListingFailure {
                    prefix: prefix.to_string(),
                    reason: other.to_string(),
                },
            })?;

        let total = objects.len();
        let objects: Vec<_> = objects.into_iter().filter(|o| !o.is_dir_marker()).collect();
        info!(
            "递归列举 {:?}: {} 个对象, 忽略 {} 个目录占位",
            prefix,
            objects.len(),
            total - objects.len()
        );

        Ok(objects)
    }
}
