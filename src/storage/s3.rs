use super::{Listing, ObjectInfo, ObjectStore, IO_TIMEOUT_SECS, OP_TIMEOUT_SECS};
use crate::error::{Result, SyncError};
use async_trait::async_trait;
use futures::TryStreamExt;
use opendal::{layers::TimeoutLayer, Entry, Metakey, Operator};
use std::path::Path;
use std::time::Duration;

pub struct S3Store {
    operator: Operator,
    name: String,
}

impl S3Store {
    /// 凭证由 opendal 从标准 AWS 环境变量 / profile 中加载
    pub fn new(bucket: &str, region: &str, endpoint: Option<String>) -> Result<Self> {
        use opendal::services::S3;

        let mut builder = S3::default().bucket(bucket).region(region);

        if let Some(ref ep) = endpoint {
            builder = builder.endpoint(ep);
        }

        // 添加超时层
        let operator = Operator::new(builder)?
            .layer(
                TimeoutLayer::default()
                    .with_timeout(Duration::from_secs(OP_TIMEOUT_SECS))
                    .with_io_timeout(Duration::from_secs(IO_TIMEOUT_SECS)),
            )
            .finish();

        Ok(Self {
            operator,
            name: format!("s3://{}", bucket),
        })
    }

    fn to_object(entry: &Entry) -> ObjectInfo {
        let meta = entry.metadata();
        ObjectInfo {
            key: entry.path().trim_start_matches('/').to_string(),
            size: meta.content_length(),
            last_modified: meta.last_modified(),
        }
    }

    /// opendal 用 `/` 表示桶根
    fn list_path(prefix: &str) -> &str {
        if prefix.is_empty() {
            "/"
        } else {
            prefix
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn list_level(&self, prefix: &str) -> Result<Listing> {
        let path = Self::list_path(prefix);
        let mut listing = Listing::default();

        // 非递归列举即 delimiter = "/"，lister 内部处理分页
        let mut lister = self
            .operator
            .lister_with(path)
            .recursive(false)
            .metakey(Metakey::ContentLength | Metakey::LastModified | Metakey::Mode)
            .await?;

        while let Some(entry) = lister.try_next().await? {
            let key = entry.path().trim_start_matches('/');

            // 跳过前缀自身
            if key.is_empty() || key == prefix {
                continue;
            }

            if entry.metadata().is_dir() {
                listing.folders.push(key.to_string());
            } else {
                listing.objects.push(Self::to_object(&entry));
            }
        }

        Ok(listing)
    }

    async fn list_recursive(&self, prefix: &str) -> Result<Vec<ObjectInfo>> {
        let path = Self::list_path(prefix);
        let mut objects = Vec::new();

        let mut lister = self
            .operator
            .lister_with(path)
            .recursive(true)
            .metakey(Metakey::ContentLength | Metakey::LastModified | Metakey::Mode)
            .await?;

        while let Some(entry) = lister.try_next().await? {
            let key = entry.path().trim_start_matches('/');
            if key.is_empty() || key == prefix {
                continue;
            }
            objects.push(Self::to_object(&entry));
        }

        Ok(objects)
    }

    async fn head(&self, key: &str) -> Result<Option<ObjectInfo>> {
        match self.operator.stat(key).await {
            Ok(meta) => Ok(Some(ObjectInfo {
                key: key.to_string(),
                size: meta.content_length(),
                last_modified: meta.last_modified(),
            })),
            Err(e) if e.kind() == opendal::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_to_file(&self, key: &str, local_path: &Path) -> Result<()> {
        let data = self.operator.read(key).await?;
        super::local::write_atomic(local_path, data.to_vec()).await
    }

    async fn put_from_file(&self, local_path: &Path, key: &str) -> Result<()> {
        let data = tokio::fs::read(local_path).await?;
        self.operator.write(key, data).await.map_err(|e| match SyncError::from(e) {
            // 上传时的 NotFound 只可能是桶不存在
            SyncError::NotFound(msg) => SyncError::Store(msg),
            other => other,
        })?;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
