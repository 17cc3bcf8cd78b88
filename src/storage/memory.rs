//! 进程内对象存储，行为与 S3 的列举语义一致

use super::{Listing, ObjectInfo, ObjectStore};
use crate::error::{Result, SyncError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::RwLock;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    last_modified: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: RwLock<BTreeMap<String, StoredObject>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以指定修改时间写入对象
    pub fn insert(&self, key: &str, data: impl Into<Vec<u8>>, last_modified: DateTime<Utc>) {
        self.write_lock().insert(
            key.to_string(),
            StoredObject {
                data: data.into(),
                last_modified,
            },
        );
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.read_lock().get(key).map(|o| o.data.clone())
    }

    pub fn keys(&self) -> Vec<String> {
        self.read_lock().keys().cloned().collect()
    }

    fn read_lock(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, StoredObject>> {
        self.objects.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_lock(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, StoredObject>> {
        self.objects.write().unwrap_or_else(|e| e.into_inner())
    }

    fn info(key: &str, object: &StoredObject) -> ObjectInfo {
        ObjectInfo {
            key: key.to_string(),
            size: object.data.len() as u64,
            last_modified: Some(object.last_modified),
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list_level(&self, prefix: &str) -> Result<Listing> {
        let objects = self.read_lock();
        let mut folders = BTreeSet::new();
        let mut listing = Listing::default();

        for (key, object) in objects.range(prefix.to_string()..) {
            let Some(rest) = key.strip_prefix(prefix) else {
                break;
            };
            if rest.is_empty() {
                continue;
            }
            match rest.find('/') {
                Some(pos) => {
                    folders.insert(format!("{}{}", prefix, &rest[..=pos]));
                }
                None => listing.objects.push(Self::info(key, object)),
            }
        }

        listing.folders = folders.into_iter().collect();
        Ok(listing)
    }

    async fn list_recursive(&self, prefix: &str) -> Result<Vec<ObjectInfo>> {
        let objects = self.read_lock();
        Ok(objects
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, object)| Self::info(key, object))
            .collect())
    }

    async fn head(&self, key: &str) -> Result<Option<ObjectInfo>> {
        Ok(self.read_lock().get(key).map(|o| Self::info(key, o)))
    }

    async fn get_to_file(&self, key: &str, local_path: &Path) -> Result<()> {
        let data = self
            .get(key)
            .ok_or_else(|| SyncError::NotFound(key.to_string()))?;
        super::local::write_atomic(local_path, data).await
    }

    async fn put_from_file(&self, local_path: &Path, key: &str) -> Result<()> {
        let data = tokio::fs::read(local_path).await?;
        self.insert(key, data, Utc::now());
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
