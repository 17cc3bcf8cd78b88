//! 本地文件系统辅助函数

use crate::core::entry::TreeEntry;
use crate::error::Result;
use chrono::{DateTime, Utc};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::fs;

/// 列出目录的直接子项：隐藏项不显示，目录在前、文件在后，各自按修改时间倒序
pub async fn list_children(dir: &Path) -> Result<Vec<TreeEntry>> {
    let mut dirs = Vec::new();
    let mut files = Vec::new();

    let mut read_dir = fs::read_dir(dir).await?;
    while let Some(entry) = read_dir.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }

        // 读取元数据失败（如悬空链接）时跳过该项
        let metadata = match fs::metadata(entry.path()).await {
            Ok(m) => m,
            Err(e) => {
                tracing::debug!("跳过无法读取的条目 {:?}: {}", entry.path(), e);
                continue;
            }
        };
        let modified: DateTime<Utc> = metadata.modified()?.into();

        if metadata.is_dir() {
            dirs.push((modified, TreeEntry::Folder { name }));
        } else if metadata.is_file() {
            files.push((
                modified,
                TreeEntry::File {
                    name,
                    last_modified: Some(modified),
                    size: metadata.len(),
                },
            ));
        }
    }

    dirs.sort_by(|a, b| b.0.cmp(&a.0));
    files.sort_by(|a, b| b.0.cmp(&a.0));

    Ok(dirs.into_iter().chain(files).map(|(_, e)| e).collect())
}

/// 文件的修改时间（UTC），不存在时返回 `None`
pub async fn modified_at(path: &Path) -> Result<Option<DateTime<Utc>>> {
    match fs::metadata(path).await {
        Ok(metadata) => Ok(Some(metadata.modified()?.into())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// 确保文件的父目录存在
pub async fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    Ok(())
}

/// 先写入同目录下的 `.part` 临时文件，再原子重命名
pub async fn write_atomic(path: &Path, data: Vec<u8>) -> Result<()> {
    ensure_parent(path).await?;

    let temp_path = part_path(path);
    if let Err(e) = fs::write(&temp_path, data).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(e.into());
    }
    fs::rename(&temp_path, path).await?;

    Ok(())
}

fn part_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(".part");
    path.with_file_name(name)
}
