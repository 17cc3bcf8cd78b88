//! 本地路径与远程对象键之间的映射
//!
//! 映射总是基于一对（本地目录, 远程前缀）做相对路径运算：
//! 根同步使用配置的根目录对，单项同步使用当前浏览位置。

use crate::error::{Result, SyncError};
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMapper {
    local_root: PathBuf,
    /// 不含首尾 `/`
    remote_root: String,
}

impl PathMapper {
    pub fn new(local_root: impl Into<PathBuf>, remote_root: &str) -> Self {
        Self {
            local_root: local_root.into(),
            remote_root: remote_root.trim_matches('/').to_string(),
        }
    }

    pub fn local_root(&self) -> &Path {
        &self.local_root
    }

    pub fn remote_root(&self) -> &str {
        &self.remote_root
    }

    /// 远程根作为列举前缀（带结尾 `/`，桶根时为空）
    pub fn remote_prefix(&self) -> String {
        if self.remote_root.is_empty() {
            String::new()
        } else {
            format!("{}/", self.remote_root)
        }
    }

    pub fn to_remote_key(&self, local_path: &Path) -> Result<String> {
        to_remote_key(local_path, &self.local_root, &self.remote_root)
    }

    pub fn to_local_path(&self, key: &str) -> Result<PathBuf> {
        to_local_path(key, &self.local_root, &self.remote_root)
    }
}

/// `remoteRoot + "/" + relativePath(local, localRoot)`，相对路径为空时就是 `remoteRoot`
pub fn to_remote_key(local_path: &Path, local_root: &Path, remote_root: &str) -> Result<String> {
    let relative = relative_key(local_path, local_root)?;
    Ok(join_key(remote_root, &relative))
}

/// `localRoot + relativePath(key, remoteRoot)`
pub fn to_local_path(key: &str, local_root: &Path, remote_root: &str) -> Result<PathBuf> {
    let root = remote_root.trim_matches('/');
    let key = key.trim_start_matches('/');

    let relative = if root.is_empty() {
        key
    } else if key.trim_end_matches('/') == root {
        ""
    } else {
        key.strip_prefix(root)
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or_else(|| SyncError::OutsideRoot {
                path: key.to_string(),
                root: root.to_string(),
            })?
    };

    let mut path = local_root.to_path_buf();
    for segment in relative.split('/').filter(|s| !s.is_empty()) {
        // 不允许对象键逃逸出本地根目录
        if segment == "." || segment == ".." {
            return Err(SyncError::OutsideRoot {
                path: key.to_string(),
                root: root.to_string(),
            });
        }
        path.push(segment);
    }
    Ok(path)
}

/// 相对路径，分隔符统一为 `/`
pub fn relative_key(path: &Path, base: &Path) -> Result<String> {
    let relative = path.strip_prefix(base).map_err(|_| SyncError::OutsideRoot {
        path: path.display().to_string(),
        root: base.display().to_string(),
    })?;

    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => segments.push(
                part.to_str()
                    .ok_or_else(|| SyncError::NonUtf8Path(path.to_path_buf()))?,
            ),
            Component::CurDir => {}
            _ => {
                return Err(SyncError::OutsideRoot {
                    path: path.display().to_string(),
                    root: base.display().to_string(),
                })
            }
        }
    }
    Ok(segments.join("/"))
}

/// 拼接前缀和相对键，不产生多余或重复的分隔符
pub fn join_key(root: &str, relative: &str) -> String {
    let root = root.trim_matches('/');
    let relative = relative.trim_matches('/');
    match (root.is_empty(), relative.is_empty()) {
        (_, true) => root.to_string(),
        (true, false) => relative.to_string(),
        (false, false) => format!("{}/{}", root, relative),
    }
}
