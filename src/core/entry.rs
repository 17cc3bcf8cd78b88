use chrono::{DateTime, Utc};
use serde::Serialize;

/// 浏览列表中的一行
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TreeEntry {
    File {
        name: String,
        last_modified: Option<DateTime<Utc>>,
        size: u64,
    },
    /// 大小和时间在进入之前未知
    Folder { name: String },
    /// 非根层级顶部的“返回上级”行，`location` 为当前位置
    ParentLink { location: String },
    /// 列举失败时的占位行
    Notice { message: String },
}

impl TreeEntry {
    pub fn name(&self) -> &str {
        match self {
            TreeEntry::File { name, .. } | TreeEntry::Folder { name } => name,
            TreeEntry::ParentLink { .. } => "..",
            TreeEntry::Notice { message } => message,
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, TreeEntry::Folder { .. })
    }

    pub fn is_file(&self) -> bool {
        matches!(self, TreeEntry::File { .. })
    }
}
