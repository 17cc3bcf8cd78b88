//! 同步错误类型

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    /// 对象或文件不存在（驱动“需要传输”判断，不作为失败上报）
    #[error("不存在: {0}")]
    NotFound(String),

    /// 凭证无效或缺失，终止当前批次
    #[error("认证失败: {0}")]
    AuthFailure(String),

    /// 单个文件传输失败，记录后继续下一个
    #[error("传输失败 {path}: {reason}")]
    TransferFailure { path: String, reason: String },

    /// 列举失败
    #[error("列举失败 {prefix}: {reason}")]
    ListingFailure { prefix: String, reason: String },

    /// 其他对象存储错误
    #[error("存储错误: {0}")]
    Store(String),

    #[error("已有同步操作正在运行")]
    Busy,

    #[error("无效的选择: {0}")]
    InvalidSelection(String),

    #[error("路径 {path} 不在根目录 {root} 之下")]
    OutsideRoot { path: String, root: String },

    #[error("路径包含非 UTF-8 字符: {0:?}")]
    NonUtf8Path(PathBuf),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    /// 是否需要终止整个批次（而不是只跳过当前文件）
    pub fn is_fatal(&self) -> bool {
        matches!(self, SyncError::AuthFailure(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, SyncError::NotFound(_))
    }
}

impl From<opendal::Error> for SyncError {
    fn from(e: opendal::Error) -> Self {
        match e.kind() {
            opendal::ErrorKind::NotFound => SyncError::NotFound(e.to_string()),
            opendal::ErrorKind::PermissionDenied | opendal::ErrorKind::ConfigInvalid => {
                SyncError::AuthFailure(e.to_string())
            }
            _ => SyncError::Store(e.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
