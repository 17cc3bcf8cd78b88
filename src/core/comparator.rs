use crate::error::Result;
use crate::storage::ObjectInfo;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 传输方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncDirection {
    /// 本地 -> 远程
    Push,
    /// 远程 -> 本地
    Pull,
}

impl fmt::Display for SyncDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncDirection::Push => write!(f, "push"),
            SyncDirection::Pull => write!(f, "pull"),
        }
    }
}

/// 判断是否需要传输。时间均为 UTC，由类型保证不会出现 naive 时间参与比较。
///
/// - Push：远程存在且远程时间 `>=` 本地时间时跳过
/// - Pull：本地存在且本地时间严格 `>` 远程时间时跳过
///
/// 两个方向的不对称是有意的：时间完全相同时 push 跳过、pull 仍然传输。
/// 时间未知的一侧视为不存在。
pub fn needs_transfer(
    direction: SyncDirection,
    local_modified: Option<DateTime<Utc>>,
    remote_modified: Option<DateTime<Utc>>,
) -> bool {
    match direction {
        SyncDirection::Push => match (local_modified, remote_modified) {
            (Some(local), Some(remote)) => remote < local,
            (None, Some(_)) => false,
            (_, None) => true,
        },
        SyncDirection::Pull => match (local_modified, remote_modified) {
            (Some(local), Some(remote)) => local <= remote,
            (Some(_), None) => true,
            (None, _) => true,
        },
    }
}

/// 从 head 查询结果中取出远程修改时间。
///
/// NotFound 以外的查询错误同样返回 `None`，即按“需要上传”处理：
/// 可能造成重复上传，但不会丢数据。
pub fn remote_time_for_push(
    key: &str,
    lookup: Result<Option<ObjectInfo>>,
) -> Option<DateTime<Utc>> {
    match lookup {
        Ok(Some(object)) => object.last_modified,
        Ok(None) => None,
        Err(e) if e.is_not_found() => None,
        Err(e) => {
            tracing::warn!("查询远程对象失败，按需要上传处理: {} - {}", key, e);
            None
        }
    }
}
