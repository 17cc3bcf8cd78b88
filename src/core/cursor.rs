//! 浏览位置（与同步无关）

use std::path::{Component, Path, PathBuf};

/// 远程浏览位置：从桶根依次进入的文件夹名
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteCursor {
    segments: Vec<String>,
}

impl RemoteCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_at_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn descend(&mut self, folder: &str) {
        let folder = folder.trim_matches('/');
        if !folder.is_empty() {
            self.segments.push(folder.to_string());
        }
    }

    /// 在根上调用不做任何事
    pub fn ascend(&mut self) {
        self.segments.pop();
    }

    /// 当前列举前缀，根为空串，否则以 `/` 结尾
    pub fn prefix(&self) -> String {
        self.segments
            .iter()
            .map(|s| format!("{}/", s))
            .collect()
    }

    /// 给“返回上级”行显示的位置
    pub fn display(&self) -> String {
        format!("/{}", self.prefix())
    }
}

/// 名称是否恰好是一个普通路径段（不含分隔符、`.` 和 `..`）
pub fn is_child_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// 本地浏览位置，不允许上移到起始目录之外
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalCursor {
    home: PathBuf,
    current: PathBuf,
}

impl LocalCursor {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        Self {
            current: home.clone(),
            home,
        }
    }

    pub fn current(&self) -> &Path {
        &self.current
    }

    pub fn is_at_root(&self) -> bool {
        self.current == self.home
    }

    /// 只接受当前目录的直接子项名，返回是否移动
    pub fn descend(&mut self, dir: &str) -> bool {
        let dir = dir.trim_matches('/');
        if !is_child_name(dir) {
            return false;
        }
        self.current.push(dir);
        true
    }

    /// 已在起始目录时不做任何事
    pub fn ascend(&mut self) {
        if self.is_at_root() {
            return;
        }
        if !self.current.pop() || !self.current.starts_with(&self.home) {
            self.current = self.home.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_descend_ascend() {
        let mut cursor = RemoteCursor::new();
        assert!(cursor.is_at_root());
        assert_eq!(cursor.prefix(), "");

        cursor.descend("presets");
        cursor.descend("Synths/");
        assert_eq!(cursor.prefix(), "presets/Synths/");
        assert_eq!(cursor.display(), "/presets/Synths/");

        cursor.ascend();
        assert_eq!(cursor.prefix(), "presets/");
        cursor.ascend();
        cursor.ascend();
        assert!(cursor.is_at_root());
    }

    #[test]
    fn test_local_ascend_stops_at_home() {
        let mut cursor = LocalCursor::new("/home/u");
        cursor.ascend();
        assert_eq!(cursor.current(), Path::new("/home/u"));

        cursor.descend("Presets");
        cursor.descend("Synths");
        assert_eq!(cursor.current(), Path::new("/home/u/Presets/Synths"));
        cursor.ascend();
        cursor.ascend();
        cursor.ascend();
        assert_eq!(cursor.current(), Path::new("/home/u"));
    }

    #[test]
    fn test_local_descend_ignores_parent_segment() {
        let mut cursor = LocalCursor::new("/home/u");
        assert!(!cursor.descend(".."));
        assert!(cursor.is_at_root());
    }

    #[test]
    fn test_local_descend_rejects_multi_segment_escape() {
        let mut cursor = LocalCursor::new("/home/u");
        assert!(!cursor.descend("../outside"));
        assert!(!cursor.descend("a/../../x"));
        assert!(!cursor.descend("Presets/Synths"));
        assert!(cursor.is_at_root());

        assert!(cursor.descend("Presets/"));
        cursor.ascend();
        assert_eq!(cursor.current(), Path::new("/home/u"));
    }

    #[test]
    fn test_is_child_name() {
        assert!(is_child_name("Synths"));
        assert!(is_child_name("My Presets.v2"));
        assert!(!is_child_name(""));
        assert!(!is_child_name("."));
        assert!(!is_child_name(".."));
        assert!(!is_child_name("../x"));
        assert!(!is_child_name("a/b"));
    }
}
