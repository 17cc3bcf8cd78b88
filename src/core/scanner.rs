use crate::core::path_mapper::relative_key;
use crate::error::Result;
use chrono::{DateTime, Utc};
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// 本地扫描到的文件
#[derive(Debug, Clone)]
pub struct LocalFile {
    pub path: PathBuf,
    pub size: u64,
    pub modified: DateTime<Utc>,
}

/// 扫描配置
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// 排除规则（glob 子集：`*` 和 `**`）
    pub exclude_patterns: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            exclude_patterns: default_exclude_patterns(),
        }
    }
}

pub fn default_exclude_patterns() -> Vec<String> {
    vec![
        ".DS_Store".to_string(),
        "Thumbs.db".to_string(),
        "*.tmp".to_string(),
        "*.part".to_string(),
        ".git/**".to_string(),
    ]
}

/// 本地目录扫描器
#[derive(Debug, Clone, Default)]
pub struct LocalScanner {
    config: ScanConfig,
}

impl LocalScanner {
    pub fn with_config(config: ScanConfig) -> Self {
        Self { config }
    }

    /// 检查相对路径是否应该被排除
    pub fn should_exclude(&self, relative: &str) -> bool {
        self.config
            .exclude_patterns
            .iter()
            .any(|pattern| matches_pattern(relative, pattern))
    }

    /// 递归扫描目录下的所有文件（不跟随符号链接）
    pub async fn scan(&self, root: &Path) -> Result<Vec<LocalFile>> {
        info!("开始扫描本地目录: {:?}", root);

        let root = root.to_path_buf();
        let scanner = self.clone();

        // 使用 spawn_blocking 避免阻塞 async runtime
        let files = tokio::task::spawn_blocking(move || scanner.scan_blocking(&root))
            .await
            .map_err(std::io::Error::other)??;

        info!("扫描完成: {} 个文件", files.len());
        Ok(files)
    }

    fn scan_blocking(&self, root: &Path) -> Result<Vec<LocalFile>> {
        let mut files = Vec::new();
        let mut excluded = 0usize;

        for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
            let entry = entry.map_err(std::io::Error::from)?;

            // 指向文件的符号链接按目标文件处理；目录链接不进入，避免循环
            let metadata = if entry.file_type().is_symlink() {
                match std::fs::metadata(entry.path()) {
                    Ok(m) if m.is_file() => m,
                    Ok(_) => continue,
                    Err(e) => {
                        warn!("跳过无法解析的符号链接 {:?}: {}", entry.path(), e);
                        continue;
                    }
                }
            } else if entry.file_type().is_file() {
                entry.metadata().map_err(std::io::Error::from)?
            } else {
                continue;
            };

            let relative = relative_key(entry.path(), root)?;
            if self.should_exclude(&relative) {
                debug!("排除文件: {}", relative);
                excluded += 1;
                continue;
            }

            files.push(LocalFile {
                path: entry.path().to_path_buf(),
                size: metadata.len(),
                modified: metadata.modified()?.into(),
            });
        }

        if excluded > 0 {
            debug!("{} 个文件被排除", excluded);
        }
        Ok(files)
    }
}

/// 简单的 glob 模式匹配（大小写不敏感）
fn matches_pattern(path: &str, pattern: &str) -> bool {
    let path = path.to_lowercase();
    let pattern = pattern.to_lowercase();

    // 处理 ** 通配符：前缀目录下的全部内容
    if let Some((prefix, suffix)) = pattern.split_once("**") {
        let prefix = prefix.trim_end_matches('/');
        let suffix = suffix.trim_start_matches('/');

        let under_prefix = prefix.is_empty()
            || path.starts_with(&format!("{}/", prefix))
            || path.contains(&format!("/{}/", prefix));
        return under_prefix && (suffix.is_empty() || path.ends_with(suffix));
    }

    let file_name = path.rsplit('/').next().unwrap_or(&path);

    // 处理 * 通配符，只匹配文件名
    if pattern.contains('*') {
        let regex_pattern = regex::escape(&pattern).replace(r"\*", ".*");
        return Regex::new(&format!("^{}$", regex_pattern))
            .map(|re| re.is_match(file_name))
            .unwrap_or(false);
    }

    // 精确匹配
    path == pattern || file_name == pattern
}
