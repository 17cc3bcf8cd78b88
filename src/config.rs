//! 应用配置模块

use crate::core::path_mapper::PathMapper;
use crate::core::scanner::{default_exclude_patterns, ScanConfig};
use crate::logging::LogConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// 配置文件名
pub const CONFIG_FILE_NAME: &str = "config.json";

/// 应用配置。凭证不在这里，S3 客户端从标准 AWS 环境读取。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    pub bucket: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// 自定义端点（MinIO 等兼容服务）
    #[serde(default)]
    pub endpoint: Option<String>,
    /// 根同步的本地目录
    pub local_root: PathBuf,
    /// 根同步的远程前缀，加载后不含首尾 `/`
    #[serde(default)]
    pub remote_root: String,
    /// 本地浏览的起始目录，默认为用户主目录
    #[serde(default)]
    pub browse_home: Option<PathBuf>,
    #[serde(default = "default_exclude_patterns")]
    pub exclude_patterns: Vec<String>,
    #[serde(default)]
    pub log: LogConfig,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

impl AppConfig {
    /// 默认配置文件路径
    pub fn default_path() -> PathBuf {
        crate::dirs::config_dir()
            .map(|p| p.join("presetsync"))
            .unwrap_or_else(|| PathBuf::from(".presetsync"))
            .join(CONFIG_FILE_NAME)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("读取配置文件失败: {}", path.display()))?;
        Self::from_json(&content).with_context(|| format!("解析配置文件失败: {}", path.display()))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let mut config: AppConfig = serde_json::from_str(content)?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    fn normalize(&mut self) {
        self.remote_root = self.remote_root.trim_matches('/').to_string();
    }

    fn validate(&self) -> Result<()> {
        if self.bucket.trim().is_empty() {
            anyhow::bail!("bucket 不能为空");
        }
        if !self.local_root.is_absolute() {
            anyhow::bail!("localRoot 必须是绝对路径: {}", self.local_root.display());
        }
        Ok(())
    }

    /// 配置的根目录对
    pub fn root_pair(&self) -> PathMapper {
        PathMapper::new(self.local_root.clone(), &self.remote_root)
    }

    pub fn browse_home(&self) -> PathBuf {
        self.browse_home
            .clone()
            .or_else(crate::dirs::home_dir)
            .unwrap_or_else(|| self.local_root.clone())
    }

    pub fn scan_config(&self) -> ScanConfig {
        ScanConfig {
            exclude_patterns: self.exclude_patterns.clone(),
        }
    }
}
