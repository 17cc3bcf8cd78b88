use anyhow::Context;
use clap::{Parser, Subcommand};
use presetsync_lib::commands::{self, shell, sync::print_report};
use presetsync_lib::core::{LocalScanner, SyncEngine, SyncOperation, SyncWorker};
use presetsync_lib::logging::{self, LogConfig};
use presetsync_lib::{storage, AppConfig};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "presetsync", version, about = "本地目录与 S3 前缀之间的预设同步工具")]
struct Cli {
    /// 配置文件路径（默认位于系统配置目录）
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// 交互式浏览和同步（默认）
    Shell,
    /// 上传整个本地根目录到远程根
    PushRoot,
    /// 下载整个远程根到本地根目录
    PullRoot,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(AppConfig::default_path);

    // 初始化日志系统，日志写到配置文件旁边
    let log_dir = config_path
        .parent()
        .map(|p| p.join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"));
    logging::init(&LogConfig::load(&config_path), &log_dir);

    let config = AppConfig::load(&config_path)?;
    tracing::info!(
        "配置已加载: bucket={}, localRoot={}, remoteRoot={}",
        config.bucket,
        config.local_root.display(),
        config.remote_root
    );

    let store = storage::create_store(&config).context("初始化 S3 存储失败")?;
    let engine = Arc::new(SyncEngine::with_scanner(
        store,
        config.root_pair(),
        config.browse_home(),
        LocalScanner::with_config(config.scan_config()),
    ));
    let worker = SyncWorker::new(engine);

    match cli.command.unwrap_or(Command::Shell) {
        Command::Shell => shell::run(worker).await?,
        Command::PushRoot => {
            let report = commands::sync::run_with_progress(&worker, SyncOperation::PushRoot).await?;
            print_report(&report);
        }
        Command::PullRoot => {
            let report = commands::sync::run_with_progress(&worker, SyncOperation::PullRoot).await?;
            print_report(&report);
        }
    }

    Ok(())
}
