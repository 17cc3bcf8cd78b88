use crate::core::worker::PROGRESS_CHANNEL_CAPACITY;
use crate::core::{SyncOperation, SyncProgress, SyncReport, SyncWorker};
use anyhow::Result;
use std::io::Write;
use tokio::sync::mpsc;

/// 提交操作并在终端显示进度，直到收到终止通知
pub async fn run_with_progress(
    worker: &SyncWorker,
    operation: SyncOperation,
) -> Result<SyncReport> {
    let (tx, mut rx) = mpsc::channel(PROGRESS_CHANNEL_CAPACITY);
    let handle = worker.submit(operation, tx)?;

    let mut outcome = None;
    while let Some(event) = rx.recv().await {
        match event {
            SyncProgress::Progress {
                percent,
                processed,
                total,
                current,
            } => {
                print!(
                    "\r同步中 {:>6.2}% ({}/{}) {:<60}",
                    percent,
                    processed,
                    total,
                    truncate(&current, 60)
                );
                let _ = std::io::stdout().flush();
            }
            SyncProgress::Completed(report) => {
                println!();
                outcome = Some(Ok(report));
            }
            SyncProgress::Failed(message) => {
                println!();
                outcome = Some(Err(anyhow::anyhow!(message)));
            }
        }
    }

    handle.await?;
    outcome.unwrap_or_else(|| Err(anyhow::anyhow!("同步任务异常退出")))
}

pub fn print_report(report: &SyncReport) {
    println!(
        "{}: 共 {} 个文件, 传输 {}, 跳过 {}, 失败 {} ({} ms)",
        report.operation,
        report.total,
        report.transferred,
        report.skipped,
        report.failed,
        report.duration_ms
    );
    for error in &report.errors {
        println!("  - {}", error);
    }
}

fn truncate(s: &str, max: usize) -> String {
    let count = s.chars().count();
    if count <= max {
        s.to_string()
    } else {
        let tail: String = s.chars().skip(count - (max - 1)).collect();
        format!("…{}", tail)
    }
}
