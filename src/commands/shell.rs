//! 交互式终端：浏览本地目录和远程前缀，并触发同步

use super::print_entries;
use super::sync::{print_report, run_with_progress};
use crate::core::{SyncOperation, SyncWorker, TreeEntry};
use anyhow::Result;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    RemoteList,
    RemoteEnter(String),
    RemoteUp,
    LocalList,
    LocalEnter(String),
    LocalUp,
    Push(String),
    Pull(String),
    PushRoot,
    PullRoot,
    Help,
    Quit,
}

impl ShellCommand {
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (cmd, arg) = match line.split_once(char::is_whitespace) {
            Some((cmd, arg)) => (cmd, arg.trim()),
            None => (line, ""),
        };

        let need_arg = |name: &str| -> Result<String> {
            if arg.is_empty() {
                anyhow::bail!("{} 需要一个名称参数", name);
            }
            Ok(arg.to_string())
        };

        let command = match cmd {
            "ls" => ShellCommand::RemoteList,
            "cd" if arg == ".." => ShellCommand::RemoteUp,
            "cd" => ShellCommand::RemoteEnter(need_arg("cd")?),
            "up" => ShellCommand::RemoteUp,
            "lls" => ShellCommand::LocalList,
            "lcd" if arg == ".." => ShellCommand::LocalUp,
            "lcd" => ShellCommand::LocalEnter(need_arg("lcd")?),
            "lup" => ShellCommand::LocalUp,
            "push" => ShellCommand::Push(need_arg("push")?),
            "pull" => ShellCommand::Pull(need_arg("pull")?),
            "push-root" => ShellCommand::PushRoot,
            "pull-root" => ShellCommand::PullRoot,
            "help" | "?" => ShellCommand::Help,
            "quit" | "exit" | "q" => ShellCommand::Quit,
            other => anyhow::bail!("未知命令: {}（输入 help 查看帮助）", other),
        };
        Ok(Some(command))
    }
}

const HELP: &str = "\
命令:
  ls              列出当前远程层级
  cd <目录>       进入远程文件夹（cd .. 返回上级）
  up              返回远程上级
  lls             列出当前本地目录
  lcd <目录>      进入本地目录（lcd .. 返回上级）
  lup             返回本地上级
  push <名称>     上传当前本地目录中的文件或目录到当前远程层级
  pull <名称>     下载当前远程层级中的文件或文件夹到当前本地目录
  push-root       上传配置的本地根目录到远程根
  pull-root       下载配置的远程根到本地根目录
  quit            退出";

struct Shell {
    worker: SyncWorker,
    /// 最近一次显示的远程层级，用于解析 pull 的选择
    remote_entries: Vec<TreeEntry>,
}

impl Shell {
    async fn show_remote(&mut self, entries: Vec<TreeEntry>) {
        let prefix = self.worker.engine().remote_prefix().await;
        let title = format!("远程 {}/{}", self.worker.engine().store_name(), prefix);
        print_entries(&title, &entries);
        self.remote_entries = entries;
    }

    fn show_local(&self, entries: Result<Vec<TreeEntry>, crate::SyncError>, title: String) {
        match entries {
            Ok(entries) => print_entries(&title, &entries),
            Err(e) => println!("错误: {}", e),
        }
    }

    async fn sync(&mut self, operation: SyncOperation) {
        let refresh_remote = operation.direction() == crate::core::SyncDirection::Push;
        match run_with_progress(&self.worker, operation).await {
            Ok(report) => print_report(&report),
            Err(e) => println!("同步失败: {}", e),
        }

        // 上传后刷新远程列表，下载后刷新本地列表
        if refresh_remote {
            let entries = self.worker.engine().remote_entries().await;
            self.show_remote(entries).await;
        } else {
            let engine = self.worker.engine().clone();
            let title = format!("本地 {}", engine.local_dir().await.display());
            self.show_local(engine.local_entries().await, title);
        }
    }

    /// 返回 false 表示退出
    async fn handle(&mut self, command: ShellCommand) -> bool {
        let engine = self.worker.engine().clone();
        match command {
            ShellCommand::RemoteList => {
                let entries = engine.remote_entries().await;
                self.show_remote(entries).await;
            }
            ShellCommand::RemoteEnter(name) => {
                let is_folder = self
                    .remote_entries
                    .iter()
                    .any(|e| e.is_folder() && e.name() == name);
                if is_folder {
                    let entries = engine.descend_remote(&name).await;
                    self.show_remote(entries).await;
                } else {
                    println!("当前远程层级中没有文件夹: {}", name);
                }
            }
            ShellCommand::RemoteUp => {
                let entries = engine.ascend_remote().await;
                self.show_remote(entries).await;
            }
            ShellCommand::LocalList => {
                let title = format!("本地 {}", engine.local_dir().await.display());
                self.show_local(engine.local_entries().await, title);
            }
            ShellCommand::LocalEnter(name) => {
                let entries = engine.descend_local(&name).await;
                let title = format!("本地 {}", engine.local_dir().await.display());
                self.show_local(entries, title);
            }
            ShellCommand::LocalUp => {
                let entries = engine.ascend_local().await;
                let title = format!("本地 {}", engine.local_dir().await.display());
                self.show_local(entries, title);
            }
            ShellCommand::Push(name) => self.sync(SyncOperation::PushItem { name }).await,
            ShellCommand::Pull(name) => {
                let entry = self
                    .remote_entries
                    .iter()
                    .find(|e| (e.is_file() || e.is_folder()) && e.name() == name)
                    .cloned();
                match entry {
                    Some(entry) => self.sync(SyncOperation::PullItem { entry }).await,
                    None => println!("当前远程层级中没有: {}（先执行 ls）", name),
                }
            }
            ShellCommand::PushRoot => self.sync(SyncOperation::PushRoot).await,
            ShellCommand::PullRoot => self.sync(SyncOperation::PullRoot).await,
            ShellCommand::Help => println!("{}", HELP),
            ShellCommand::Quit => return false,
        }
        true
    }
}

/// 运行交互式终端直到输入结束或 quit
pub async fn run(worker: SyncWorker) -> Result<()> {
    let roots = worker.engine().roots().clone();
    println!(
        "本地根: {}  <->  远程根: {}/{}",
        roots.local_root().display(),
        worker.engine().store_name(),
        roots.remote_root()
    );
    println!("输入 help 查看命令");

    let mut shell = Shell {
        worker,
        remote_entries: Vec::new(),
    };
    shell.handle(ShellCommand::RemoteList).await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        let _ = std::io::stdout().flush();

        let Some(line) = lines.next_line().await? else {
            break;
        };
        match ShellCommand::parse(&line) {
            Ok(Some(command)) => {
                if !shell.handle(command).await {
                    break;
                }
            }
            Ok(None) => {}
            Err(e) => println!("{}", e),
        }
    }

    Ok(())
}
