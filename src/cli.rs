use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "snapsync")]
#[command(about = "Sync a local application snapshot with a remote blob store")]
pub struct Cli {
    /// 数据目录（配置、数据库和日志）
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// 执行一次同步
    Sync {
        /// 本地快照文件
        #[arg(long)]
        snapshot: PathBuf,
        /// 不询问，按配置的策略处理
        #[arg(long)]
        non_interactive: bool,
        /// 本地数据为空时仍继续同步（重试和游标异常仍需确认）
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// 查看本地同步游标
    Status,
    /// 检测远程存储连接
    Check,
}
