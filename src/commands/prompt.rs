//! 终端交互提示

use crate::core::{ConflictInfo, ConflictPrompt, ConflictResolution, ConfirmPrompt, Confirmation};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;

/// 从标准输入读取回答，标准输入关闭时视为取消
pub struct TerminalPrompt {
    lines: Mutex<Lines<BufReader<Stdin>>>,
    assume_yes: bool,
}

impl TerminalPrompt {
    pub fn new() -> Self {
        Self {
            lines: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
            assume_yes: false,
        }
    }

    /// `--yes` 只跳过允许自动确认的问题，其余仍然询问
    pub fn with_assume_yes(mut self, assume_yes: bool) -> Self {
        self.assume_yes = assume_yes;
        self
    }

    async fn ask_line(&self, question: &str) -> Option<String> {
        eprint!("{} ", question);
        let _ = std::io::stderr().flush();
        let mut lines = self.lines.lock().await;
        match lines.next_line().await {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!("读取输入失败: {}", e);
                None
            }
        }
    }
}

impl Default for TerminalPrompt {
    fn default() -> Self {
        Self::new()
    }
}

/// 格式化毫秒时间戳
pub fn format_time(ts: i64) -> String {
    DateTime::from_timestamp_millis(ts)
        .map(|d| d.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S%.3f").to_string())
        .unwrap_or_else(|| ts.to_string())
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes" | "是")
}

#[async_trait]
impl ConfirmPrompt for TerminalPrompt {
    async fn confirm(&self, what: Confirmation) -> bool {
        if self.assume_yes && what.allows_assume_yes() {
            tracing::info!("已通过 --yes 确认: {:?}", what);
            return true;
        }
        let question = format!("{} [y/N]", what.message());
        self.ask_line(&question)
            .await
            .map(|a| is_yes(&a))
            .unwrap_or(false)
    }
}

#[async_trait]
impl ConflictPrompt for TerminalPrompt {
    async fn ask(&self, info: ConflictInfo) -> Option<ConflictResolution> {
        eprintln!("本地和远程数据都在上次同步后被修改过：");
        eprintln!("  本地修改:   {}", format_time(info.local));
        eprintln!("  远程修改:   {}", format_time(info.remote));
        eprintln!("  上次同步:   {}", format_time(info.last_sync));
        let answer = self
            .ask_line("使用哪一方的数据？[l]本地 / [r]远程 / 其他键取消:")
            .await?;
        ConflictResolution::parse(&answer)
    }
}
