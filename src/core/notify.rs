use crate::error::SyncError;
use std::sync::Mutex;

/// 用户可见的错误通知（发出即忘）
pub trait Notifier: Send + Sync {
    fn report(&self, error: &SyncError);
}

/// 写入日志的通知实现
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn report(&self, error: &SyncError) {
        match error {
            SyncError::Auth(_) => tracing::error!("同步认证失败，请重新授权: {}", error),
            _ => tracing::error!("同步失败: {}", error),
        }
    }
}

/// 收集通知内容，便于宿主程序稍后展示
#[derive(Debug, Default)]
pub struct CollectingNotifier {
    messages: Mutex<Vec<String>>,
}

impl CollectingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default()
    }
}

impl Notifier for CollectingNotifier {
    fn report(&self, error: &SyncError) {
        if let Ok(mut m) = self.messages.lock() {
            m.push(error.to_string());
        }
    }
}
