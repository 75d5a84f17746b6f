//! 本地同步游标
//!
//! 记录最后一次确认同步的远程版本和时间。只有同步协调器会写入。

use super::Timestamp;
use crate::storage::Revision;
use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Mutex;

/// 游标键名，跨版本保持稳定
pub const KEY_LAST_REVISION: &str = "last_local_revision";
pub const KEY_LAST_SYNC: &str = "local_last_sync";
pub const KEY_LAST_SYNC_CHECK: &str = "local_last_sync_check";

/// 同步游标
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncCursor {
    /// 最后已知的远程版本，`None` 表示从未同步
    pub last_known_revision: Option<Revision>,
    /// 最后一次确认同步时快照的修改时间
    pub last_sync_timestamp: Timestamp,
    /// 最后一次尝试同步的时间（仅用于诊断）
    pub last_attempt_timestamp: Option<Timestamp>,
}

/// 游标存储接口
#[async_trait]
pub trait CursorStore: Send + Sync {
    async fn get(&self) -> Result<SyncCursor>;

    async fn set_revision(&self, revision: &Revision) -> Result<()>;

    async fn set_last_sync(&self, timestamp: Timestamp) -> Result<()>;

    async fn set_last_attempt(&self, timestamp: Timestamp) -> Result<()>;

    /// 上传或导入成功后一起推进版本和时间
    async fn advance(&self, revision: &Revision, timestamp: Timestamp) -> Result<()> {
        self.set_revision(revision).await?;
        self.set_last_sync(timestamp).await
    }
}

/// 内存游标存储
#[derive(Debug, Default)]
pub struct MemoryCursorStore {
    inner: Mutex<SyncCursor>,
}

impl MemoryCursorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cursor(cursor: SyncCursor) -> Self {
        Self {
            inner: Mutex::new(cursor),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, SyncCursor>> {
        self.inner
            .lock()
            .map_err(|_| anyhow::anyhow!("cursor lock poisoned"))
    }
}

#[async_trait]
impl CursorStore for MemoryCursorStore {
    async fn get(&self) -> Result<SyncCursor> {
        Ok(self.lock()?.clone())
    }

    async fn set_revision(&self, revision: &Revision) -> Result<()> {
        self.lock()?.last_known_revision = Some(revision.clone());
        Ok(())
    }

    async fn set_last_sync(&self, timestamp: Timestamp) -> Result<()> {
        self.lock()?.last_sync_timestamp = timestamp;
        Ok(())
    }

    async fn set_last_attempt(&self, timestamp: Timestamp) -> Result<()> {
        self.lock()?.last_attempt_timestamp = Some(timestamp);
        Ok(())
    }
}
