//! 基于 opendal 的远程文档存储
//!
//! 文档写在 `path`，旁边的 `path.meta.json` 记录版本号和客户端修改时间。

use super::{RemoteDocument, RemoteMetadata, RemoteStore, Revision, IO_TIMEOUT_SECS, OP_TIMEOUT_SECS};
use crate::core::{Snapshot, Timestamp};
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use opendal::{layers::TimeoutLayer, Operator};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 元数据旁路文件
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SidecarMeta {
    rev: Revision,
    client_modified: DateTime<Utc>,
}

/// 通用对象存储上的文档存储
///
/// 版本前置条件通过先读旁路文件再写入实现，两步之间没有锁，
/// 不是原子操作。
pub struct BlobRemoteStore {
    operator: Operator,
    name: String,
}

impl BlobRemoteStore {
    pub fn new(operator: Operator, name: String) -> Self {
        // 添加超时层
        let operator = operator.layer(
            TimeoutLayer::default()
                .with_timeout(Duration::from_secs(OP_TIMEOUT_SECS))
                .with_io_timeout(Duration::from_secs(IO_TIMEOUT_SECS)),
        );
        Self { operator, name }
    }

    /// 内存存储（测试和试运行）
    pub fn memory() -> anyhow::Result<Self> {
        let operator = Operator::new(opendal::services::Memory::default())?.finish();
        Ok(Self::new(operator, "memory://".to_string()))
    }

    fn meta_path(path: &str) -> String {
        format!("{}.meta.json", path)
    }

    async fn read_meta(&self, path: &str) -> Result<SidecarMeta, StoreError> {
        let data = self.operator.read(&Self::meta_path(path)).await?;
        serde_json::from_slice(&data.to_vec())
            .map_err(|e| StoreError::Transport(format!("invalid metadata for {}: {}", path, e)))
    }

    /// 当前版本，文档不存在时为 None
    async fn current_revision(&self, path: &str) -> Result<Option<Revision>, StoreError> {
        match self.read_meta(path).await {
            Ok(meta) => Ok(Some(meta.rev)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// 远程只保留到秒
fn truncate_to_seconds(ts: Timestamp) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp(ts.div_euclid(1000), 0)
        .ok_or_else(|| StoreError::Transport(format!("client_modified out of range: {}", ts)))
}

#[async_trait]
impl RemoteStore for BlobRemoteStore {
    async fn get_metadata(&self, path: &str) -> Result<RemoteMetadata, StoreError> {
        let meta = self.read_meta(path).await?;
        Ok(RemoteMetadata {
            revision: meta.rev,
            client_modified_at: meta.client_modified.timestamp_millis(),
        })
    }

    async fn download(&self, path: &str) -> Result<RemoteDocument, StoreError> {
        let meta = self.read_meta(path).await?;
        let data = self.operator.read(path).await?;
        let snapshot = Snapshot::from_bytes(&data.to_vec())
            .map_err(|e| StoreError::Transport(format!("invalid remote snapshot {}: {}", path, e)))?;

        tracing::debug!("已下载 {} (rev={}, {} 字节)", path, meta.rev, data.len());

        Ok(RemoteDocument {
            snapshot,
            revision: meta.rev,
        })
    }

    async fn upload(
        &self,
        path: &str,
        snapshot: &Snapshot,
        client_modified: Timestamp,
        expected_revision: Option<&Revision>,
        force_overwrite: bool,
    ) -> Result<Revision, StoreError> {
        if !force_overwrite {
            let current = self.current_revision(path).await?;
            if current.as_ref() != expected_revision {
                return Err(StoreError::ConcurrencyConflict {
                    expected: expected_revision.map(|r| r.to_string()),
                    actual: current.map(String::from),
                });
            }
        }

        let data = snapshot
            .to_bytes()
            .map_err(|e| StoreError::Transport(format!("failed to encode snapshot: {}", e)))?;
        let meta = SidecarMeta {
            rev: Revision::generate(),
            client_modified: truncate_to_seconds(client_modified)?,
        };
        let meta_data = serde_json::to_vec(&meta)
            .map_err(|e| StoreError::Transport(format!("failed to encode metadata: {}", e)))?;

        // 先写数据再写元数据，元数据写入成功才算新版本
        self.operator.write(path, data).await?;
        self.operator.write(&Self::meta_path(path), meta_data).await?;

        tracing::debug!("已上传 {} (rev={}, force={})", path, meta.rev, force_overwrite);
        Ok(meta.rev)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PATH: &str = "sync/sync-data.json";

    #[tokio::test]
    async fn test_missing_document_is_not_found() {
        let store = BlobRemoteStore::memory().unwrap();
        let err = store.get_metadata(PATH).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_upload_then_metadata_loses_millis() {
        let store = BlobRemoteStore::memory().unwrap();
        let snap = Snapshot::new(1_700_000_123_456);

        let rev = store
            .upload(PATH, &snap, snap.last_local_sync_model_change, None, false)
            .await
            .unwrap();

        let meta = store.get_metadata(PATH).await.unwrap();
        assert_eq!(meta.revision, rev);
        assert_eq!(meta.client_modified_at, 1_700_000_123_000);

        let doc = store.download(PATH).await.unwrap();
        assert_eq!(doc.revision, rev);
        // 文档内容本身保留毫秒
        assert_eq!(doc.snapshot.last_local_sync_model_change, 1_700_000_123_456);
    }

    #[tokio::test]
    async fn test_upload_precondition() {
        let store = BlobRemoteStore::memory().unwrap();
        let first = store
            .upload(PATH, &Snapshot::new(1000), 1000, None, false)
            .await
            .unwrap();

        // 文档已存在时不允许仅创建
        let err = store
            .upload(PATH, &Snapshot::new(2000), 2000, None, false)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ConcurrencyConflict { .. }));

        let stale = Revision::new("stale").unwrap();
        let err = store
            .upload(PATH, &Snapshot::new(2000), 2000, Some(&stale), false)
            .await
            .unwrap_err();
        match err {
            StoreError::ConcurrencyConflict { expected, actual } => {
                assert_eq!(expected.as_deref(), Some("stale"));
                assert_eq!(actual, Some(first.to_string()));
            }
            e => panic!("unexpected error: {e:?}"),
        }

        let second = store
            .upload(PATH, &Snapshot::new(2000), 2000, Some(&first), false)
            .await
            .unwrap();
        assert_ne!(first, second);

        // 强制覆盖跳过检查
        let third = store
            .upload(PATH, &Snapshot::new(3000), 3000, Some(&stale), true)
            .await
            .unwrap();
        assert_eq!(store.get_metadata(PATH).await.unwrap().revision, third);
    }
}
