//! 应用状态快照

use super::Timestamp;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// 完整的应用状态快照
///
/// 同步逻辑只读取 `last_local_sync_model_change`，其余字段原样保留。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// 最近一次本地修改时间（毫秒），每次本地修改单调递增
    #[serde(default)]
    pub last_local_sync_model_change: Timestamp,
    #[serde(flatten)]
    pub data: serde_json::Map<String, serde_json::Value>,
}

impl Snapshot {
    pub fn new(last_local_sync_model_change: Timestamp) -> Self {
        Self {
            last_local_sync_model_change,
            data: serde_json::Map::new(),
        }
    }

    pub fn with_field(mut self, key: &str, value: serde_json::Value) -> Self {
        self.data.insert(key.to_string(), value);
        self
    }

    /// 本地历史为空（通常是破坏性重置之后）
    pub fn has_no_history(&self) -> bool {
        self.last_local_sync_model_change == 0
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(data)?)
    }
}

/// 本地快照来源（只读）
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn current(&self) -> Result<Snapshot>;
}

/// 本地快照导入器，整体替换本地状态
#[async_trait]
pub trait SnapshotImporter: Send + Sync {
    async fn import_complete(&self, snapshot: Snapshot) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_keeps_unknown_fields() {
        let raw = br#"{"lastLocalSyncModelChange":1234,"tasks":[1,2],"project":{"id":"p"}}"#;
        let snap = Snapshot::from_bytes(raw).unwrap();
        assert_eq!(snap.last_local_sync_model_change, 1234);
        assert_eq!(snap.data["tasks"], serde_json::json!([1, 2]));

        let back = Snapshot::from_bytes(&snap.to_bytes().unwrap()).unwrap();
        assert_eq!(back, snap);
    }

    #[test]
    fn test_missing_change_time_is_empty_history() {
        let snap = Snapshot::from_bytes(br#"{"tasks":[]}"#).unwrap();
        assert!(snap.has_no_history());
        assert!(!Snapshot::new(1).has_no_history());
    }
}
