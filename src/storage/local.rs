//! 本地快照文件
//!
//! 宿主程序把完整状态保存为一个 JSON 文件，同步时读取，导入时整体替换。

use crate::core::{Snapshot, SnapshotImporter, SnapshotSource};
use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

pub struct LocalSnapshotFile {
    path: PathBuf,
}

impl LocalSnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SnapshotSource for LocalSnapshotFile {
    async fn current(&self) -> Result<Snapshot> {
        match fs::read(&self.path).await {
            Ok(data) => Snapshot::from_bytes(&data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("本地快照不存在，视为空数据: {:?}", self.path);
                Ok(Snapshot::new(0))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl SnapshotImporter for LocalSnapshotFile {
    async fn import_complete(&self, snapshot: Snapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // 使用临时文件写入，然后原子重命名
        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, snapshot.to_bytes()?).await?;
        fs::rename(&temp_path, &self.path).await?;

        tracing::info!(
            "已导入快照到 {:?} (lastLocalSyncModelChange={})",
            self.path,
            snapshot.last_local_sync_model_change
        );
        Ok(())
    }
}
