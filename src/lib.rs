use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;

pub mod commands;
pub mod config;
pub mod core;
pub mod db;
pub mod error;
pub mod logging;
pub mod storage;

pub use config::{AppConfig, ErrorMode, RemoteConfig, RemoteType, SyncSettings};
pub use core::{SyncCoordinator, SyncOutcome, UpdateCheck};
pub use error::{StoreError, SyncError, SyncResult};

use crate::core::{ConflictPrompt, ConfirmPrompt};
use crate::db::SqliteCursorStore;
use crate::storage::LocalSnapshotFile;

/// 应用状态，在各命令之间共享
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<SqlitePool>,
    pub config_dir: PathBuf,
    pub config: AppConfig,
}

impl AppState {
    pub async fn new(data_dir: Option<PathBuf>) -> anyhow::Result<Self> {
        let config_dir = match data_dir {
            Some(dir) => dir,
            None => resolve_config_dir(),
        };
        std::fs::create_dir_all(&config_dir)?;

        let config = AppConfig::load(&config_dir);
        let db = db::open_pool(&config_dir.join("snapsync.db")).await?;

        Ok(Self {
            db: Arc::new(db),
            config_dir,
            config,
        })
    }

    pub fn cursor_store(&self) -> Arc<SqliteCursorStore> {
        Arc::new(SqliteCursorStore::new(self.db.clone()))
    }

    /// 按配置组装同步协调器
    ///
    /// 远程未启用或无法创建时，就绪信号立即关闭，同步返回 `NotReady`。
    pub fn build_coordinator(
        &self,
        snapshot_path: &Path,
        conflict_prompt: Arc<dyn ConflictPrompt>,
        confirm_prompt: Arc<dyn ConfirmPrompt>,
    ) -> anyhow::Result<SyncCoordinator> {
        let remote = storage::create_remote_store(&self.config.remote)?;
        let snapshot = Arc::new(LocalSnapshotFile::new(snapshot_path));

        let (ready_tx, ready_rx) = watch::channel(self.config.remote.enabled);
        if !self.config.remote.enabled {
            tracing::warn!("远程同步未启用");
        }
        drop(ready_tx);

        Ok(SyncCoordinator::new(remote, self.cursor_store(), snapshot.clone(), snapshot)
            .with_settings(self.config.sync.clone())
            .with_conflict_prompt(conflict_prompt)
            .with_confirm_prompt(confirm_prompt)
            .with_readiness(ready_rx))
    }

    /// 清理资源（程序退出时调用）
    pub async fn cleanup(&self) {
        tracing::debug!("关闭数据库连接池...");
        self.db.close().await;
    }
}

/// 获取数据目录，支持在默认配置文件中通过 data_path 自定义
pub fn resolve_config_dir() -> PathBuf {
    let default_config_dir = dirs::config_dir()
        .map(|p| p.join("snapsync"))
        .unwrap_or_else(|| PathBuf::from(".snapsync"));

    std::fs::read_to_string(default_config_dir.join("config.json"))
        .ok()
        .and_then(|content| serde_json::from_str::<serde_json::Value>(&content).ok())
        .and_then(|config| config.get("data_path")?.as_str().map(PathBuf::from))
        .filter(|p| p.exists() && p.is_dir())
        .inspect(|p| tracing::debug!("使用自定义数据路径: {:?}", p))
        .unwrap_or(default_config_dir)
}

pub mod dirs {
    use std::path::PathBuf;

    pub fn config_dir() -> Option<PathBuf> {
        if cfg!(target_os = "windows") {
            std::env::var("APPDATA").ok().map(PathBuf::from)
        } else if cfg!(target_os = "macos") {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join("Library").join("Application Support"))
        } else {
            // Linux
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join(".config"))
        }
    }
}
