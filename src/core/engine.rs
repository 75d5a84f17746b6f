//! 同步协调器
//!
//! 每次调用 `sync()` 执行一次完整的同步尝试：读取游标、查询远程元数据、
//! 判断方向、执行上传/下载/提示中的一个分支，最后更新游标。
//! 任何失败都不会修改游标。

use crate::config::{ErrorMode, SyncSettings};
use crate::core::conflict::{ConflictInfo, ConflictPrompt, ConflictResolution, ConfirmPrompt, Confirmation, PolicyPrompt};
use crate::core::cursor::{CursorStore, SyncCursor};
use crate::core::notify::{Notifier, TracingNotifier};
use crate::core::snapshot::{Snapshot, SnapshotImporter, SnapshotSource};
use crate::core::update_check::{is_local_only_change, CheckInput, UpdateCheck};
use crate::core::Timestamp;
use crate::error::{StoreError, SyncError, SyncResult};
use crate::storage::{RemoteDocument, RemoteStore, Revision};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn};

/// 一次同步尝试的结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum SyncOutcome {
    /// 远程版本未变且本地无修改，未下载
    Unchanged,
    /// 下载后确认两边一致
    InSync,
    /// 已上传本地数据
    Uploaded {
        revision: Revision,
        /// 远程文档此前不存在
        initial: bool,
        /// 跳过了并发检查
        forced: bool,
    },
    /// 已导入远程数据
    Downloaded { revision: Revision },
    /// 只推进了游标时间
    CursorAdvanced { last_sync: Timestamp },
    /// 需要用户决定但未处理（对话框关闭或拒绝重试）
    Skipped { check: UpdateCheck },
}

/// 远程数据未反映上次同步时，确认后最多重新执行的次数
pub const MAX_STALE_RETRIES: usize = 3;

/// 单次尝试内部的结果，`Retry` 在持锁状态下重新执行
enum Step {
    Done(SyncOutcome),
    Retry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UploadMode {
    /// 远程不存在，仅创建
    Initial,
    /// 以游标版本为前置条件
    Checked,
    /// 强制覆盖
    Force,
}

/// 同步协调器
pub struct SyncCoordinator {
    remote: Arc<dyn RemoteStore>,
    cursor: Arc<dyn CursorStore>,
    source: Arc<dyn SnapshotSource>,
    importer: Arc<dyn SnapshotImporter>,
    conflict_prompt: Arc<dyn ConflictPrompt>,
    confirm_prompt: Arc<dyn ConfirmPrompt>,
    notifier: Arc<dyn Notifier>,
    readiness: watch::Receiver<bool>,
    settings: SyncSettings,
    /// 同一时间只允许一次尝试读写游标
    in_flight: Mutex<()>,
}

impl SyncCoordinator {
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        cursor: Arc<dyn CursorStore>,
        source: Arc<dyn SnapshotSource>,
        importer: Arc<dyn SnapshotImporter>,
    ) -> Self {
        let prompt = Arc::new(PolicyPrompt::declining());
        let (_, readiness) = watch::channel(true);
        Self {
            remote,
            cursor,
            source,
            importer,
            conflict_prompt: prompt.clone(),
            confirm_prompt: prompt,
            notifier: Arc::new(TracingNotifier),
            readiness,
            settings: SyncSettings::default(),
            in_flight: Mutex::new(()),
        }
    }

    pub fn with_settings(mut self, settings: SyncSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_conflict_prompt(mut self, prompt: Arc<dyn ConflictPrompt>) -> Self {
        self.conflict_prompt = prompt;
        self
    }

    pub fn with_confirm_prompt(mut self, prompt: Arc<dyn ConfirmPrompt>) -> Self {
        self.confirm_prompt = prompt;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// 设置就绪信号（已配置、已认证、宿主数据已加载）
    pub fn with_readiness(mut self, readiness: watch::Receiver<bool>) -> Self {
        self.readiness = readiness;
        self
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// 执行一次同步，如有其他尝试正在进行则等待其结束
    pub async fn sync(&self) -> SyncResult<SyncOutcome> {
        self.wait_ready().await?;
        let _guard = self.in_flight.lock().await;
        self.run_locked().await
    }

    /// 执行一次同步，如有其他尝试正在进行则立即返回 `Busy`
    pub async fn try_sync(&self) -> SyncResult<SyncOutcome> {
        self.wait_ready().await?;
        let _guard = self.in_flight.try_lock().map_err(|_| SyncError::Busy)?;
        self.run_locked().await
    }

    async fn run_locked(&self) -> SyncResult<SyncOutcome> {
        let mut retries = 0;
        let result = loop {
            match self.attempt().await {
                Ok(Step::Done(outcome)) => break Ok(outcome),
                Ok(Step::Retry) if retries < MAX_STALE_RETRIES => {
                    retries += 1;
                    info!("重新执行同步 ({}/{})", retries, MAX_STALE_RETRIES);
                }
                Ok(Step::Retry) => {
                    warn!("远程数据仍未更新，已重试 {} 次，放弃本次同步", retries);
                    break Ok(SyncOutcome::Skipped {
                        check: UpdateCheck::RemoteNotUpToDateDespiteSync,
                    });
                }
                Err(e) => break Err(e),
            }
        };

        match &result {
            Ok(outcome) => info!("同步完成: {:?}", outcome),
            Err(e) => self.handle_error(e),
        }
        result
    }

    /// 等待就绪，超时则放弃
    async fn wait_ready(&self) -> SyncResult<()> {
        let mut readiness = self.readiness.clone();
        let timeout = Duration::from_secs(self.settings.ready_timeout_secs);

        let res = match tokio::time::timeout(timeout, readiness.wait_for(|ready| *ready)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(_)) => Err(SyncError::NotReady("readiness source closed".to_string())),
            Err(_) => Err(SyncError::NotReady(format!(
                "remote not ready within {}s",
                timeout.as_secs()
            ))),
        };
        res
    }

    fn handle_error(&self, e: &SyncError) {
        if e.is_declined() {
            info!("同步已取消: {}", e);
            return;
        }
        if !e.is_user_visible() {
            debug!("同步未执行: {}", e);
            return;
        }
        if matches!(e, SyncError::Transport(_)) && self.settings.error_mode == ErrorMode::Debug {
            // 调试模式下交给调用方处理
            error!("同步出现未知错误: {}", e);
            return;
        }
        self.notifier.report(e);
    }

    async fn attempt(&self) -> SyncResult<Step> {
        let path = self.settings.document_path.as_str();

        self.cursor
            .set_last_attempt(chrono::Utc::now().timestamp_millis())
            .await
            .map_err(SyncError::Cursor)?;

        let cursor = self.cursor.get().await.map_err(SyncError::Cursor)?;

        // 预检查 1：文件是否存在、认证和连接是否正常
        let meta = match self.remote.get_metadata(path).await {
            Ok(meta) => meta,
            Err(StoreError::NotFound(_)) => {
                info!("远程文件不存在，首次上传: {}", path);
                let local = self.local_snapshot().await?;
                return self
                    .upload(&local, &cursor, UploadMode::Initial)
                    .await
                    .map(Step::Done);
            }
            Err(e) => return Err(e.into()),
        };

        // 预检查 2：版本是否变化
        let mut local = None;
        if cursor.last_known_revision.as_ref() == Some(&meta.revision) {
            debug!("远程版本未变化: {}", meta.revision);
            let snapshot = self.local_snapshot().await?;
            if snapshot.last_local_sync_model_change == cursor.last_sync_timestamp {
                info!("没有需要同步的本地变更");
                return Ok(Step::Done(SyncOutcome::Unchanged));
            }
            local = Some(snapshot);
        }
        let local = match local {
            Some(s) => s,
            None => self.local_snapshot().await?,
        };

        if local.has_no_history() && !self.confirm(Confirmation::EmptyLocalHistory).await {
            return Err(SyncError::DestructiveGuardDeclined);
        }

        // 预检查 3：只根据元数据判断（远程时间只有秒级精度）
        if is_local_only_change(
            local.last_local_sync_model_change,
            cursor.last_sync_timestamp,
            meta.client_modified_at,
        ) {
            info!("仅本地有变更，直接上传");
            return self
                .upload(&local, &cursor, UploadMode::Checked)
                .await
                .map(Step::Done);
        }

        // 完整判断
        let remote = self.remote.download(path).await?;
        let input = CheckInput {
            local: local.last_local_sync_model_change,
            last_sync: cursor.last_sync_timestamp,
            remote: remote.snapshot.last_local_sync_model_change,
        };
        let check = input.classify();
        info!(
            "更新检查: {} (local={}, last_sync={}, remote={})",
            check, input.local, input.last_sync, input.remote
        );

        let outcome = match check {
            UpdateCheck::InSync => SyncOutcome::InSync,
            UpdateCheck::LocalUpdateRequired => self.import(remote).await?,
            UpdateCheck::RemoteUpdateRequired => {
                self.upload(&local, &cursor, UploadMode::Checked).await?
            }
            UpdateCheck::RemoteNotUpToDateDespiteSync => {
                warn!("远程数据没有反映上次同步");
                if self.confirm(Confirmation::RetryStaleRemote).await {
                    return Ok(Step::Retry);
                }
                SyncOutcome::Skipped { check }
            }
            UpdateCheck::DataDiverged => {
                warn!("本地和远程数据都已修改");
                let info = ConflictInfo {
                    local: input.local,
                    remote: input.remote,
                    last_sync: input.last_sync,
                };
                match self.conflict_prompt.ask(info).await {
                    Some(ConflictResolution::UseLocal) => {
                        info!("冲突处理: 使用本地数据");
                        self.upload(&local, &cursor, UploadMode::Force).await?
                    }
                    Some(ConflictResolution::UseRemote) => {
                        info!("冲突处理: 使用远程数据");
                        self.import(remote).await?
                    }
                    None => {
                        info!("冲突未处理");
                        SyncOutcome::Skipped { check }
                    }
                }
            }
            UpdateCheck::LastSyncNotUpToDate => {
                self.cursor
                    .set_last_sync(input.local)
                    .await
                    .map_err(SyncError::Cursor)?;
                info!("两边一致，更新上次同步时间为 {}", input.local);
                SyncOutcome::CursorAdvanced {
                    last_sync: input.local,
                }
            }
            UpdateCheck::ErrorLastSyncNewerThanLocal | UpdateCheck::UnexpectedState => {
                self.resolve_anomaly(&local, &cursor, remote, input).await?
            }
        };

        Ok(Step::Done(outcome))
    }

    /// 游标状态异常，只有在明确确认后才按较新的一方处理
    async fn resolve_anomaly(
        &self,
        local: &Snapshot,
        cursor: &SyncCursor,
        remote: RemoteDocument,
        input: CheckInput,
    ) -> SyncResult<SyncOutcome> {
        error!(
            "同步状态异常: 上次同步时间 {} 与本地 {} / 远程 {} 不一致，可能被手动修改过",
            input.last_sync, input.local, input.remote
        );

        if input.local > input.remote {
            if self.confirm(Confirmation::ForceUploadAnyway).await {
                return self.upload(local, cursor, UploadMode::Force).await;
            }
        } else if self.confirm(Confirmation::ForceImportAnyway).await {
            return self.import(remote).await;
        }

        Err(SyncError::AnomalyUnconfirmed {
            local: input.local,
            last_sync: input.last_sync,
        })
    }

    async fn confirm(&self, what: Confirmation) -> bool {
        let answer = self.confirm_prompt.confirm(what).await;
        debug!("确认 {:?}: {}", what, answer);
        answer
    }

    async fn local_snapshot(&self) -> SyncResult<Snapshot> {
        self.source.current().await.map_err(SyncError::Snapshot)
    }

    /// 上传成功后游标记录新版本和上传的时间
    async fn upload(
        &self,
        local: &Snapshot,
        cursor: &SyncCursor,
        mode: UploadMode,
    ) -> SyncResult<SyncOutcome> {
        let expected = match mode {
            UploadMode::Initial => None,
            UploadMode::Checked | UploadMode::Force => cursor.last_known_revision.as_ref(),
        };
        let force = mode == UploadMode::Force;
        let client_modified = local.last_local_sync_model_change;

        let revision = self
            .remote
            .upload(
                &self.settings.document_path,
                local,
                client_modified,
                expected,
                force,
            )
            .await?;

        self.cursor
            .advance(&revision, client_modified)
            .await
            .map_err(SyncError::Cursor)?;

        info!("已上传本地数据 (rev={}, force={})", revision, force);
        Ok(SyncOutcome::Uploaded {
            revision,
            initial: mode == UploadMode::Initial,
            forced: force,
        })
    }

    /// 导入成功后才推进游标
    async fn import(&self, remote: RemoteDocument) -> SyncResult<SyncOutcome> {
        let RemoteDocument { snapshot, revision } = remote;
        let timestamp = snapshot.last_local_sync_model_change;

        self.importer
            .import_complete(snapshot)
            .await
            .map_err(SyncError::Import)?;

        self.cursor
            .advance(&revision, timestamp)
            .await
            .map_err(SyncError::Cursor)?;

        info!("已导入远程数据 (rev={})", revision);
        Ok(SyncOutcome::Downloaded { revision })
    }
}
