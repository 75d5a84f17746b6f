//! 集成测试共用的内存实现

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use snapsync_lib::core::{
    CollectingNotifier, ConflictInfo, ConflictPrompt, ConflictResolution, ConfirmPrompt,
    Confirmation, MemoryCursorStore, Snapshot, SnapshotImporter, SnapshotSource, SyncCursor,
    Timestamp,
};
use snapsync_lib::storage::{RemoteDocument, RemoteMetadata, RemoteStore, Revision};
use snapsync_lib::{ErrorMode, StoreError, SyncCoordinator, SyncSettings};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

pub fn rev(s: &str) -> Revision {
    Revision::new(s).unwrap()
}

pub fn cursor(revision: Option<&str>, last_sync: Timestamp) -> SyncCursor {
    SyncCursor {
        last_known_revision: revision.map(rev),
        last_sync_timestamp: last_sync,
        last_attempt_timestamp: None,
    }
}

#[derive(Debug, Clone)]
pub struct UploadCall {
    pub client_modified: Timestamp,
    pub expected: Option<String>,
    pub force: bool,
}

#[derive(Default)]
struct RemoteState {
    doc: Option<(Snapshot, Revision)>,
    /// 元数据中报告的修改时间（默认取文档时间并截断到秒）
    client_modified_override: Option<Timestamp>,
    metadata_error: Option<StoreError>,
    upload_error: Option<StoreError>,
    metadata_calls: usize,
    downloads: usize,
    uploads: Vec<UploadCall>,
    next_rev: usize,
}

/// 按脚本返回结果并记录调用的远程存储
#[derive(Default)]
pub struct ScriptedRemote {
    state: Mutex<RemoteState>,
}

impl ScriptedRemote {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_doc(remote: Timestamp, revision: &str) -> Self {
        let s = Self::default();
        s.state.lock().unwrap().doc = Some((Snapshot::new(remote), rev(revision)));
        s
    }

    pub fn report_client_modified(self, ts: Timestamp) -> Self {
        self.state.lock().unwrap().client_modified_override = Some(ts);
        self
    }

    pub fn fail_metadata(self, err: StoreError) -> Self {
        self.state.lock().unwrap().metadata_error = Some(err);
        self
    }

    pub fn fail_upload(self, err: StoreError) -> Self {
        self.state.lock().unwrap().upload_error = Some(err);
        self
    }

    pub fn metadata_calls(&self) -> usize {
        self.state.lock().unwrap().metadata_calls
    }

    pub fn downloads(&self) -> usize {
        self.state.lock().unwrap().downloads
    }

    pub fn uploads(&self) -> Vec<UploadCall> {
        self.state.lock().unwrap().uploads.clone()
    }

    pub fn current_revision(&self) -> Option<Revision> {
        self.state.lock().unwrap().doc.as_ref().map(|(_, r)| r.clone())
    }
}

#[async_trait]
impl RemoteStore for ScriptedRemote {
    async fn get_metadata(&self, path: &str) -> Result<RemoteMetadata, StoreError> {
        let mut s = self.state.lock().unwrap();
        s.metadata_calls += 1;
        if let Some(err) = s.metadata_error.take() {
            return Err(err);
        }
        let override_ts = s.client_modified_override;
        match &s.doc {
            Some((snap, revision)) => Ok(RemoteMetadata {
                revision: revision.clone(),
                client_modified_at: override_ts
                    .unwrap_or(snap.last_local_sync_model_change.div_euclid(1000) * 1000),
            }),
            None => Err(StoreError::NotFound(path.to_string())),
        }
    }

    async fn download(&self, path: &str) -> Result<RemoteDocument, StoreError> {
        let mut s = self.state.lock().unwrap();
        s.downloads += 1;
        match &s.doc {
            Some((snapshot, revision)) => Ok(RemoteDocument {
                snapshot: snapshot.clone(),
                revision: revision.clone(),
            }),
            None => Err(StoreError::NotFound(path.to_string())),
        }
    }

    async fn upload(
        &self,
        _path: &str,
        snapshot: &Snapshot,
        client_modified: Timestamp,
        expected_revision: Option<&Revision>,
        force_overwrite: bool,
    ) -> Result<Revision, StoreError> {
        let mut s = self.state.lock().unwrap();
        s.uploads.push(UploadCall {
            client_modified,
            expected: expected_revision.map(|r| r.to_string()),
            force: force_overwrite,
        });
        if let Some(err) = s.upload_error.take() {
            return Err(err);
        }
        s.next_rev += 1;
        let new_rev = rev(&format!("uploaded-{}", s.next_rev));
        s.doc = Some((snapshot.clone(), new_rev.clone()));
        s.client_modified_override = None;
        Ok(new_rev)
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// 宿主程序的内存快照
pub struct MemoryHost {
    snapshot: Mutex<Snapshot>,
    imported: Mutex<Vec<Snapshot>>,
    fail_import: bool,
}

impl MemoryHost {
    pub fn new(local: Timestamp) -> Self {
        Self {
            snapshot: Mutex::new(Snapshot::new(local)),
            imported: Mutex::new(Vec::new()),
            fail_import: false,
        }
    }

    pub fn failing_import(local: Timestamp) -> Self {
        Self {
            fail_import: true,
            ..Self::new(local)
        }
    }

    /// 模拟一次本地修改
    pub fn touch(&self, local: Timestamp) {
        self.snapshot.lock().unwrap().last_local_sync_model_change = local;
    }

    pub fn local(&self) -> Timestamp {
        self.snapshot.lock().unwrap().last_local_sync_model_change
    }

    pub fn imported(&self) -> Vec<Snapshot> {
        self.imported.lock().unwrap().clone()
    }
}

#[async_trait]
impl SnapshotSource for MemoryHost {
    async fn current(&self) -> Result<Snapshot> {
        Ok(self.snapshot.lock().unwrap().clone())
    }
}

#[async_trait]
impl SnapshotImporter for MemoryHost {
    async fn import_complete(&self, snapshot: Snapshot) -> Result<()> {
        if self.fail_import {
            anyhow::bail!("snapshot rejected by host");
        }
        self.imported.lock().unwrap().push(snapshot.clone());
        *self.snapshot.lock().unwrap() = snapshot;
        Ok(())
    }
}

/// 按预设回答的提示，并记录被问到的问题
#[derive(Default)]
pub struct ScriptedPrompt {
    confirms: Mutex<VecDeque<bool>>,
    resolution: Option<ConflictResolution>,
    asked: Mutex<Vec<Confirmation>>,
    conflicts: Mutex<Vec<ConflictInfo>>,
}

impl ScriptedPrompt {
    pub fn declining() -> Self {
        Self::default()
    }

    pub fn confirming(answers: &[bool]) -> Self {
        Self {
            confirms: Mutex::new(answers.iter().copied().collect()),
            ..Self::default()
        }
    }

    pub fn resolving(resolution: ConflictResolution) -> Self {
        Self {
            resolution: Some(resolution),
            ..Self::default()
        }
    }

    pub fn asked(&self) -> Vec<Confirmation> {
        self.asked.lock().unwrap().clone()
    }

    pub fn conflicts(&self) -> Vec<ConflictInfo> {
        self.conflicts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConfirmPrompt for ScriptedPrompt {
    async fn confirm(&self, what: Confirmation) -> bool {
        self.asked.lock().unwrap().push(what);
        self.confirms.lock().unwrap().pop_front().unwrap_or(false)
    }
}

#[async_trait]
impl ConflictPrompt for ScriptedPrompt {
    async fn ask(&self, info: ConflictInfo) -> Option<ConflictResolution> {
        self.conflicts.lock().unwrap().push(info);
        self.resolution
    }
}

pub struct Harness<R: RemoteStore + 'static> {
    pub remote: Arc<R>,
    pub cursor: Arc<MemoryCursorStore>,
    pub host: Arc<MemoryHost>,
    pub prompt: Arc<ScriptedPrompt>,
    pub notifier: Arc<CollectingNotifier>,
    pub coordinator: SyncCoordinator,
}

impl<R: RemoteStore + 'static> Harness<R> {
    pub fn new(remote: R, cursor: SyncCursor, host: MemoryHost, prompt: ScriptedPrompt) -> Self {
        Self::with_mode(remote, cursor, host, prompt, ErrorMode::Production)
    }

    pub fn with_mode(
        remote: R,
        cursor: SyncCursor,
        host: MemoryHost,
        prompt: ScriptedPrompt,
        error_mode: ErrorMode,
    ) -> Self {
        let remote = Arc::new(remote);
        let cursor = Arc::new(MemoryCursorStore::with_cursor(cursor));
        let host = Arc::new(host);
        let prompt = Arc::new(prompt);
        let notifier = Arc::new(CollectingNotifier::new());

        let settings = SyncSettings {
            error_mode,
            ..SyncSettings::default()
        };
        let coordinator = SyncCoordinator::new(
            remote.clone(),
            cursor.clone(),
            host.clone(),
            host.clone(),
        )
        .with_settings(settings)
        .with_conflict_prompt(prompt.clone())
        .with_confirm_prompt(prompt.clone())
        .with_notifier(notifier.clone());

        Self {
            remote,
            cursor,
            host,
            prompt,
            notifier,
            coordinator,
        }
    }

    /// 换成其他确认提示（例如按策略自动回答）
    pub fn with_confirm_prompt(mut self, prompt: Arc<dyn ConfirmPrompt>) -> Self {
        self.coordinator = self.coordinator.with_confirm_prompt(prompt);
        self
    }

    /// 游标中的 (版本, 上次同步时间)，忽略诊断字段
    pub async fn cursor_state(&self) -> (Option<String>, Timestamp) {
        use snapsync_lib::core::CursorStore;
        let c = self.cursor.get().await.unwrap();
        (
            c.last_known_revision.map(String::from),
            c.last_sync_timestamp,
        )
    }
}
