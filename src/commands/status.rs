//! 同步状态（只读诊断）

use crate::core::{CursorStore, SyncCursor};
use crate::AppState;
use anyhow::Result;
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub enabled: bool,
    pub remote_type: String,
    pub document_path: String,
    pub cursor: SyncCursor,
}

pub async fn run_status(state: &AppState) -> Result<SyncStatus> {
    let cursor = state.cursor_store().get().await?;
    Ok(SyncStatus {
        enabled: state.config.remote.enabled,
        remote_type: format!("{:?}", state.config.remote.typ).to_lowercase(),
        document_path: state.config.sync.document_path.clone(),
        cursor,
    })
}
