use crate::commands::TerminalPrompt;
use crate::core::{ConflictPolicy, ConflictPrompt, ConfirmPrompt, PolicyPrompt, SyncOutcome};
use crate::error::{SyncError, SyncResult};
use crate::AppState;
use std::path::Path;
use std::sync::Arc;

/// 根据配置选择冲突提示和确认提示
///
/// `assume_yes` 只来自本次命令行参数，不从配置文件读取。
pub fn select_prompts(
    state: &AppState,
    interactive: bool,
    assume_yes: bool,
) -> (Arc<dyn ConflictPrompt>, Arc<dyn ConfirmPrompt>) {
    let policy_kind = state.config.sync.conflict_policy;
    let terminal = Arc::new(TerminalPrompt::new().with_assume_yes(assume_yes));
    let policy = Arc::new(PolicyPrompt::new(policy_kind, assume_yes));

    let conflict: Arc<dyn ConflictPrompt> = if interactive && policy_kind == ConflictPolicy::Ask {
        terminal.clone()
    } else {
        policy.clone()
    };
    let confirm: Arc<dyn ConfirmPrompt> = if interactive { terminal } else { policy };
    (conflict, confirm)
}

/// 执行一次同步
pub async fn run_sync(
    state: &AppState,
    snapshot: &Path,
    interactive: bool,
    assume_yes: bool,
) -> SyncResult<SyncOutcome> {
    let (conflict, confirm) = select_prompts(state, interactive, assume_yes);
    let coordinator = state
        .build_coordinator(snapshot, conflict, confirm)
        .map_err(|e| SyncError::NotReady(format!("远程存储配置无效: {}", e)))?;

    tracing::info!(
        "开始同步: 快照={:?}, 远程路径={}",
        snapshot,
        coordinator.settings().document_path
    );
    coordinator.sync().await
}
