//! 远程连接检测

use crate::error::StoreError;
use crate::storage::create_remote_store;
use crate::AppState;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct CheckResult {
    pub success: bool,
    pub message: String,
    pub details: Option<String>,
}

impl CheckResult {
    fn failed(message: &str, details: String) -> Self {
        Self {
            success: false,
            message: message.to_string(),
            details: Some(details),
        }
    }
}

/// 查询一次远程元数据，判断配置和连接是否可用
pub async fn run_check(state: &AppState) -> CheckResult {
    let remote = match create_remote_store(&state.config.remote) {
        Ok(r) => r,
        Err(e) => return CheckResult::failed("存储配置无效", e.to_string()),
    };

    let path = &state.config.sync.document_path;
    match remote.get_metadata(path).await {
        Ok(meta) => CheckResult {
            success: true,
            message: "连接成功".to_string(),
            details: Some(format!(
                "{}: {} (rev={}, 修改时间={})",
                remote.name(),
                path,
                meta.revision,
                super::prompt::format_time(meta.client_modified_at)
            )),
        },
        Err(StoreError::NotFound(_)) => CheckResult {
            success: true,
            message: "连接成功".to_string(),
            details: Some(format!("{}: 远程文件尚未创建，首次同步时会上传", remote.name())),
        },
        Err(StoreError::Auth(e)) => CheckResult::failed("认证失败", e),
        Err(e) => CheckResult::failed("连接失败", e.to_string()),
    }
}
