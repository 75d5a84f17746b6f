//! 三时钟更新检查
//!
//! 根据本地修改时间、上次同步时间和远程修改时间判断需要执行的同步方向。
//! 纯函数，无 IO。

use super::Timestamp;
use serde::Serialize;
use std::fmt;

/// 更新检查结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum UpdateCheck {
    /// 两边一致，无需操作
    InSync,
    /// 远程有新变更，本地没有 => 下载
    LocalUpdateRequired,
    /// 本地有新变更，远程没有 => 上传
    RemoteUpdateRequired,
    /// 两边都独立修改过 => 需要用户决定
    DataDiverged,
    /// 两边一致但游标落后 => 只推进游标
    LastSyncNotUpToDate,
    /// 游标记录的同步在远程不可见（远程回退或未持久化）
    RemoteNotUpToDateDespiteSync,
    /// 上次同步时间比本地新，只可能是持久化状态被篡改
    ErrorLastSyncNewerThanLocal,
    /// 其他组合，正常情况下不会出现
    UnexpectedState,
}

impl UpdateCheck {
    /// 是否属于需要显式确认的异常结果
    pub fn is_anomaly(self) -> bool {
        matches!(
            self,
            UpdateCheck::ErrorLastSyncNewerThanLocal | UpdateCheck::UnexpectedState
        )
    }
}

impl fmt::Display for UpdateCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UpdateCheck::InSync => "in_sync",
            UpdateCheck::LocalUpdateRequired => "local_update_required",
            UpdateCheck::RemoteUpdateRequired => "remote_update_required",
            UpdateCheck::DataDiverged => "data_diverged",
            UpdateCheck::LastSyncNotUpToDate => "last_sync_not_up_to_date",
            UpdateCheck::RemoteNotUpToDateDespiteSync => "remote_not_up_to_date_despite_sync",
            UpdateCheck::ErrorLastSyncNewerThanLocal => "error_last_sync_newer_than_local",
            UpdateCheck::UnexpectedState => "unexpected_state",
        };
        write!(f, "{}", s)
    }
}

/// 一次检查的输入，每次同步重新构建，不持久化
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInput {
    pub local: Timestamp,
    pub last_sync: Timestamp,
    pub remote: Timestamp,
}

impl CheckInput {
    pub fn classify(&self) -> UpdateCheck {
        check_for_update(self.local, self.last_sync, self.remote)
    }
}

/// 判断同步方向
pub fn check_for_update(local: Timestamp, last_sync: Timestamp, remote: Timestamp) -> UpdateCheck {
    if local == remote {
        return if last_sync == local {
            UpdateCheck::InSync
        } else {
            UpdateCheck::LastSyncNotUpToDate
        };
    }

    if last_sync > local {
        return UpdateCheck::ErrorLastSyncNewerThanLocal;
    }

    // 以下 last_sync <= local 且 local != remote
    if last_sync == local {
        return if remote > last_sync {
            UpdateCheck::LocalUpdateRequired
        } else {
            UpdateCheck::RemoteNotUpToDateDespiteSync
        };
    }

    // 以下 local > last_sync
    if remote == last_sync {
        UpdateCheck::RemoteUpdateRequired
    } else if remote > last_sync {
        UpdateCheck::DataDiverged
    } else {
        tracing::warn!(
            "意外的时间组合: local={}, last_sync={}, remote={}",
            local,
            last_sync,
            remote
        );
        UpdateCheck::UnexpectedState
    }
}

/// 基于远程元数据的粗粒度判断：只有本地发生了变化
///
/// 远程时间只有秒级精度，因此本地和上次同步时间都向下取整到秒后再比较。
/// 同一秒内两边同时发生的变更无法区分。
pub fn is_local_only_change(
    local: Timestamp,
    last_sync: Timestamp,
    remote_client_modified: Timestamp,
) -> bool {
    let remote_secs = remote_client_modified.div_euclid(1000);
    local.div_euclid(1000) > remote_secs
        && remote_secs == last_sync.div_euclid(1000)
        && last_sync < local
}
