//! 同步错误类型

use thiserror::Error;

/// 同步结果类型
pub type SyncResult<T> = Result<T, SyncError>;

/// 远程存储返回的错误（由适配器在边界处统一分类）
#[derive(Error, Debug)]
pub enum StoreError {
    /// 远程文档不存在
    #[error("remote document not found: {0}")]
    NotFound(String),

    /// 认证或授权失败（401 类）
    #[error("remote authentication failed: {0}")]
    Auth(String),

    /// 上传前置条件不满足（其他设备先写入了）
    #[error("remote revision mismatch: expected {expected:?}, found {actual:?}")]
    ConcurrencyConflict {
        expected: Option<String>,
        actual: Option<String>,
    },

    /// 其他网络/存储错误
    #[error("remote transport error: {0}")]
    Transport(String),
}

impl From<opendal::Error> for StoreError {
    fn from(e: opendal::Error) -> Self {
        match e.kind() {
            opendal::ErrorKind::NotFound => StoreError::NotFound(e.to_string()),
            opendal::ErrorKind::PermissionDenied => StoreError::Auth(e.to_string()),
            opendal::ErrorKind::ConditionNotMatch => StoreError::ConcurrencyConflict {
                expected: None,
                actual: None,
            },
            _ => StoreError::Transport(e.to_string()),
        }
    }
}

/// 一次同步尝试的终止性错误
///
/// 所有错误都不会修改已持久化的游标。
#[derive(Error, Debug)]
pub enum SyncError {
    /// 远程存储未配置或未就绪
    #[error("sync not ready: {0}")]
    NotReady(String),

    /// 已有同步尝试正在进行
    #[error("another sync attempt is in progress")]
    Busy,

    /// 远程认证失败，需要重新授权
    #[error("authentication failed: {0}")]
    Auth(String),

    /// 网络或存储错误（附带原始错误文本）
    #[error("unknown sync error: {0}")]
    Transport(String),

    /// 上传时远程版本已变化
    #[error("remote changed concurrently (expected revision {expected:?}, found {actual:?})")]
    ConcurrencyConflict {
        expected: Option<String>,
        actual: Option<String>,
    },

    /// 本地历史看起来已被清空，用户拒绝继续
    #[error("local change history is empty and the upload was not confirmed")]
    DestructiveGuardDeclined,

    /// 上次同步时间比本地数据新，且未确认处理方式
    #[error("last sync ({last_sync}) is newer than local data ({local}); no resolution confirmed")]
    AnomalyUnconfirmed { local: i64, last_sync: i64 },

    /// 导入远程快照失败
    #[error("failed to import remote snapshot: {0}")]
    Import(#[source] anyhow::Error),

    /// 本地游标读写失败
    #[error("sync cursor store error: {0}")]
    Cursor(#[source] anyhow::Error),

    /// 读取本地快照失败
    #[error("failed to read local snapshot: {0}")]
    Snapshot(#[source] anyhow::Error),
}

impl SyncError {
    /// 是否需要通知用户
    pub fn is_user_visible(&self) -> bool {
        !matches!(
            self,
            SyncError::NotReady(_)
                | SyncError::Busy
                | SyncError::DestructiveGuardDeclined
                | SyncError::AnomalyUnconfirmed { .. }
        )
    }

    /// 用户主动拒绝导致的干净终止
    pub fn is_declined(&self) -> bool {
        matches!(
            self,
            SyncError::DestructiveGuardDeclined | SyncError::AnomalyUnconfirmed { .. }
        )
    }
}

impl From<StoreError> for SyncError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Auth(msg) => SyncError::Auth(msg),
            StoreError::ConcurrencyConflict { expected, actual } => {
                SyncError::ConcurrencyConflict { expected, actual }
            }
            StoreError::NotFound(msg) | StoreError::Transport(msg) => SyncError::Transport(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_mapping() {
        assert!(matches!(
            SyncError::from(StoreError::Auth("401".into())),
            SyncError::Auth(_)
        ));
        assert!(matches!(
            SyncError::from(StoreError::Transport("timeout".into())),
            SyncError::Transport(_)
        ));
        let err = SyncError::from(StoreError::ConcurrencyConflict {
            expected: Some("r1".into()),
            actual: Some("r2".into()),
        });
        assert!(err.to_string().contains("r1"));
        assert!(err.to_string().contains("r2"));
    }

    #[test]
    fn test_opendal_error_kinds() {
        let nf = opendal::Error::new(opendal::ErrorKind::NotFound, "missing");
        assert!(matches!(StoreError::from(nf), StoreError::NotFound(_)));

        let denied = opendal::Error::new(opendal::ErrorKind::PermissionDenied, "401");
        assert!(matches!(StoreError::from(denied), StoreError::Auth(_)));

        let other = opendal::Error::new(opendal::ErrorKind::Unexpected, "boom");
        match StoreError::from(other) {
            StoreError::Transport(msg) => assert!(msg.contains("boom")),
            e => panic!("unexpected mapping: {e:?}"),
        }
    }

    #[test]
    fn test_visibility() {
        assert!(SyncError::Auth("x".into()).is_user_visible());
        assert!(SyncError::Transport("x".into()).is_user_visible());
        assert!(!SyncError::NotReady("x".into()).is_user_visible());
        assert!(!SyncError::DestructiveGuardDeclined.is_user_visible());
        assert!(SyncError::AnomalyUnconfirmed {
            local: 1,
            last_sync: 2
        }
        .is_declined());
    }
}
