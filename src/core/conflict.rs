//! 冲突解决与确认接口
//!
//! 同步过程中需要外部（用户或策略）做决定的地方都通过这里的 trait 等待结果。

use super::Timestamp;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// 冲突解决方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictResolution {
    UseLocal,
    UseRemote,
}

impl std::fmt::Display for ConflictResolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictResolution::UseLocal => write!(f, "USE_LOCAL"),
            ConflictResolution::UseRemote => write!(f, "USE_REMOTE"),
        }
    }
}

impl ConflictResolution {
    /// 解析用户输入，无法识别时视为取消
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "use_local" | "local" | "l" => Some(ConflictResolution::UseLocal),
            "use_remote" | "remote" | "r" => Some(ConflictResolution::UseRemote),
            _ => None,
        }
    }
}

/// 冲突时展示给用户的三个时间
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictInfo {
    pub local: Timestamp,
    pub remote: Timestamp,
    pub last_sync: Timestamp,
}

/// 需要用户确认的事项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    /// 本地修改时间为 0，数据可能已被清空
    EmptyLocalHistory,
    /// 远程没有反映上次同步，是否重新尝试
    RetryStaleRemote,
    /// 游标异常时强制上传本地数据
    ForceUploadAnyway,
    /// 游标异常时强制导入远程数据
    ForceImportAnyway,
}

impl Confirmation {
    pub fn message(&self) -> &'static str {
        match self {
            Confirmation::EmptyLocalHistory => {
                "本地修改时间为 0，数据可能已被删除或出现异常。是否继续同步？"
            }
            Confirmation::RetryStaleRemote => "远程数据没有反映上次同步。是否重新从远程加载？",
            Confirmation::ForceUploadAnyway => {
                "上次同步时间比本地数据新，这在未手动修改数据时不应发生。仍然上传本地数据？"
            }
            Confirmation::ForceImportAnyway => {
                "上次同步时间比本地数据新，这在未手动修改数据时不应发生。仍然导入远程数据？"
            }
        }
    }

    /// 是否允许 `--yes` 代替用户回答
    ///
    /// 重试和游标异常的处理必须由用户明确确认。
    pub fn allows_assume_yes(&self) -> bool {
        matches!(self, Confirmation::EmptyLocalHistory)
    }
}

/// 冲突解决提示，`None` 表示用户关闭了对话框
#[async_trait]
pub trait ConflictPrompt: Send + Sync {
    async fn ask(&self, info: ConflictInfo) -> Option<ConflictResolution>;
}

/// 是/否确认提示
#[async_trait]
pub trait ConfirmPrompt: Send + Sync {
    async fn confirm(&self, what: Confirmation) -> bool;
}

/// 冲突处理策略（非交互场景）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConflictPolicy {
    /// 交互询问
    #[default]
    Ask,
    UseLocal,
    UseRemote,
    /// 不处理，保持现状
    Dismiss,
}

/// 按固定策略回答的提示
#[derive(Debug, Clone, Copy)]
pub struct PolicyPrompt {
    pub resolution: Option<ConflictResolution>,
    pub assume_yes: bool,
}

impl PolicyPrompt {
    pub fn new(policy: ConflictPolicy, assume_yes: bool) -> Self {
        let resolution = match policy {
            ConflictPolicy::UseLocal => Some(ConflictResolution::UseLocal),
            ConflictPolicy::UseRemote => Some(ConflictResolution::UseRemote),
            ConflictPolicy::Ask | ConflictPolicy::Dismiss => None,
        };
        Self {
            resolution,
            assume_yes,
        }
    }

    /// 全部拒绝/取消
    pub fn declining() -> Self {
        Self {
            resolution: None,
            assume_yes: false,
        }
    }
}

#[async_trait]
impl ConflictPrompt for PolicyPrompt {
    async fn ask(&self, info: ConflictInfo) -> Option<ConflictResolution> {
        tracing::info!(
            "按策略处理冲突: local={}, remote={}, last_sync={} => {:?}",
            info.local,
            info.remote,
            info.last_sync,
            self.resolution
        );
        self.resolution
    }
}

#[async_trait]
impl ConfirmPrompt for PolicyPrompt {
    async fn confirm(&self, what: Confirmation) -> bool {
        let answer = self.assume_yes && what.allows_assume_yes();
        tracing::debug!("自动确认 {:?} => {}", what, answer);
        answer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resolution() {
        assert_eq!(ConflictResolution::parse("USE_LOCAL"), Some(ConflictResolution::UseLocal));
        assert_eq!(ConflictResolution::parse(" r\n"), Some(ConflictResolution::UseRemote));
        assert_eq!(ConflictResolution::parse(""), None);
        assert_eq!(ConflictResolution::UseRemote.to_string(), "USE_REMOTE");
    }

    #[tokio::test]
    async fn test_policy_prompt() {
        let info = ConflictInfo {
            local: 2,
            remote: 3,
            last_sync: 1,
        };
        let p = PolicyPrompt::new(ConflictPolicy::UseRemote, false);
        assert_eq!(p.ask(info).await, Some(ConflictResolution::UseRemote));
        assert!(!p.confirm(Confirmation::EmptyLocalHistory).await);

        let p = PolicyPrompt::new(ConflictPolicy::Ask, true);
        assert_eq!(p.ask(info).await, None);
        assert!(p.confirm(Confirmation::EmptyLocalHistory).await);
    }

    #[tokio::test]
    async fn test_assume_yes_never_confirms_retry_or_anomaly() {
        let p = PolicyPrompt::new(ConflictPolicy::UseLocal, true);
        assert!(!p.confirm(Confirmation::RetryStaleRemote).await);
        assert!(!p.confirm(Confirmation::ForceUploadAnyway).await);
        assert!(!p.confirm(Confirmation::ForceImportAnyway).await);
    }
}
