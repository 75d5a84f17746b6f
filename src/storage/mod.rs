pub mod blob;
pub mod fs;
pub mod local;
pub mod s3;
pub mod webdav;

use crate::config::{RemoteConfig, RemoteType};
use crate::core::{Snapshot, Timestamp};
use crate::error::StoreError;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub use blob::BlobRemoteStore;
pub use local::LocalSnapshotFile;

// ============ 公共常量 ============

/// 非 IO 操作超时（秒）- stat, delete 等
pub const OP_TIMEOUT_SECS: u64 = 60;
/// IO 操作超时（秒）- read, write 等
pub const IO_TIMEOUT_SECS: u64 = 300;

/// 远程存储分配的版本号，每次成功写入都会变化，不能为空
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Revision(String);

impl Revision {
    pub fn new(rev: impl Into<String>) -> Option<Self> {
        let rev = rev.into();
        if rev.trim().is_empty() {
            None
        } else {
            Some(Self(rev))
        }
    }

    /// 生成新的随机版本号
    pub(crate) fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Revision {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        Revision::new(value).ok_or_else(|| "revision must not be empty".to_string())
    }
}

impl From<Revision> for String {
    fn from(rev: Revision) -> Self {
        rev.0
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 远程文档元数据（只有秒级精度）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteMetadata {
    pub revision: Revision,
    /// 客户端上传时声明的修改时间（毫秒，毫秒部分恒为 0）
    pub client_modified_at: Timestamp,
}

/// 完整下载的远程文档
#[derive(Debug, Clone)]
pub struct RemoteDocument {
    pub snapshot: Snapshot,
    pub revision: Revision,
}

/// 远程存储接口
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// 获取文档元数据（廉价调用）
    async fn get_metadata(&self, path: &str) -> Result<RemoteMetadata, StoreError>;

    /// 下载完整文档及其版本
    async fn download(&self, path: &str) -> Result<RemoteDocument, StoreError>;

    /// 上传完整文档
    ///
    /// 非强制覆盖时以 `expected_revision` 作为乐观并发前置条件：
    /// `None` 表示文档必须尚不存在。
    async fn upload(
        &self,
        path: &str,
        snapshot: &Snapshot,
        client_modified: Timestamp,
        expected_revision: Option<&Revision>,
        force_overwrite: bool,
    ) -> Result<Revision, StoreError>;

    /// 获取存储名称（用于日志）
    fn name(&self) -> &str;
}

/// 根据配置创建远程存储实例
pub fn create_remote_store(config: &RemoteConfig) -> Result<Arc<dyn RemoteStore>> {
    let store = match config.typ {
        RemoteType::S3 => {
            let bucket = config
                .bucket
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("S3 storage requires bucket"))?;
            let region = config
                .region
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("S3 storage requires region"))?;
            let access_key = config
                .accessKey
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("S3 storage requires accessKey"))?;
            let secret_key = config
                .secretKey
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("S3 storage requires secretKey"))?;
            tracing::info!("初始化S3存储: bucket={}, region={}", bucket, region);
            let (operator, name) = s3::build_operator(
                bucket,
                region,
                access_key,
                secret_key,
                config.endpoint.as_deref(),
                config.prefix.as_deref(),
            )?;
            BlobRemoteStore::new(operator, name)
        }
        RemoteType::WebDav => {
            let endpoint = config
                .webdavEndpoint
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("WebDAV storage requires endpoint"))?;
            let username = config
                .username
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("WebDAV storage requires username"))?;
            let password = config
                .password
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("WebDAV storage requires password"))?;
            tracing::info!("创建WebDAV存储: endpoint={}, root={:?}", endpoint, config.root);
            let (operator, name) =
                webdav::build_operator(endpoint, username, password, config.root.as_deref())?;
            BlobRemoteStore::new(operator, name)
        }
        RemoteType::Fs => {
            let root = config
                .root
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("Fs storage requires root"))?;
            tracing::info!("初始化本地目录存储: {}", root);
            let (operator, name) = fs::build_operator(root)?;
            BlobRemoteStore::new(operator, name)
        }
        RemoteType::Memory => {
            tracing::info!("初始化内存存储");
            BlobRemoteStore::memory()?
        }
    };
    Ok(Arc::new(store))
}
