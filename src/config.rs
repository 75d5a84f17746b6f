//! 应用配置模块

#![allow(non_snake_case)]

use crate::core::ConflictPolicy;
use crate::logging::LogConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

/// 远程存储类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RemoteType {
    S3,
    WebDav,
    Fs,
    #[default]
    Memory,
}

/// 远程存储配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RemoteConfig {
    #[serde(rename = "type", default)]
    pub typ: RemoteType,
    /// 是否启用同步
    #[serde(default)]
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accessKey: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secretKey: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webdavEndpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
}

/// 未知错误的处理方式
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ErrorMode {
    /// 通知用户后结束本次同步
    Production,
    /// 直接交给调用方，便于调试
    Debug,
}

impl Default for ErrorMode {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            ErrorMode::Debug
        } else {
            ErrorMode::Production
        }
    }
}

/// 同步配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSettings {
    /// 远程文档路径，改动后会找不到已有的远程文档
    #[serde(default = "default_document_path")]
    pub document_path: String,
    /// 等待远程就绪的最长时间（秒）
    #[serde(default = "default_ready_timeout")]
    pub ready_timeout_secs: u64,
    #[serde(default)]
    pub error_mode: ErrorMode,
    #[serde(default)]
    pub conflict_policy: ConflictPolicy,
}

fn default_document_path() -> String {
    "sync/sync-data.json".to_string()
}

fn default_ready_timeout() -> u64 {
    30
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            document_path: default_document_path(),
            ready_timeout_secs: default_ready_timeout(),
            error_mode: ErrorMode::default(),
            conflict_policy: ConflictPolicy::default(),
        }
    }
}

/// 完整的应用配置（config.json）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub sync: SyncSettings,
    #[serde(default)]
    pub log: LogConfig,
}

impl AppConfig {
    /// 从配置文件加载，缺失或损坏的部分使用默认值
    pub fn load(config_dir: &Path) -> Self {
        let config = read_config_json(config_dir);
        Self {
            remote: section(&config, "remote"),
            sync: section(&config, "sync"),
            log: section(&config, "log"),
        }
    }

    /// 保存配置，保留文件中的其他字段（例如 data_path）
    pub fn save(&self, config_dir: &Path) -> io::Result<()> {
        let mut config = read_config_json(config_dir);
        if !config.is_object() {
            config = serde_json::json!({});
        }
        config["remote"] = serde_json::to_value(&self.remote).map_err(io::Error::other)?;
        config["sync"] = serde_json::to_value(&self.sync).map_err(io::Error::other)?;
        config["log"] = serde_json::to_value(&self.log).map_err(io::Error::other)?;

        let content = serde_json::to_string_pretty(&config).map_err(io::Error::other)?;
        fs::write(config_dir.join("config.json"), content)
    }
}

fn read_config_json(config_dir: &Path) -> serde_json::Value {
    fs::read_to_string(config_dir.join("config.json"))
        .ok()
        .and_then(|content| serde_json::from_str(&content).ok())
        .unwrap_or_else(|| serde_json::json!({}))
}

fn section<T: serde::de::DeserializeOwned + Default>(config: &serde_json::Value, key: &str) -> T {
    config
        .get(key)
        .and_then(|v| match serde_json::from_value::<T>(v.clone()) {
            Ok(s) => Some(s),
            Err(e) => {
                tracing::warn!("配置项 {} 无效，使用默认值: {}", key, e);
                None
            }
        })
        .unwrap_or_default()
}
