//! # CLI Commands

pub mod check;
pub mod ops;
pub mod storage_info;

use std::path::Path;

use anyhow::{Context, Result};
use remora_core::{BackendSettings, ConfigLoader, ConfigOverrides, NodeConfig, RemoteStore};
use serde_json::Value;
use tracing::debug;

/// 要连接的后端
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub kind: String,
    pub settings: BackendSettings,
    pub overrides: ConfigOverrides,
}

impl Target {
    pub fn from_config(config: &NodeConfig) -> Self {
        Self {
            kind: config.backend.kind.clone(),
            settings: config.backend.settings.clone(),
            overrides: config.store,
        }
    }
}

pub struct Output {
    pub compact: bool,
}

impl Output {
    pub fn value(&self, value: &Value) -> Result<()> {
        let text = if self.compact {
            serde_json::to_string(value)?
        } else {
            serde_json::to_string_pretty(value)?
        };
        println!("{}", text);
        Ok(())
    }
}

pub fn load_config(path: Option<&Path>) -> Result<NodeConfig> {
    let loader = match path {
        Some(path) => ConfigLoader::with_path(path),
        None => ConfigLoader::new(),
    };
    debug!("Loading config from {:?}", loader.config_path());
    loader
        .load()
        .with_context(|| format!("failed to load config from {}", loader.config_path().display()))
}

/// 创建并初始化远端存储
pub async fn open(target: Target) -> Result<RemoteStore> {
    let store = RemoteStore::new(target.kind.clone(), target.settings, target.overrides);
    store
        .init()
        .await
        .with_context(|| format!("failed to initialize '{}' backend", target.kind))?;
    Ok(store)
}

/// 等待写缓冲清空并关闭连接
pub async fn finish(store: &RemoteStore) -> Result<()> {
    store.shutdown().await.context("failed to drain write buffer")?;
    store.close().await.context("failed to close backend")?;
    Ok(())
}

/// 命令行中的 JSON 值
pub fn parse_value(raw: &str) -> Result<Value> {
    serde_json::from_str(raw).with_context(|| format!("value is not valid JSON: {}", raw))
}

pub fn show_config(config: &NodeConfig) -> Result<()> {
    let mut shown = config.clone();
    if shown.backend.settings.bearer_token.is_some() {
        shown.backend.settings.bearer_token = Some("***".to_string());
    }
    println!("{}", serde_json::to_string_pretty(&shown)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value("{\"a\":[1,2]}").unwrap(), json!({"a": [1, 2]}));
        assert_eq!(parse_value("null").unwrap(), Value::Null);
        assert!(parse_value("{oops").is_err());
    }

    #[test]
    fn test_target_from_config() {
        let mut config = NodeConfig::default();
        config.backend.kind = "memory".to_string();
        config.store.cache_capacity = Some(5);

        let target = Target::from_config(&config);
        assert_eq!(target.kind, "memory");
        assert_eq!(target.overrides.cache_capacity, Some(5));
    }

    #[tokio::test]
    async fn test_open_and_finish_memory_backend() {
        let target = Target {
            kind: "memory".to_string(),
            settings: BackendSettings::default(),
            overrides: ConfigOverrides::default(),
        };
        let store = open(target).await.unwrap();
        let _durable = store.set("k", json!(1)).await.unwrap();
        finish(&store).await.unwrap();
    }

    #[tokio::test]
    async fn test_open_reports_unknown_backend() {
        let target = Target {
            kind: "carrier-pigeon".to_string(),
            settings: BackendSettings::default(),
            overrides: ConfigOverrides::default(),
        };
        let err = open(target).await.unwrap_err();
        assert!(format!("{:#}", err).contains("carrier-pigeon"));
    }
}
