//! # Configuration Loader
//!
//! 分层加载节点配置：
//!
//! 1. 内置默认值
//! 2. TOML 配置文件
//! 3. `REMORA_*` 环境变量
//!
//! 后加载的来源覆盖先加载的来源，最后统一校验。
//!
//! ## 配置文件示例
//!
//! ```toml
//! [backend]
//! type = "couch"
//! storage_address = "https://couch.example.com/"
//! bearer_token = "secret"
//! database = "documents"
//!
//! [store]
//! cache_capacity = 500
//! flush_interval_ms = 250
//! flush_failure = "retry"
//! ```

use std::env;
use std::path::{Path, PathBuf};

use remora_storage::BackendSettings;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ConfigOverrides, FlushFailurePolicy};
use crate::error::{RemoraError, Result};

/// Environment variable pointing at an explicit config file
pub const CONFIG_PATH_ENV: &str = "REMORA_CONFIG";

pub const DEFAULT_BACKEND_TYPE: &str = "couch";

fn default_backend_type() -> String {
    DEFAULT_BACKEND_TYPE.to_string()
}

/// 后端选择 + 连接参数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendSection {
    /// 后端类型标签，见 `BackendRegistry`
    #[serde(rename = "type", default = "default_backend_type")]
    pub kind: String,

    #[serde(flatten)]
    pub settings: BackendSettings,
}

impl Default for BackendSection {
    fn default() -> Self {
        Self {
            kind: default_backend_type(),
            settings: BackendSettings::default(),
        }
    }
}

/// 节点完整配置
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub backend: BackendSection,
    pub store: ConfigOverrides,
}

impl NodeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.backend.kind.trim().is_empty() {
            return Err(RemoraError::configuration("backend type must not be empty"));
        }
        if let Some(interval) = self.store.flush_interval_ms {
            if interval > 3_600_000 {
                return Err(RemoraError::configuration(
                    "flush_interval_ms is too large (max: 3600000 = 1 hour)",
                ));
            }
        }
        Ok(())
    }
}

/// Configuration loader
pub struct ConfigLoader {
    config_path: PathBuf,
    env_prefix: String,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// 使用默认路径和 `REMORA` 前缀
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
            env_prefix: "REMORA".to_string(),
        }
    }

    pub fn with_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            config_path: path.as_ref().to_path_buf(),
            env_prefix: "REMORA".to_string(),
        }
    }

    pub fn prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = prefix.to_string();
        self
    }

    /// 查找顺序：`REMORA_CONFIG` > `./remora.toml` > 用户配置目录
    pub fn default_config_path() -> PathBuf {
        if let Ok(path) = env::var(CONFIG_PATH_ENV) {
            return PathBuf::from(path);
        }

        let local = PathBuf::from("remora.toml");
        if local.exists() {
            return local;
        }

        dirs::config_dir()
            .map(|dir| dir.join("remora").join("config.toml"))
            .unwrap_or(local)
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// 加载配置，环境变量取自进程环境
    pub fn load(&self) -> Result<NodeConfig> {
        self.load_with_env(|name| env::var(name).ok())
    }

    /// 加载配置，环境变量由 `lookup` 提供
    pub fn load_with_env<F>(&self, lookup: F) -> Result<NodeConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = self.load_from_file()?;
        let config = self.merge_env_config(config, lookup)?;
        config.validate()?;
        Ok(config)
    }

    fn load_from_file(&self) -> Result<NodeConfig> {
        if !self.config_path.exists() {
            debug!("Config file {:?} not found, using defaults", self.config_path);
            return Ok(NodeConfig::default());
        }

        let content = std::fs::read_to_string(&self.config_path).map_err(|e| {
            RemoraError::configuration(format!(
                "Failed to read config file {:?}: {}",
                self.config_path, e
            ))
        })?;

        let config: NodeConfig = toml::from_str(&content)?;
        debug!("Loaded config from {:?}", self.config_path);
        Ok(config)
    }

    fn merge_env_config<F>(&self, mut config: NodeConfig, lookup: F) -> Result<NodeConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |suffix: &str| lookup(&format!("{}_{}", self.env_prefix, suffix));

        // Backend
        if let Some(val) = var("BACKEND_TYPE") {
            config.backend.kind = val;
        }
        if let Some(val) = var("STORAGE_ADDRESS") {
            config.backend.settings.storage_address = Some(val);
        }
        if let Some(val) = var("BEARER_TOKEN") {
            config.backend.settings.bearer_token = Some(val);
        }
        if let Some(val) = var("DATABASE") {
            config.backend.settings.database = Some(val);
        }

        // Store
        if let Some(val) = var("CACHE_CAPACITY") {
            config.store.cache_capacity = Some(parse_usize(&val, "CACHE_CAPACITY")?);
        }
        if let Some(val) = var("FLUSH_INTERVAL_MS") {
            config.store.flush_interval_ms = Some(parse_u64(&val, "FLUSH_INTERVAL_MS")?);
        }
        if let Some(val) = var("JSON_ENCODE") {
            config.store.json_encode = Some(parse_bool(&val, "JSON_ENCODE")?);
        }
        if let Some(val) = var("FLUSH_FAILURE") {
            config.store.flush_failure = Some(val.parse::<FlushFailurePolicy>()?);
        }

        Ok(config)
    }
}

fn parse_u64(s: &str, name: &str) -> Result<u64> {
    s.parse::<u64>().map_err(|e| {
        RemoraError::configuration(format!(
            "Invalid {} '{}': must be a valid number. Error: {}",
            name, s, e
        ))
    })
}

fn parse_usize(s: &str, name: &str) -> Result<usize> {
    s.parse::<usize>().map_err(|e| {
        RemoraError::configuration(format!(
            "Invalid {} '{}': must be a valid number. Error: {}",
            name, s, e
        ))
    })
}

fn parse_bool(s: &str, name: &str) -> Result<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(RemoraError::configuration(format!(
            "Invalid {} '{}': must be 'true' or 'false'",
            name, s
        ))),
    }
}
