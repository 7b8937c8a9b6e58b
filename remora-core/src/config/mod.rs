//! # Store Configuration
//!
//! 缓存存储配置。
//!
//! ## 配置来源 (优先级从高到低)
//!
//! 1. 调用方覆盖 (`ConfigOverrides`)
//! 2. 后端适配器默认值 (`BackendDefaults`)
//! 3. 全局默认值
//!
//! 配置在存储创建时解析一次，之后不可变。
//!
//! ## 示例
//!
//! ```rust
//! use remora_core::config::{ConfigOverrides, StoreConfig};
//! use remora_traits::BackendDefaults;
//!
//! let adapter = BackendDefaults::new(100, 500, false);
//! let overrides = ConfigOverrides::default().with_cache_capacity(10);
//! let config = StoreConfig::resolve(&adapter, &overrides);
//!
//! assert_eq!(config.cache_capacity, 10);
//! assert_eq!(config.flush_interval_ms, 500);
//! assert!(!config.json_encode);
//! ```

pub mod loader;

use std::time::Duration;

use remora_traits::BackendDefaults;
use serde::{Deserialize, Serialize};

use crate::error::{RemoraError, Result};

pub use loader::{BackendSection, ConfigLoader, NodeConfig};

pub const DEFAULT_CACHE_CAPACITY: usize = 1000;
pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 100;
pub const DEFAULT_JSON_ENCODE: bool = true;

/// 批量写入失败后的处理策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlushFailurePolicy {
    /// 只把错误交给等待中的确认，条目保持 clean
    #[default]
    Report,
    /// 未被再次写入的条目重新标记为 dirty，下一轮 flush 重试
    Retry,
}

impl std::str::FromStr for FlushFailurePolicy {
    type Err = RemoraError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "report" => Ok(FlushFailurePolicy::Report),
            "retry" => Ok(FlushFailurePolicy::Retry),
            _ => Err(RemoraError::configuration(format!(
                "unknown flush failure policy '{}': expected 'report' or 'retry'",
                s
            ))),
        }
    }
}

/// 已解析的存储配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// 缓存容量
    ///
    /// 0 表示关闭读缓存；dirty 条目仍会驻留直到 flush 完成。
    pub cache_capacity: usize,

    /// flush 周期 (毫秒)
    ///
    /// 0 表示关闭写缓冲，所有写入直接到达后端。
    pub flush_interval_ms: u64,

    /// 是否在缓存层做 JSON 编解码
    pub json_encode: bool,

    pub flush_failure: FlushFailurePolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            flush_interval_ms: DEFAULT_FLUSH_INTERVAL_MS,
            json_encode: DEFAULT_JSON_ENCODE,
            flush_failure: FlushFailurePolicy::Report,
        }
    }
}

impl StoreConfig {
    pub fn new(cache_capacity: usize, flush_interval_ms: u64, json_encode: bool) -> Self {
        Self {
            cache_capacity,
            flush_interval_ms,
            json_encode,
            flush_failure: FlushFailurePolicy::Report,
        }
    }

    /// 按 调用方 > 适配器 > 全局 的顺序解析配置
    pub fn resolve(adapter: &BackendDefaults, overrides: &ConfigOverrides) -> Self {
        let global = Self::default();
        Self {
            cache_capacity: overrides
                .cache_capacity
                .or(adapter.cache_capacity)
                .unwrap_or(global.cache_capacity),
            flush_interval_ms: overrides
                .flush_interval_ms
                .or(adapter.flush_interval_ms)
                .unwrap_or(global.flush_interval_ms),
            json_encode: overrides
                .json_encode
                .or(adapter.json_encode)
                .unwrap_or(global.json_encode),
            flush_failure: overrides.flush_failure.unwrap_or(global.flush_failure),
        }
    }

    pub fn with_cache_capacity(mut self, cache_capacity: usize) -> Self {
        self.cache_capacity = cache_capacity;
        self
    }

    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_json_encode(mut self, json_encode: bool) -> Self {
        self.json_encode = json_encode;
        self
    }

    pub fn with_flush_failure(mut self, policy: FlushFailurePolicy) -> Self {
        self.flush_failure = policy;
        self
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    /// 写缓冲是否开启
    pub fn buffering_enabled(&self) -> bool {
        self.flush_interval_ms > 0
    }

    /// 读缓存是否开启
    pub fn caching_enabled(&self) -> bool {
        self.cache_capacity > 0
    }

    /// 验证配置是否有效
    pub fn validate(&self) -> Result<()> {
        if self.flush_interval_ms > 3_600_000 {
            return Err(RemoraError::configuration(
                "flush_interval_ms is too large (max: 3600000 = 1 hour)",
            ));
        }
        if self.cache_capacity > 10_000_000 {
            return Err(RemoraError::configuration(
                "cache_capacity is too large (max: 10000000)",
            ));
        }
        Ok(())
    }
}

/// 调用方提供的配置覆盖，未设置的字段落到适配器默认值
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigOverrides {
    pub cache_capacity: Option<usize>,
    pub flush_interval_ms: Option<u64>,
    pub json_encode: Option<bool>,
    pub flush_failure: Option<FlushFailurePolicy>,
}

impl ConfigOverrides {
    pub fn with_cache_capacity(mut self, cache_capacity: usize) -> Self {
        self.cache_capacity = Some(cache_capacity);
        self
    }

    pub fn with_flush_interval_ms(mut self, flush_interval_ms: u64) -> Self {
        self.flush_interval_ms = Some(flush_interval_ms);
        self
    }

    pub fn with_json_encode(mut self, json_encode: bool) -> Self {
        self.json_encode = Some(json_encode);
        self
    }

    pub fn with_flush_failure(mut self, policy: FlushFailurePolicy) -> Self {
        self.flush_failure = Some(policy);
        self
    }
}
