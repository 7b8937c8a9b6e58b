//! # Remora Error Types
//!
//! 缓存层统一错误类型。
//!
//! `RemoraError` 实现了 `Clone`：一次失败的批量写入需要把同一个错误
//! 分发给批次内所有等待中的持久化确认。

use remora_traits::BackendError;
use thiserror::Error;

/// Result type alias for remora operations
pub type Result<T> = std::result::Result<T, RemoraError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoraError {
    /// Errors reported by the remote store adapter
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Value could not be encoded to or decoded from JSON
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Sub-path walks through a value that cannot hold children
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Store is not initialized")]
    NotInitialized,

    #[error("Store is closed")]
    Closed,

    #[error("Unknown backend type: {0}")]
    UnknownBackend(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The operation was dropped before it produced a result
    #[error("Operation cancelled")]
    Cancelled,
}

impl RemoraError {
    pub fn encoding(msg: impl Into<String>) -> Self {
        RemoraError::Encoding(msg.into())
    }

    pub fn invalid_path(msg: impl Into<String>) -> Self {
        RemoraError::InvalidPath(msg.into())
    }

    pub fn invalid_key(msg: impl Into<String>) -> Self {
        RemoraError::InvalidKey(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        RemoraError::Configuration(msg.into())
    }

    /// Whether the error came from the remote store rather than the cache
    pub fn is_backend(&self) -> bool {
        matches!(self, RemoraError::Backend(_))
    }
}

impl From<serde_json::Error> for RemoraError {
    fn from(err: serde_json::Error) -> Self {
        RemoraError::Encoding(err.to_string())
    }
}

impl From<toml::de::Error> for RemoraError {
    fn from(err: toml::de::Error) -> Self {
        RemoraError::Configuration(err.to_string())
    }
}
