use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::BackendError;
use crate::payload::{BulkOperation, Payload};

/// Store settings an adapter prefers over the global defaults.
///
/// Unset fields fall through to the global defaults; caller-supplied
/// settings win over both.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendDefaults {
    pub cache_capacity: Option<usize>,
    pub flush_interval_ms: Option<u64>,
    pub json_encode: Option<bool>,
}

impl BackendDefaults {
    pub fn new(cache_capacity: usize, flush_interval_ms: u64, json_encode: bool) -> Self {
        Self {
            cache_capacity: Some(cache_capacity),
            flush_interval_ms: Some(flush_interval_ms),
            json_encode: Some(json_encode),
        }
    }

    pub fn json_only(json_encode: bool) -> Self {
        Self {
            json_encode: Some(json_encode),
            ..Default::default()
        }
    }
}

/// Capability a remote key/value store adapter provides to the cache.
///
/// A missing key is `Ok(None)`, never an error. `bulk` applies the batch on
/// a best-effort basis and reports a single result for the whole call.
#[async_trait]
pub trait Backend: Send + Sync {
    fn name(&self) -> &str;

    fn defaults(&self) -> BackendDefaults {
        BackendDefaults::default()
    }

    async fn init(&self) -> Result<(), BackendError>;
    async fn get(&self, key: &str) -> Result<Option<Payload>, BackendError>;
    async fn set(&self, key: &str, payload: Payload) -> Result<(), BackendError>;
    async fn remove(&self, key: &str) -> Result<(), BackendError>;
    async fn bulk(&self, operations: Vec<BulkOperation>) -> Result<(), BackendError>;
    async fn close(&self) -> Result<(), BackendError>;
}
