//! # In-memory backend
//!
//! 基于内存的 Backend 实现，用作测试桩和本地开发存储。

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use remora_traits::{Backend, BackendDefaults, BackendError, BulkOperation, Payload};

use crate::settings::BackendSettings;

pub struct MemoryBackend {
    data: RwLock<HashMap<String, Payload>>,
    invalid: bool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
            invalid: false,
        }
    }

    pub fn from_settings(settings: &BackendSettings) -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
            invalid: settings.invalid,
        }
    }

    /// 直接读取存储内容（绕过缓存，用于断言持久化结果）
    pub fn stored(&self, key: &str) -> Option<Payload> {
        self.data.read().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    fn apply(&self, operation: BulkOperation) {
        let mut data = self.data.write();
        match operation {
            BulkOperation::Set { key, payload } => {
                data.insert(key, payload);
            }
            BulkOperation::Remove { key } => {
                data.remove(&key);
            }
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    fn defaults(&self) -> BackendDefaults {
        BackendDefaults::json_only(true)
    }

    async fn init(&self) -> Result<(), BackendError> {
        if self.invalid {
            return Err(BackendError::unavailable("Stub for an invalid storage"));
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Payload>, BackendError> {
        Ok(self.data.read().get(key).cloned())
    }

    async fn set(&self, key: &str, payload: Payload) -> Result<(), BackendError> {
        self.data.write().insert(key.to_string(), payload);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), BackendError> {
        self.data.write().remove(key);
        Ok(())
    }

    async fn bulk(&self, operations: Vec<BulkOperation>) -> Result<(), BackendError> {
        for operation in operations {
            self.apply(operation);
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), BackendError> {
        Ok(())
    }
}
