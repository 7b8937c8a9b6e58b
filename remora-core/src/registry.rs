//! # Backend Registry
//!
//! 按类型标签构造后端适配器。
//!
//! | 标签 | 适配器 |
//! |------|--------|
//! | `memory`, `testStub` | `MemoryBackend` |
//! | `couch` | `CouchBackend` |
//! | `webdav` | `WebDavBackend` |
//! | `simple` | `WebDavBackend::simple` (无缓存、无写缓冲) |

use std::collections::BTreeMap;
use std::sync::Arc;

use remora_storage::{BackendSettings, CouchBackend, MemoryBackend, WebDavBackend};
use remora_traits::{Backend, BackendError};

use crate::error::{RemoraError, Result};

/// 后端构造函数
pub type BackendFactory = fn(&BackendSettings) -> std::result::Result<Arc<dyn Backend>, BackendError>;

#[derive(Clone)]
pub struct BackendRegistry {
    factories: BTreeMap<String, BackendFactory>,
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

impl BackendRegistry {
    /// 空注册表
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// 包含所有内置适配器
    pub fn with_builtin() -> Self {
        let mut registry = Self::empty();
        registry.register("memory", memory_factory);
        registry.register("testStub", memory_factory);
        registry.register("couch", |settings| Ok(Arc::new(CouchBackend::new(settings)?)));
        registry.register("webdav", |settings| Ok(Arc::new(WebDavBackend::new(settings)?)));
        registry.register("simple", |settings| Ok(Arc::new(WebDavBackend::simple(settings)?)));
        registry
    }

    /// 注册或替换一个类型标签
    pub fn register(&mut self, tag: impl Into<String>, factory: BackendFactory) {
        self.factories.insert(tag.into(), factory);
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.factories.contains_key(tag)
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn create(&self, tag: &str, settings: &BackendSettings) -> Result<Arc<dyn Backend>> {
        let factory = self
            .factories
            .get(tag)
            .ok_or_else(|| RemoraError::UnknownBackend(tag.to_string()))?;
        Ok(factory(settings)?)
    }
}

fn memory_factory(settings: &BackendSettings) -> std::result::Result<Arc<dyn Backend>, BackendError> {
    Ok(Arc::new(MemoryBackend::from_settings(settings)))
}
