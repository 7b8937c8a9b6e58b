#![allow(dead_code)]

use std::sync::Arc;

use remora_core::test::MockBackend;
use remora_core::{BufferedStore, RemoteStore, StoreConfig};

/// 缓冲开启，定时器周期足够长，由测试手动 flush
pub fn manual_config(cache_capacity: usize) -> StoreConfig {
    StoreConfig::new(cache_capacity, 3_600_000, true)
}

pub fn mock_store(config: StoreConfig) -> (Arc<MockBackend>, BufferedStore) {
    mock_store_with(MockBackend::new(), config)
}

pub fn mock_store_with(backend: MockBackend, config: StoreConfig) -> (Arc<MockBackend>, BufferedStore) {
    let backend = Arc::new(backend);
    let store = BufferedStore::new(backend.clone(), config);
    (backend, store)
}

pub fn mock_front(config: StoreConfig) -> (Arc<MockBackend>, RemoteStore) {
    let (backend, store) = mock_store(config);
    (backend, RemoteStore::from_store(store))
}
