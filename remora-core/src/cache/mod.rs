//! # Cache Module
//!
//! 远端 JSON 键值存储前的写回缓存层。
//!
//! ## 模块结构
//!
//! - `entry`: 缓存条目与持久化确认 (`DurableAck`)
//! - `metrics`: 缓存统计
//! - `store`: 缓存核心实现 (`BufferedStore`)
//!
//! ## 特性
//!
//! - 读穿透 + LRU 淘汰 (淘汰到一半容量)
//! - 写缓冲 + 定时批量 flush (同一时刻最多一个 flush)
//! - dirty 与写入中的条目永不淘汰
//! - `shutdown` 等待写缓冲清空
//!
//! ## 示例
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use remora_core::cache::BufferedStore;
//! use remora_core::config::StoreConfig;
//! use remora_storage::MemoryBackend;
//! use serde_json::json;
//!
//! # async fn example() -> remora_core::Result<()> {
//! let store = BufferedStore::new(Arc::new(MemoryBackend::new()), StoreConfig::default());
//! store.init().await?;
//!
//! // 返回即缓冲确认
//! let durable = store.set("pad:1", json!({"text": "hello"})).await?;
//! assert_eq!(store.get("pad:1").await?, json!({"text": "hello"}));
//!
//! // 远端确认
//! durable.await?;
//! store.shutdown().await?;
//! # Ok(())
//! # }
//! ```

mod entry;
pub mod metrics;
pub mod store;

pub use entry::DurableAck;
pub use metrics::{StoreMetrics, StoreMetricsSnapshot};
pub use store::{BufferedStore, FlushOutcome};
