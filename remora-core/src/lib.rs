//! # Remora Core
//!
//! 远端 JSON 键值存储的写回、读穿透缓存。
//!
//! ## 模块结构
//!
//! - `cache`: 写回缓存 (`BufferedStore`)，dirty 跟踪、定时批量 flush、LRU 淘汰
//! - `front`: 按 key 串行化的入口 (`RemoteStore`)
//! - `config`: 存储配置与分层配置加载
//! - `path`: 文档内属性路径
//! - `registry`: 按类型标签构造后端适配器
//! - `error`: 错误类型
//! - `test`: Mock 实现
//!
//! ## 数据流
//!
//! 调用方 → `RemoteStore` (按 key 入队) → `BufferedStore` (命中或读穿透)
//! → 写入标记 dirty → 定时 flush 以一次 `bulk` 发给后端 → 持久化确认完成

pub mod cache;
pub mod config;
pub mod error;
pub mod front;
pub mod path;
pub mod registry;
pub mod test;

pub use cache::{BufferedStore, DurableAck, FlushOutcome, StoreMetricsSnapshot};
pub use config::{ConfigLoader, ConfigOverrides, FlushFailurePolicy, NodeConfig, StoreConfig};
pub use error::{RemoraError, Result};
pub use front::RemoteStore;
pub use path::{PathSegment, ValuePath};
pub use registry::BackendRegistry;

pub use remora_storage::BackendSettings;
pub use remora_traits::{Backend, BackendDefaults, BackendError, BulkOperation, Payload};
