//! # Test Support
//!
//! 单元测试与集成测试共用的 Mock 实现。
//!
//! ```rust,no_run
//! use remora_core::test::MockBackend;
//! use remora_traits::Payload;
//!
//! let backend = MockBackend::new();
//! backend.insert_raw("pad:1", Payload::Text("{\"a\":1}".to_string()));
//! assert_eq!(backend.call_count("get"), 0);
//! ```


pub use mocks::{CallRecord, MockBackend, MockCallTracker};
