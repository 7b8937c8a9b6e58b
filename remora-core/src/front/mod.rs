//! # Key-Serialized Front
//!
//! `RemoteStore` 把同一个 key 的所有操作放进一个 FIFO 队列串行执行，
//! 不同 key 并发执行；值在边界处以拥有所有权的副本进出。

mod queue;
pub mod remote;

pub use remote::RemoteStore;
