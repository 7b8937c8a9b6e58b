//! # Buffered Store
//!
//! 写回 + 读穿透缓存，包在一个 `Backend` 外面。
//!
//! - 读：命中直接返回副本；未命中从远端读取并 (按配置) 缓存
//! - 写：缓冲模式下只标记 dirty，由定时 flush 统一以一次批量写入发出；
//!   直写模式下立即写入远端
//! - 淘汰：超过容量时按 LRU 淘汰到一半容量，dirty 和写入中的条目永不淘汰
//!
//! 状态锁只在同步区段持有，任何 `.await` 之前释放。

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use remora_traits::{Backend, BulkOperation, Payload};
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::entry::{AckSender, CacheEntry, DurableAck};
use super::metrics::{StoreMetrics, StoreMetricsSnapshot};
use crate::config::{FlushFailurePolicy, StoreConfig};
use crate::error::{RemoraError, Result};
use crate::path::ValuePath;

/// 一次 `flush` 调用的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    /// 已有 flush 在进行，本次直接返回
    Busy,
    /// 没有 dirty 条目
    Idle,
    /// 发出了一次批量写入
    Flushed { entries: usize, result: Result<()> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Running,
    /// `shutdown` 完成，不再接受写入
    Stopped,
    /// `close` 之后，读写都拒绝
    Closed,
}

struct StoreState {
    entries: HashMap<String, CacheEntry>,
    clock: u64,
    flushing: bool,
    shutdown_waiters: Vec<oneshot::Sender<()>>,
    lifecycle: Lifecycle,
}

impl StoreState {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            clock: 0,
            flushing: false,
            shutdown_waiters: Vec::new(),
            lifecycle: Lifecycle::Running,
        }
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn ensure_writable(&self) -> Result<()> {
        match self.lifecycle {
            Lifecycle::Running => Ok(()),
            Lifecycle::Stopped | Lifecycle::Closed => Err(RemoraError::Closed),
        }
    }

    /// 命中时刷新访问时钟并返回副本
    fn lookup(&mut self, key: &str, caching: bool) -> Option<Value> {
        let tick = self.clock + 1;
        let entry = self.entries.get_mut(key)?;
        if !(caching || entry.dirty || entry.writing_in_progress) {
            return None;
        }
        entry.touch(tick);
        self.clock = tick;
        Some(entry.value.clone())
    }

    /// LRU 淘汰，返回 `None` 表示本轮未执行
    fn evict(&mut self, capacity: usize) -> Option<usize> {
        if capacity == 0 || self.entries.len() < capacity {
            return None;
        }

        let mut candidates: Vec<(u64, String)> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_evictable())
            .map(|(key, entry)| (entry.last_access, key.clone()))
            .collect();
        candidates.sort_unstable();

        let mut evicted = 0;
        for (_, key) in candidates {
            if 2 * self.entries.len() <= capacity {
                break;
            }
            self.entries.remove(&key);
            evicted += 1;
        }
        Some(evicted)
    }

    fn dirty_len(&self) -> usize {
        self.entries.values().filter(|entry| entry.dirty).count()
    }
}

struct StoreInner {
    backend: Arc<dyn Backend>,
    config: StoreConfig,
    state: Mutex<StoreState>,
    metrics: StoreMetrics,
    cancel: CancellationToken,
}

impl StoreInner {
    fn decode(&self, payload: Option<Payload>) -> Result<Value> {
        match payload {
            None => Ok(Value::Null),
            Some(Payload::Json(value)) => Ok(value),
            Some(Payload::Text(text)) if self.config.json_encode => {
                serde_json::from_str(&text).map_err(|e| {
                    RemoraError::encoding(format!("stored value is not valid JSON: {}", e))
                })
            }
            Some(Payload::Text(text)) => Ok(Value::String(text)),
        }
    }

    fn encode(&self, value: Value) -> Payload {
        if self.config.json_encode {
            Payload::Text(value.to_string())
        } else {
            Payload::Json(value)
        }
    }

    fn to_operation(&self, key: &str, value: &Value) -> BulkOperation {
        if value.is_null() {
            BulkOperation::Remove {
                key: key.to_string(),
            }
        } else {
            BulkOperation::Set {
                key: key.to_string(),
                payload: self.encode(value.clone()),
            }
        }
    }

    fn run_gc(&self, state: &mut StoreState) {
        if let Some(evicted) = state.evict(self.config.cache_capacity) {
            self.metrics.record_gc(evicted);
            if evicted > 0 {
                info!("garbage collected {} values", evicted);
            }
        }
    }
}

impl Drop for StoreInner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// 写回缓存
///
/// 克隆开销很小，所有克隆共享同一份缓存状态。
#[derive(Clone)]
pub struct BufferedStore {
    inner: Arc<StoreInner>,
}

impl BufferedStore {
    /// 创建缓存并在开启写缓冲时启动 flush 定时任务
    ///
    /// 开启写缓冲时必须在 tokio 运行时中调用。
    pub fn new(backend: Arc<dyn Backend>, config: StoreConfig) -> Self {
        let inner = Arc::new(StoreInner {
            backend,
            config,
            state: Mutex::new(StoreState::new()),
            metrics: StoreMetrics::new(),
            cancel: CancellationToken::new(),
        });

        if inner.config.buffering_enabled() {
            spawn_flush_timer(&inner);
        }

        debug!(
            backend = inner.backend.name(),
            cache_capacity = inner.config.cache_capacity,
            flush_interval_ms = inner.config.flush_interval_ms,
            json_encode = inner.config.json_encode,
            "Buffered store created"
        );

        Self { inner }
    }

    pub async fn init(&self) -> Result<()> {
        self.inner.backend.init().await?;
        Ok(())
    }

    /// 读取整个文档，不存在时返回 `Null`
    pub async fn get(&self, key: &str) -> Result<Value> {
        let inner = &self.inner;
        let caching = inner.config.caching_enabled();
        inner.metrics.record_request();

        {
            let mut state = inner.state.lock();
            if state.lifecycle == Lifecycle::Closed {
                return Err(RemoraError::Closed);
            }
            if let Some(value) = state.lookup(key, caching) {
                inner.metrics.record_hit();
                debug!(key, source = "cache", "GET");
                return Ok(value);
            }
        }

        inner.metrics.record_miss();
        let payload = inner.backend.get(key).await?;
        let value = inner.decode(payload).map_err(|e| {
            error!(key, "Failed to decode stored value: {}", e);
            e
        })?;

        let mut state = inner.state.lock();
        if let Some(resident) = state.lookup(key, caching) {
            debug!(key, source = "cache", "GET raced with a write, keeping resident value");
            return Ok(resident);
        }
        if caching {
            let tick = state.tick();
            state
                .entries
                .insert(key.to_string(), CacheEntry::clean(value.clone(), tick));
            inner.run_gc(&mut state);
        }
        debug!(key, source = "remote", "GET");
        Ok(value)
    }

    /// 写入整个文档，`Null` 表示删除
    ///
    /// 返回即缓冲确认；返回的 `DurableAck` 在远端确认后完成。
    pub async fn set(&self, key: &str, value: Value) -> Result<DurableAck> {
        if !self.inner.config.buffering_enabled() {
            return self.write_through(key, value).await;
        }

        let inner = &self.inner;
        let (tx, rx) = oneshot::channel();
        {
            let mut state = inner.state.lock();
            state.ensure_writable()?;
            let tick = state.tick();
            let entry = state
                .entries
                .entry(key.to_string())
                .or_insert_with(|| CacheEntry::dirty(Value::Null, tick));
            entry.value = value;
            entry.dirty = true;
            entry.touch(tick);
            entry.pending_acks.push(tx);
            inner.run_gc(&mut state);
        }

        debug!(key, dest = "buffer", "SET");
        Ok(DurableAck::pending(rx))
    }

    pub async fn remove(&self, key: &str) -> Result<DurableAck> {
        debug!(key, "REMOVE");
        self.set(key, Value::Null).await
    }

    /// 读取文档内的子值，路径上任一节点缺失时返回 `Null`
    pub async fn get_sub(&self, key: &str, path: &ValuePath) -> Result<Value> {
        let document = self.get(key).await?;
        let value = path.lookup(&document).cloned().unwrap_or(Value::Null);
        debug!(key, path = %path, "GETSUB");
        Ok(value)
    }

    /// 读取整个文档，写入子值后整体写回
    pub async fn set_sub(&self, key: &str, path: &ValuePath, value: Value) -> Result<DurableAck> {
        debug!(key, path = %path, "SETSUB");
        if path.is_empty() {
            return self.set(key, value).await;
        }
        let mut document = self.get(key).await?;
        path.assign(&mut document, value)?;
        self.set(key, document).await
    }

    /// 把所有 dirty 条目作为一次批量写入发出
    ///
    /// 批量写入在独立任务中执行，丢弃返回的 future 不会打断它。
    pub async fn flush(&self) -> FlushOutcome {
        let store = self.clone();
        match tokio::spawn(async move { store.flush_once().await }).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Flush task failed: {}", e);
                FlushOutcome::Flushed {
                    entries: 0,
                    result: Err(RemoraError::Cancelled),
                }
            }
        }
    }

    async fn flush_once(&self) -> FlushOutcome {
        let inner = &self.inner;

        let (operations, acks, keys) = {
            let mut state = inner.state.lock();
            if state.flushing {
                return FlushOutcome::Busy;
            }

            let mut keys: Vec<String> = state
                .entries
                .iter()
                .filter(|(_, entry)| entry.dirty)
                .map(|(key, _)| key.clone())
                .collect();

            if keys.is_empty() {
                let waiters = std::mem::take(&mut state.shutdown_waiters);
                drop(state);
                if !waiters.is_empty() {
                    debug!("Buffer drained, releasing {} shutdown waiter(s)", waiters.len());
                }
                for waiter in waiters {
                    let _ = waiter.send(());
                }
                return FlushOutcome::Idle;
            }

            keys.sort_unstable();
            let mut operations = Vec::with_capacity(keys.len());
            let mut acks: Vec<(String, AckSender)> = Vec::new();
            for key in &keys {
                if let Some(entry) = state.entries.get_mut(key) {
                    operations.push(inner.to_operation(key, &entry.value));
                    acks.extend(entry.pending_acks.drain(..).map(|ack| (key.clone(), ack)));
                    entry.dirty = false;
                    entry.writing_in_progress = true;
                }
            }
            state.flushing = true;
            (operations, acks, keys)
        };

        let count = operations.len();
        info!("Flushed {} values", count);
        let result = inner.backend.bulk(operations).await.map_err(RemoraError::from);
        inner.metrics.record_flush(count, result.is_err());
        if let Err(e) = &result {
            warn!(entries = count, "Bulk write failed: {}", e);
        }

        resolve_acks(acks, &result);

        {
            let mut state = inner.state.lock();
            let retry = result.is_err() && inner.config.flush_failure == FlushFailurePolicy::Retry;
            for key in &keys {
                let reap = match state.entries.get_mut(key) {
                    Some(entry) => {
                        entry.writing_in_progress = false;
                        if retry && !entry.dirty {
                            entry.dirty = true;
                        }
                        !inner.config.caching_enabled() && entry.is_evictable()
                    }
                    None => false,
                };
                if reap {
                    state.entries.remove(key);
                }
            }
            if retry {
                debug!(entries = keys.len(), "Re-marked failed batch dirty");
            }
            inner.run_gc(&mut state);
            state.flushing = false;
        }

        FlushOutcome::Flushed {
            entries: count,
            result,
        }
    }

    /// 等待写缓冲清空，之后停止 flush 定时任务并拒绝新的写入
    ///
    /// 可以重复调用，也可以并发调用；定时任务停止后由调用方自己推动 flush。
    pub async fn shutdown(&self) -> Result<()> {
        if !self.inner.config.buffering_enabled() {
            let mut state = self.inner.state.lock();
            if state.lifecycle == Lifecycle::Running {
                state.lifecycle = Lifecycle::Stopped;
            }
            return Ok(());
        }

        let (drained, timer_stopped) = {
            let mut state = self.inner.state.lock();
            if state.lifecycle == Lifecycle::Closed {
                return Ok(());
            }
            let (tx, rx) = oneshot::channel();
            state.shutdown_waiters.push(tx);
            (rx, self.inner.cancel.is_cancelled())
        };

        debug!("Waiting for the write buffer to drain");
        if timer_stopped {
            self.drain_inline().await;
        }
        drained.await.map_err(|_| RemoraError::Cancelled)?;

        self.inner.cancel.cancel();
        let leftover = {
            let mut state = self.inner.state.lock();
            if state.lifecycle == Lifecycle::Running {
                state.lifecycle = Lifecycle::Stopped;
            }
            state.lifecycle != Lifecycle::Closed
                && (state.dirty_len() > 0 || !state.shutdown_waiters.is_empty())
        };
        // 定时任务停止前进入的写入或等待者
        if leftover {
            self.drain_inline().await;
        }
        info!("Buffered store shut down");
        Ok(())
    }

    async fn drain_inline(&self) {
        let interval = self.inner.config.flush_interval();
        loop {
            match self.flush().await {
                FlushOutcome::Idle => break,
                FlushOutcome::Busy => tokio::time::sleep(interval).await,
                FlushOutcome::Flushed { result: Err(_), .. } => tokio::time::sleep(interval).await,
                FlushOutcome::Flushed { result: Ok(()), .. } => {}
            }
            if self.inner.state.lock().lifecycle == Lifecycle::Closed {
                break;
            }
        }
    }

    /// 停止定时任务并关闭远端连接
    ///
    /// 未 flush 的写入会丢失，需要持久化时先调用 `shutdown`。
    pub async fn close(&self) -> Result<()> {
        self.inner.cancel.cancel();
        let unflushed = {
            let mut state = self.inner.state.lock();
            state.lifecycle = Lifecycle::Closed;
            state.shutdown_waiters.clear();
            state.dirty_len()
        };
        if unflushed > 0 {
            warn!("Closing with {} unflushed value(s)", unflushed);
        }
        self.inner.backend.close().await?;
        Ok(())
    }

    async fn write_through(&self, key: &str, value: Value) -> Result<DurableAck> {
        let inner = &self.inner;
        inner.state.lock().ensure_writable()?;

        debug!(key, dest = "remote", "SET");
        let result = if value.is_null() {
            inner.backend.remove(key).await
        } else {
            inner.backend.set(key, inner.encode(value.clone())).await
        }
        .map_err(RemoraError::from);

        let mut state = inner.state.lock();
        match &result {
            Ok(()) => {
                let tick = state.tick();
                if let Some(entry) = state.entries.get_mut(key) {
                    entry.value = value;
                    entry.touch(tick);
                }
            }
            Err(e) => {
                warn!(key, "Write failed: {}", e);
                if state.entries.get(key).is_some_and(CacheEntry::is_evictable) {
                    state.entries.remove(key);
                }
            }
        }
        drop(state);

        result?;
        Ok(DurableAck::ready(Ok(())))
    }

    /// 驻留条目数
    pub fn buffer_len(&self) -> usize {
        self.inner.state.lock().entries.len()
    }

    pub fn dirty_len(&self) -> usize {
        self.inner.state.lock().dirty_len()
    }

    pub fn is_resident(&self, key: &str) -> bool {
        self.inner.state.lock().entries.contains_key(key)
    }

    pub fn is_flushing(&self) -> bool {
        self.inner.state.lock().flushing
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    pub fn backend_name(&self) -> &str {
        self.inner.backend.name()
    }

    pub fn metrics(&self) -> StoreMetricsSnapshot {
        self.inner.metrics.snapshot()
    }
}

impl std::fmt::Debug for BufferedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferedStore")
            .field("backend", &self.inner.backend.name())
            .field("config", &self.inner.config)
            .field("buffer_len", &self.buffer_len())
            .finish()
    }
}

fn resolve_acks(acks: Vec<(String, AckSender)>, result: &Result<()>) {
    for (key, ack) in acks {
        if ack.send(result.clone()).is_err() {
            if let Err(e) = result {
                error!(key = %key, "Unobserved write failed: {}", e);
            }
        }
    }
}

fn spawn_flush_timer(inner: &Arc<StoreInner>) {
    let weak: Weak<StoreInner> = Arc::downgrade(inner);
    let cancel = inner.cancel.clone();
    let period = inner.config.flush_interval();

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // interval 的第一次 tick 立即完成
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let Some(inner) = weak.upgrade() else { break };
                    let store = BufferedStore { inner };
                    tokio::spawn(async move {
                        store.flush_once().await;
                    });
                }
            }
        }
        debug!("Flush timer stopped");
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::MockBackend;
    use serde_json::json;
    use std::time::Duration;

    fn store_with(backend: &Arc<MockBackend>, config: StoreConfig) -> BufferedStore {
        BufferedStore::new(backend.clone(), config)
    }

    /// 缓冲开启但定时器周期足够长，由测试手动 flush
    fn manual_config() -> StoreConfig {
        StoreConfig::new(1000, 3_600_000, true)
    }

    #[tokio::test]
    async fn test_get_missing_returns_null() {
        let backend = Arc::new(MockBackend::new());
        let store = store_with(&backend, manual_config());

        assert_eq!(store.get("missing").await.unwrap(), Value::Null);
        backend.tracker().assert_call_count("get", 1);
    }

    #[tokio::test]
    async fn test_read_through_then_hit() {
        let backend = Arc::new(MockBackend::new());
        backend.insert_raw("k", Payload::Text("{\"a\":1}".to_string()));
        let store = store_with(&backend, manual_config());

        assert_eq!(store.get("k").await.unwrap(), json!({"a": 1}));
        assert_eq!(store.get("k").await.unwrap(), json!({"a": 1}));
        backend.tracker().assert_call_count("get", 1);

        let metrics = store.metrics();
        assert_eq!(metrics.hits, 1);
        assert_eq!(metrics.misses, 1);
    }

    #[tokio::test]
    async fn test_set_buffers_without_backend_io() {
        let backend = Arc::new(MockBackend::new());
        let store = store_with(&backend, manual_config());

        let _ack = store.set("k", json!(1)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), json!(1));
        assert_eq!(store.dirty_len(), 1);
        assert_eq!(backend.call_count("get"), 0);
        assert_eq!(backend.call_count("set"), 0);
        assert_eq!(backend.call_count("bulk"), 0);
    }

    #[tokio::test]
    async fn test_flush_resolves_acks_in_order() {
        let backend = Arc::new(MockBackend::new());
        let store = store_with(&backend, manual_config());

        let first = store.set("a", json!(1)).await.unwrap();
        let second = store.set("a", json!(2)).await.unwrap();
        let third = store.remove("b").await.unwrap();

        let outcome = store.flush().await;
        assert_eq!(outcome, FlushOutcome::Flushed { entries: 2, result: Ok(()) });
        assert_eq!(first.await, Ok(()));
        assert_eq!(second.await, Ok(()));
        assert_eq!(third.await, Ok(()));

        assert_eq!(backend.stored("a"), Some(Payload::Text("2".to_string())));
        assert!(backend.tracker().was_called_with("bulk", &["a", "b"]));
        assert_eq!(store.dirty_len(), 0);
        assert_eq!(store.flush().await, FlushOutcome::Idle);
    }

    #[tokio::test]
    async fn test_null_is_sent_as_remove() {
        let backend = Arc::new(MockBackend::new());
        backend.insert_raw("gone", Payload::Text("1".to_string()));
        let store = store_with(&backend, manual_config());

        let ack = store.remove("gone").await.unwrap();
        store.flush().await;
        ack.await.unwrap();

        assert_eq!(backend.stored("gone"), None);
        assert_eq!(store.get("gone").await.unwrap(), Value::Null);
    }

    #[tokio::test]
    async fn test_failed_flush_reports_to_every_ack() {
        let backend = Arc::new(MockBackend::new());
        let store = store_with(&backend, manual_config());

        let a = store.set("a", json!(1)).await.unwrap();
        let b = store.set("b", json!(2)).await.unwrap();
        backend.fail_next_bulks(1);

        let outcome = store.flush().await;
        assert!(matches!(outcome, FlushOutcome::Flushed { entries: 2, result: Err(_) }));
        assert!(matches!(a.await, Err(RemoraError::Backend(_))));
        assert!(matches!(b.await, Err(RemoraError::Backend(_))));

        // Report: 条目保持 clean，不会自动重试
        assert_eq!(store.dirty_len(), 0);
        assert_eq!(store.flush().await, FlushOutcome::Idle);
        assert_eq!(store.metrics().flush_errors, 1);
    }

    #[tokio::test]
    async fn test_retry_policy_re_marks_dirty() {
        let backend = Arc::new(MockBackend::new());
        let config = manual_config().with_flush_failure(FlushFailurePolicy::Retry);
        let store = store_with(&backend, config);

        let ack = store.set("a", json!(1)).await.unwrap();
        backend.fail_next_bulks(1);
        store.flush().await;
        assert!(ack.await.is_err());
        assert_eq!(store.dirty_len(), 1);

        assert_eq!(
            store.flush().await,
            FlushOutcome::Flushed { entries: 1, result: Ok(()) }
        );
        assert_eq!(backend.stored("a"), Some(Payload::Text("1".to_string())));
    }

    #[tokio::test]
    async fn test_write_through_mode() {
        let backend = Arc::new(MockBackend::new());
        let store = store_with(&backend, StoreConfig::new(1000, 0, true));

        store.set("k", json!({"x": 1})).await.unwrap().await.unwrap();
        backend.tracker().assert_call_count("set", 1);
        assert_eq!(store.buffer_len(), 0);
        assert_eq!(backend.stored("k"), Some(Payload::Text("{\"x\":1}".to_string())));

        store.remove("k").await.unwrap().await.unwrap();
        backend.tracker().assert_call_count("remove", 1);
        assert_eq!(backend.stored("k"), None);
    }

    #[tokio::test]
    async fn test_write_through_refreshes_resident_entry() {
        let backend = Arc::new(MockBackend::new());
        backend.insert_raw("k", Payload::Text("1".to_string()));
        let store = store_with(&backend, StoreConfig::new(1000, 0, true));

        assert_eq!(store.get("k").await.unwrap(), json!(1));
        store.set("k", json!(2)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), json!(2));
        backend.tracker().assert_call_count("get", 1);
    }

    #[tokio::test]
    async fn test_write_through_failure_evicts_and_reports() {
        let backend = Arc::new(MockBackend::new());
        backend.insert_raw("k", Payload::Text("1".to_string()));
        let store = store_with(&backend, StoreConfig::new(1000, 0, true));

        store.get("k").await.unwrap();
        backend.fail_next_writes(1);
        let result = store.set("k", json!(2)).await;
        assert!(matches!(result, Err(RemoraError::Backend(_))));
        assert!(!store.is_resident("k"));
        assert_eq!(store.get("k").await.unwrap(), json!(1));
    }

    #[tokio::test]
    async fn test_failed_read_through_is_not_cached() {
        let backend = Arc::new(MockBackend::new());
        backend.insert_raw("k", Payload::Text("2".to_string()));
        let store = store_with(&backend, manual_config());

        backend.fail_next_gets(1);
        assert!(matches!(store.get("k").await, Err(RemoraError::Backend(_))));
        assert!(!store.is_resident("k"));

        assert_eq!(store.get("k").await.unwrap(), json!(2));
        let reads = backend.tracker().get_calls_for("get");
        assert_eq!(reads.len(), 2);
        assert!(reads.iter().all(|call| call.args == vec!["k".to_string()]));
        assert_eq!(backend.stored_len(), 1);
    }

    #[tokio::test]
    async fn test_init_failure_is_reported() {
        let backend = Arc::new(MockBackend::new().with_invalid());
        let store = store_with(&backend, manual_config());

        assert!(matches!(store.init().await, Err(RemoraError::Backend(_))));
        let calls = backend.tracker().get_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].method, "init");
    }

    #[tokio::test]
    async fn test_decode_failure_does_not_populate_cache() {
        let backend = Arc::new(MockBackend::new());
        backend.insert_raw("bad", Payload::Text("{oops".to_string()));
        let store = store_with(&backend, manual_config());

        assert!(matches!(store.get("bad").await, Err(RemoraError::Encoding(_))));
        assert!(!store.is_resident("bad"));
    }

    #[tokio::test]
    async fn test_raw_mode_passes_json_payloads() {
        let backend = Arc::new(MockBackend::new());
        let store = store_with(&backend, StoreConfig::new(1000, 3_600_000, false));

        store.set("k", json!({"n": [1, 2]})).await.unwrap();
        store.flush().await;
        assert_eq!(backend.stored("k"), Some(Payload::Json(json!({"n": [1, 2]}))));
    }

    #[tokio::test]
    async fn test_cache_disabled_still_serves_dirty_entries() {
        let backend = Arc::new(MockBackend::new());
        backend.insert_raw("k", Payload::Text("1".to_string()));
        let store = store_with(&backend, StoreConfig::new(0, 3_600_000, true));

        assert_eq!(store.get("k").await.unwrap(), json!(1));
        assert_eq!(store.buffer_len(), 0);

        store.set("k", json!(2)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), json!(2));
        assert_eq!(backend.call_count("get"), 1);

        store.flush().await;
        assert_eq!(store.buffer_len(), 0);
        assert_eq!(store.get("k").await.unwrap(), json!(2));
        assert_eq!(backend.call_count("get"), 2);
    }

    #[tokio::test]
    async fn test_eviction_keeps_dirty_entries() {
        let backend = Arc::new(MockBackend::new());
        let store = store_with(&backend, StoreConfig::new(4, 3_600_000, true));

        for i in 0..6 {
            let _ = store.set(&format!("k{}", i), json!(i)).await.unwrap();
        }
        assert_eq!(store.buffer_len(), 6);

        for i in 0..6 {
            assert_eq!(store.get(&format!("k{}", i)).await.unwrap(), json!(i));
        }
        assert_eq!(backend.call_count("get"), 0);
    }

    #[tokio::test]
    async fn test_eviction_is_least_recently_used() {
        let backend = Arc::new(MockBackend::new());
        let store = store_with(&backend, StoreConfig::new(4, 3_600_000, true));

        store.get("a").await.unwrap();
        store.get("b").await.unwrap();
        store.get("c").await.unwrap();
        store.get("a").await.unwrap();
        store.get("d").await.unwrap();

        // 4 条时触发淘汰，b 和 c 最久未访问
        assert_eq!(store.buffer_len(), 2);
        assert!(store.is_resident("a"));
        assert!(store.is_resident("d"));
    }

    #[tokio::test]
    async fn test_set_sub_creates_document() {
        let backend = Arc::new(MockBackend::new());
        let store = store_with(&backend, manual_config());

        let path = ValuePath::root().key("a").key("b");
        store.set_sub("doc", &path, json!(1)).await.unwrap();
        assert_eq!(store.get("doc").await.unwrap(), json!({"a": {"b": 1}}));
        assert_eq!(store.get_sub("doc", &path).await.unwrap(), json!(1));
        assert_eq!(
            store.get_sub("doc", &ValuePath::root().key("x").key("y")).await.unwrap(),
            Value::Null
        );
    }

    #[tokio::test]
    async fn test_set_sub_through_scalar_fails() {
        let backend = Arc::new(MockBackend::new());
        let store = store_with(&backend, manual_config());

        store.set("doc", json!({"a": 1})).await.unwrap();
        let result = store
            .set_sub("doc", &ValuePath::root().key("a").key("b"), json!(2))
            .await;
        assert!(matches!(result, Err(RemoraError::InvalidPath(_))));
        assert_eq!(store.get("doc").await.unwrap(), json!({"a": 1}));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_flushes_buffer() {
        let backend = Arc::new(MockBackend::new());
        let store = store_with(&backend, StoreConfig::new(1000, 100, true));

        let ack = store.set("k", json!("v")).await.unwrap();
        assert_eq!(ack.await, Ok(()));
        assert_eq!(backend.stored("k"), Some(Payload::Text("\"v\"".to_string())));
        assert_eq!(store.metrics().flushes, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_then_writes_are_rejected() {
        let backend = Arc::new(MockBackend::new());
        let store = store_with(&backend, StoreConfig::new(1000, 100, true));

        let _ = store.set("k", json!(1)).await.unwrap();
        store.shutdown().await.unwrap();
        assert_eq!(store.dirty_len(), 0);
        assert!(matches!(store.set("k", json!(2)).await, Err(RemoraError::Closed)));
        assert_eq!(store.get("k").await.unwrap(), json!(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_shutdown_returns() {
        let backend = Arc::new(MockBackend::new());
        let store = store_with(&backend, StoreConfig::new(1000, 100, true));

        let _ = store.set("k", json!(1)).await.unwrap();
        store.shutdown().await.unwrap();
        tokio::time::timeout(Duration::from_secs(60), store.shutdown())
            .await
            .expect("second shutdown hung")
            .unwrap();
        assert_eq!(backend.stored("k"), Some(Payload::Text("1".to_string())));
        backend.tracker().assert_call_count("bulk", 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_shutdowns_both_return() {
        let backend = Arc::new(MockBackend::new().with_bulk_delay(Duration::from_millis(300)));
        let store = store_with(&backend, StoreConfig::new(1000, 100, true));

        let _ = store.set("a", json!(1)).await.unwrap();
        let _ = store.set("b", json!(2)).await.unwrap();
        let first = tokio::spawn({
            let store = store.clone();
            async move { store.shutdown().await }
        });
        let second = tokio::spawn({
            let store = store.clone();
            async move { store.shutdown().await }
        });

        let (first, second) = tokio::time::timeout(Duration::from_secs(60), async {
            (first.await.unwrap(), second.await.unwrap())
        })
        .await
        .expect("concurrent shutdown hung");
        assert_eq!(first, Ok(()));
        assert_eq!(second, Ok(()));
        assert_eq!(store.dirty_len(), 0);
        backend.tracker().assert_call_count("bulk", 1);
    }

    #[tokio::test]
    async fn test_shutdown_without_buffering_is_immediate() {
        let backend = Arc::new(MockBackend::new());
        let store = store_with(&backend, StoreConfig::new(0, 0, true));
        store.shutdown().await.unwrap();
        assert_eq!(backend.call_count("bulk"), 0);
    }

    #[tokio::test]
    async fn test_close_rejects_operations() {
        let backend = Arc::new(MockBackend::new());
        let store = store_with(&backend, manual_config());

        store.close().await.unwrap();
        assert!(backend.is_closed());
        assert!(matches!(store.get("k").await, Err(RemoraError::Closed)));
        assert!(matches!(store.set("k", json!(1)).await, Err(RemoraError::Closed)));
    }

    #[tokio::test]
    async fn test_dropped_store_stops_timer() {
        let backend = Arc::new(MockBackend::new());
        let store = store_with(&backend, StoreConfig::new(10, 10, true));
        drop(store);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(backend.call_count("bulk"), 0);
    }
}
