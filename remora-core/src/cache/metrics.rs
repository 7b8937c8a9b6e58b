use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// 缓存统计
#[derive(Debug, Default)]
pub struct StoreMetrics {
    /// 读请求总数
    requests: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    /// 被淘汰的条目数
    evictions: AtomicU64,
    /// 实际执行的淘汰轮数
    gc_passes: AtomicU64,
    /// 发出的批量写入次数
    flushes: AtomicU64,
    flushed_entries: AtomicU64,
    flush_errors: AtomicU64,
}

impl StoreMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// 记录一轮淘汰及其淘汰数量
    pub fn record_gc(&self, evicted: usize) {
        self.gc_passes.fetch_add(1, Ordering::Relaxed);
        self.evictions.fetch_add(evicted as u64, Ordering::Relaxed);
    }

    pub fn record_flush(&self, entries: usize, failed: bool) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
        self.flushed_entries.fetch_add(entries as u64, Ordering::Relaxed);
        if failed {
            self.flush_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// 命中率 (0.0 - 1.0)
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let total = hits + self.misses.load(Ordering::Relaxed);
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    pub fn snapshot(&self) -> StoreMetricsSnapshot {
        StoreMetricsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            gc_passes: self.gc_passes.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            flushed_entries: self.flushed_entries.load(Ordering::Relaxed),
            flush_errors: self.flush_errors.load(Ordering::Relaxed),
            hit_rate: self.hit_rate(),
        }
    }
}

/// 统计快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreMetricsSnapshot {
    pub requests: u64,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub gc_passes: u64,
    pub flushes: u64,
    pub flushed_entries: u64,
    pub flush_errors: u64,
    pub hit_rate: f64,
}
