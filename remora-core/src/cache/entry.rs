use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::{RemoraError, Result};

pub(crate) type AckSender = oneshot::Sender<Result<()>>;

/// 缓存条目
#[derive(Debug)]
pub(crate) struct CacheEntry {
    /// 反序列化后的文档，`Null` 表示已删除
    pub value: Value,
    /// 与最近一次持久化状态不同，且尚未进入已完成的 flush
    pub dirty: bool,
    /// 当前值属于正在进行的批量写入
    pub writing_in_progress: bool,
    /// 逻辑访问时钟 (用于 LRU)
    pub last_access: u64,
    /// 等待持久化结果的写入确认，按写入顺序排列
    pub pending_acks: Vec<AckSender>,
}

impl CacheEntry {
    pub fn clean(value: Value, tick: u64) -> Self {
        Self {
            value,
            dirty: false,
            writing_in_progress: false,
            last_access: tick,
            pending_acks: Vec::new(),
        }
    }

    pub fn dirty(value: Value, tick: u64) -> Self {
        Self {
            dirty: true,
            ..Self::clean(value, tick)
        }
    }

    /// 可被淘汰：既不 dirty 也不在写入中
    pub fn is_evictable(&self) -> bool {
        !self.dirty && !self.writing_in_progress
    }

    pub fn touch(&mut self, tick: u64) {
        self.last_access = tick;
    }
}

/// 持久化确认
///
/// 写入被远端确认 (或失败) 时完成。缓冲模式下由下一次覆盖该写入的 flush
/// 完成；直写模式下立即就绪。存储在结果送达前被丢弃时返回
/// `RemoraError::Cancelled`。
#[derive(Debug)]
#[must_use = "a durable ack does nothing unless awaited; dropping it only loses the result"]
pub struct DurableAck {
    state: AckState,
}

#[derive(Debug)]
enum AckState {
    Ready(Option<Result<()>>),
    Pending(oneshot::Receiver<Result<()>>),
}

impl DurableAck {
    pub(crate) fn ready(result: Result<()>) -> Self {
        Self {
            state: AckState::Ready(Some(result)),
        }
    }

    pub(crate) fn pending(receiver: oneshot::Receiver<Result<()>>) -> Self {
        Self {
            state: AckState::Pending(receiver),
        }
    }
}

impl Future for DurableAck {
    type Output = Result<()>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().state {
            AckState::Ready(result) => {
                Poll::Ready(result.take().unwrap_or(Err(RemoraError::Cancelled)))
            }
            AckState::Pending(receiver) => Pin::new(receiver)
                .poll(cx)
                .map(|received| received.unwrap_or(Err(RemoraError::Cancelled))),
        }
    }
}
