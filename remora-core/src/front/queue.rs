use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;

use futures::FutureExt;
use parking_lot::Mutex;
use tracing::error;

pub(crate) type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// 按 key 串行执行的任务队列
///
/// 每个有待执行任务的 key 对应一个 drainer 任务，按提交顺序逐个执行；
/// 队列清空时 drainer 删除自己的队列并退出。不同 key 之间并发执行。
#[derive(Clone, Default)]
pub(crate) struct KeyQueues {
    queues: Arc<Mutex<HashMap<String, VecDeque<Job>>>>,
}

impl KeyQueues {
    pub fn new() -> Self {
        Self::default()
    }

    /// 同步入队，必要时启动该 key 的 drainer
    ///
    /// 必须在 tokio 运行时中调用。
    pub fn submit(&self, key: &str, job: Job) {
        let mut queues = self.queues.lock();
        if let Some(queue) = queues.get_mut(key) {
            queue.push_back(job);
            return;
        }

        queues.insert(key.to_string(), VecDeque::from([job]));
        drop(queues);
        tokio::spawn(self.clone().drain(key.to_string()));
    }

    async fn drain(self, key: String) {
        loop {
            let job = {
                let mut queues = self.queues.lock();
                let Some(queue) = queues.get_mut(&key) else {
                    return;
                };
                match queue.pop_front() {
                    Some(job) => job,
                    None => {
                        queues.remove(&key);
                        return;
                    }
                }
            };

            if AssertUnwindSafe(job).catch_unwind().await.is_err() {
                error!(key = %key, "Queued operation panicked");
            }
        }
    }

    /// 当前有 drainer 的 key 数量
    pub fn active_keys(&self) -> usize {
        self.queues.lock().len()
    }

    /// 某个 key 尚未开始执行的任务数
    pub fn pending(&self, key: &str) -> usize {
        self.queues.lock().get(key).map_or(0, VecDeque::len)
    }
}
