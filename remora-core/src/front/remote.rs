use std::future::Future;
use std::sync::Arc;

use remora_storage::BackendSettings;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{oneshot, OnceCell};
use tracing::{debug, info, warn};

use super::queue::KeyQueues;
use crate::cache::{BufferedStore, DurableAck};
use crate::config::{ConfigOverrides, StoreConfig};
use crate::error::{RemoraError, Result};
use crate::path::ValuePath;
use crate::registry::BackendRegistry;

/// 按 key 串行化的远端存储入口
///
/// 同一个 key 的操作按调用顺序逐个执行：调用时同步入队，返回的 future
/// 在该操作完成时就绪。写操作的 future 就绪即缓冲确认，其中的
/// `DurableAck` 为持久化确认。不同 key 的操作并发执行。
///
/// 所有值以拥有所有权的形式进出，调用方拿到的永远是缓存内容的副本。
///
/// ```rust,no_run
/// use remora_core::{RemoteStore, ValuePath};
/// use remora_storage::BackendSettings;
/// use serde_json::json;
///
/// # async fn example() -> remora_core::Result<()> {
/// let store = RemoteStore::new("memory", BackendSettings::default(), Default::default());
/// store.init().await?;
///
/// let durable = store.set("pad:1", json!({"text": "hi"})).await?;
/// store.set_sub("pad:1", ValuePath::root().key("rev"), json!(2)).await?;
/// assert_eq!(store.get("pad:1").await?, json!({"text": "hi", "rev": 2}));
///
/// durable.await?;
/// store.shutdown().await?;
/// store.close().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RemoteStore {
    type_tag: String,
    settings: BackendSettings,
    overrides: ConfigOverrides,
    registry: BackendRegistry,
    store: Arc<OnceCell<BufferedStore>>,
    queues: KeyQueues,
}

impl RemoteStore {
    /// 记录配置，后端在 `init` 时才创建
    pub fn new(type_tag: impl Into<String>, settings: BackendSettings, overrides: ConfigOverrides) -> Self {
        Self::with_registry(type_tag, settings, overrides, BackendRegistry::default())
    }

    pub fn with_registry(
        type_tag: impl Into<String>,
        settings: BackendSettings,
        overrides: ConfigOverrides,
        registry: BackendRegistry,
    ) -> Self {
        Self {
            type_tag: type_tag.into(),
            settings,
            overrides,
            registry,
            store: Arc::new(OnceCell::new()),
            queues: KeyQueues::new(),
        }
    }

    /// 包装一个已创建的缓存
    pub fn from_store(store: BufferedStore) -> Self {
        let type_tag = store.backend_name().to_string();
        Self {
            type_tag,
            settings: BackendSettings::default(),
            overrides: ConfigOverrides::default(),
            registry: BackendRegistry::empty(),
            store: Arc::new(OnceCell::new_with(Some(store))),
            queues: KeyQueues::new(),
        }
    }

    /// 创建后端、解析配置并初始化远端连接
    ///
    /// 失败时保持未初始化状态，可以重试。重复调用成功后无副作用。
    pub async fn init(&self) -> Result<()> {
        self.store
            .get_or_try_init(|| async {
                let backend = self.registry.create(&self.type_tag, &self.settings)?;
                let config = StoreConfig::resolve(&backend.defaults(), &self.overrides);
                config.validate()?;

                if let Err(e) = backend.init().await {
                    warn!(backend = %self.type_tag, "Backend init failed: {}", e);
                    return Err(RemoraError::from(e));
                }

                info!(
                    backend = %self.type_tag,
                    cache_capacity = config.cache_capacity,
                    flush_interval_ms = config.flush_interval_ms,
                    "Remote store initialized"
                );
                Ok::<_, RemoraError>(BufferedStore::new(backend, config))
            })
            .await?;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.store.initialized()
    }

    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    /// 已初始化的缓存
    pub fn buffered(&self) -> Result<&BufferedStore> {
        self.store.get().ok_or(RemoraError::NotInitialized)
    }

    pub fn get(&self, key: &str) -> impl Future<Output = Result<Value>> + Send + 'static {
        self.enqueue(key, |store, key| async move { store.get(&key).await })
    }

    pub fn set(&self, key: &str, value: Value) -> impl Future<Output = Result<DurableAck>> + Send + 'static {
        self.enqueue(key, move |store, key| async move { store.set(&key, value).await })
    }

    pub fn remove(&self, key: &str) -> impl Future<Output = Result<DurableAck>> + Send + 'static {
        self.enqueue(key, |store, key| async move { store.remove(&key).await })
    }

    pub fn get_sub(&self, key: &str, path: ValuePath) -> impl Future<Output = Result<Value>> + Send + 'static {
        self.enqueue(key, move |store, key| async move { store.get_sub(&key, &path).await })
    }

    pub fn set_sub(
        &self,
        key: &str,
        path: ValuePath,
        value: Value,
    ) -> impl Future<Output = Result<DurableAck>> + Send + 'static {
        self.enqueue(key, move |store, key| async move {
            store.set_sub(&key, &path, value).await
        })
    }

    /// 读取并反序列化为 `T`
    pub fn get_as<T>(&self, key: &str) -> impl Future<Output = Result<T>> + Send + 'static
    where
        T: DeserializeOwned + Send + 'static,
    {
        let value = self.get(key);
        async move {
            let value = value.await?;
            serde_json::from_value::<T>(value).map_err(RemoraError::from)
        }
    }

    /// 序列化 `value` 后写入，序列化在调用时完成
    pub fn set_value<T>(&self, key: &str, value: &T) -> impl Future<Output = Result<DurableAck>> + Send + 'static
    where
        T: Serialize + ?Sized,
    {
        match serde_json::to_value(value) {
            Ok(value) => self.enqueue(key, move |store, key| async move { store.set(&key, value).await }),
            Err(e) => self.reject(RemoraError::from(e)),
        }
    }

    /// 等待写缓冲清空
    ///
    /// 不经过按键队列：之前提交的写入需先 await，否则可能以 `Closed` 失败。
    pub async fn shutdown(&self) -> Result<()> {
        self.buffered()?.shutdown().await
    }

    pub async fn close(&self) -> Result<()> {
        self.buffered()?.close().await
    }

    fn enqueue<T, F, Fut>(&self, key: &str, operation: F) -> OperationFuture<T>
    where
        T: Send + 'static,
        F: FnOnce(BufferedStore, String) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let store = match self.prepare(key) {
            Ok(store) => store,
            Err(e) => return self.reject(e),
        };

        let (tx, rx) = oneshot::channel();
        let owned_key = key.to_string();
        self.queues.submit(
            key,
            Box::pin(async move {
                let result = operation(store, owned_key).await;
                // 调用方可能已经放弃等待
                let _ = tx.send(result);
            }),
        );
        debug!(key, pending = self.queues.pending(key), "Operation queued");
        OperationFuture::new(rx)
    }

    fn reject<T>(&self, error: RemoraError) -> OperationFuture<T> {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(Err(error));
        OperationFuture::new(rx)
    }

    fn prepare(&self, key: &str) -> Result<BufferedStore> {
        if key.is_empty() {
            return Err(RemoraError::invalid_key("key must not be empty"));
        }
        self.buffered().cloned()
    }
}

impl std::fmt::Debug for RemoteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteStore")
            .field("type_tag", &self.type_tag)
            .field("initialized", &self.is_initialized())
            .field("active_keys", &self.queues.active_keys())
            .finish()
    }
}

/// 入队操作的结果
struct OperationFuture<T> {
    receiver: oneshot::Receiver<Result<T>>,
}

impl<T> OperationFuture<T> {
    fn new(receiver: oneshot::Receiver<Result<T>>) -> Self {
        Self { receiver }
    }
}

impl<T> Future for OperationFuture<T> {
    type Output = Result<T>;

    fn poll(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Self::Output> {
        std::pin::Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(RemoraError::Cancelled)))
    }
}
