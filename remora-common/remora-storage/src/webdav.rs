//! # WebDAV backend
//!
//! 每个键对应 `storage_address` 下的一个资源：GET 读取、PUT 写入、DELETE 删除。
//! 批量写入以有限并发逐条执行。

use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use reqwest::{Client, RequestBuilder};
use tracing::debug;

use remora_traits::{Backend, BackendDefaults, BackendError, BulkOperation, Payload};

use crate::http::{build_client, ensure_success, is_not_found, transport_error};
use crate::settings::BackendSettings;

/// Concurrent requests issued by one bulk write
pub const BULK_CONCURRENCY: usize = 8;

pub struct WebDavBackend {
    client: Client,
    address: String,
    token: Option<String>,
    defaults: BackendDefaults,
    name: &'static str,
}

impl WebDavBackend {
    pub fn new(settings: &BackendSettings) -> Result<Self, BackendError> {
        Self::build(settings, "webdav", BackendDefaults::new(100, 50, true))
    }

    /// Write-through variant: no cache, no write buffer.
    pub fn simple(settings: &BackendSettings) -> Result<Self, BackendError> {
        Self::build(settings, "simple", BackendDefaults::new(0, 0, true))
    }

    fn build(
        settings: &BackendSettings,
        name: &'static str,
        defaults: BackendDefaults,
    ) -> Result<Self, BackendError> {
        let address = settings.require_address()?.to_string();
        Ok(Self {
            client: build_client()?,
            address,
            token: settings.bearer_token.clone(),
            defaults,
            name,
        })
    }

    fn address_of(&self, key: &str) -> String {
        format!("{}{}", self.address, escape_key(key))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn apply(&self, operation: BulkOperation) -> Result<(), BackendError> {
        match operation {
            BulkOperation::Set { key, payload } => self.set(&key, payload).await,
            BulkOperation::Remove { key } => self.remove(&key).await,
        }
    }
}

/// Keys of the form `u*_...` get one more leading `u`, so that no stored
/// resource name ever starts with an underscore.
pub fn escape_key(key: &str) -> String {
    let prefix = key.chars().take_while(|c| *c == 'u').count();
    if key[prefix..].starts_with('_') {
        format!("u{}", key)
    } else {
        key.to_string()
    }
}

#[async_trait]
impl Backend for WebDavBackend {
    fn name(&self) -> &str {
        self.name
    }

    fn defaults(&self) -> BackendDefaults {
        self.defaults
    }

    async fn init(&self) -> Result<(), BackendError> {
        debug!("WebDAV backend ready at {}", self.address);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Payload>, BackendError> {
        let response = self
            .authorize(self.client.get(self.address_of(key)))
            .send()
            .await
            .map_err(transport_error)?;
        if is_not_found(&response) {
            return Ok(None);
        }
        let body = ensure_success(response)
            .await?
            .text()
            .await
            .map_err(transport_error)?;
        Ok(Some(Payload::Text(body)))
    }

    async fn set(&self, key: &str, payload: Payload) -> Result<(), BackendError> {
        debug!("DAV SET {}", key);
        let response = self
            .authorize(self.client.put(self.address_of(key)))
            .body(payload.into_text())
            .send()
            .await
            .map_err(transport_error)?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), BackendError> {
        debug!("DAV REMOVE {}", key);
        let response = self
            .authorize(self.client.delete(self.address_of(key)))
            .send()
            .await
            .map_err(transport_error)?;
        if is_not_found(&response) {
            return Ok(());
        }
        ensure_success(response).await?;
        Ok(())
    }

    async fn bulk(&self, operations: Vec<BulkOperation>) -> Result<(), BackendError> {
        stream::iter(operations)
            .map(|operation| self.apply(operation))
            .buffer_unordered(BULK_CONCURRENCY)
            .try_for_each(|_| async { Ok(()) })
            .await
    }

    async fn close(&self) -> Result<(), BackendError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_key() {
        assert_eq!(escape_key("doc"), "doc");
        assert_eq!(escape_key("_doc"), "u_doc");
        assert_eq!(escape_key("uu_doc"), "uuu_doc");
        assert_eq!(escape_key("uuu"), "uuu");
        assert_eq!(escape_key("u-doc"), "u-doc");
    }

    #[test]
    fn test_address_of() {
        let backend = WebDavBackend::new(&BackendSettings::new("https://dav.example/documents/")).unwrap();
        assert_eq!(backend.address_of("_x"), "https://dav.example/documents/u_x");
    }

    #[test]
    fn test_simple_disables_cache_and_buffer() {
        let backend = WebDavBackend::simple(&BackendSettings::new("https://dav.example/")).unwrap();
        assert_eq!(backend.name(), "simple");
        assert_eq!(backend.defaults(), BackendDefaults::new(0, 0, true));
    }
}
