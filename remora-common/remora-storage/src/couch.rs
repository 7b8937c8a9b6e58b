//! # CouchDB backend
//!
//! 每个键对应 CouchDB 中的一个文档 `{_id, _rev, value}`。
//!
//! - 写入前读取当前 `_rev`（乐观锁）
//! - 批量写入：先通过 `_all_docs` 取回所有修订号，再一次性提交 `_bulk_docs`
//! - 值以 JSON 结构存储，默认不做字符串编码

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use tracing::{debug, warn};

use remora_traits::{Backend, BackendDefaults, BackendError, BulkOperation, Payload};

use crate::http::{build_client, ensure_success, is_not_found, transport_error};
use crate::settings::BackendSettings;

#[derive(Debug, Deserialize)]
struct AllDocsResponse {
    rows: Vec<AllDocsRow>,
}

#[derive(Debug, Deserialize)]
struct AllDocsRow {
    key: Option<String>,
    value: Option<RowValue>,
}

#[derive(Debug, Deserialize)]
struct RowValue {
    rev: String,
    #[serde(default)]
    deleted: bool,
}

pub struct CouchBackend {
    client: Client,
    base: Url,
    database: String,
    token: Option<String>,
}

impl CouchBackend {
    pub fn new(settings: &BackendSettings) -> Result<Self, BackendError> {
        let address = settings.require_address()?;
        let mut base = Url::parse(address)
            .map_err(|e| BackendError::unavailable(format!("Invalid storage_address {}: {}", address, e)))?;
        if base.cannot_be_a_base() {
            return Err(BackendError::unavailable(format!(
                "storage_address {} cannot carry a path",
                address
            )));
        }
        // 只保留 scheme/host/port，数据库名由 database 决定
        base.set_path("/");
        base.set_query(None);
        base.set_fragment(None);

        Ok(Self {
            client: build_client()?,
            base,
            database: settings.database_or_default().to_string(),
            token: settings.bearer_token.clone(),
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, BackendError> {
        let mut url = self.base.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| BackendError::unavailable("storage_address cannot carry a path"))?;
            path.pop_if_empty();
            path.push(&self.database);
            for segment in segments {
                path.push(segment);
            }
        }
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.header(reqwest::header::AUTHORIZATION, format!("Basic {}", token)),
            None => request,
        }
    }

    async fn fetch_doc(&self, key: &str) -> Result<Option<Value>, BackendError> {
        let url = self.url(&[key])?;
        let response = self
            .authorize(self.client.get(url))
            .send()
            .await
            .map_err(transport_error)?;
        if is_not_found(&response) {
            return Ok(None);
        }
        let response = ensure_success(response).await?;
        let doc = response.json::<Value>().await.map_err(transport_error)?;
        Ok(Some(doc))
    }

    async fn current_rev(&self, key: &str) -> Result<Option<String>, BackendError> {
        Ok(self
            .fetch_doc(key)
            .await?
            .and_then(|doc| doc.get("_rev").and_then(Value::as_str).map(str::to_string)))
    }

    async fn fetch_revs(&self, keys: Vec<String>) -> Result<HashMap<String, String>, BackendError> {
        let url = self.url(&["_all_docs"])?;
        let response = self
            .authorize(self.client.post(url))
            .json(&json!({ "keys": keys }))
            .send()
            .await
            .map_err(transport_error)?;
        let response = ensure_success(response).await.map_err(|e| {
            warn!("Error in _all_docs request: {}", e);
            e
        })?;
        let all_docs = response
            .json::<AllDocsResponse>()
            .await
            .map_err(|e| BackendError::protocol(format!("Malformed _all_docs response: {}", e)))?;

        // 不存在的键返回 error 而不是 value
        Ok(all_docs
            .rows
            .into_iter()
            .filter_map(|row| match (row.key, row.value) {
                (Some(key), Some(value)) if !value.deleted => Some((key, value.rev)),
                _ => None,
            })
            .collect())
    }
}

fn build_doc(key: &str, rev: Option<&String>) -> Map<String, Value> {
    let mut doc = Map::new();
    doc.insert("_id".to_string(), Value::String(key.to_string()));
    if let Some(rev) = rev {
        doc.insert("_rev".to_string(), Value::String(rev.clone()));
    }
    doc
}

#[async_trait]
impl Backend for CouchBackend {
    fn name(&self) -> &str {
        "couch"
    }

    fn defaults(&self) -> BackendDefaults {
        BackendDefaults::new(100, 500, false)
    }

    async fn init(&self) -> Result<(), BackendError> {
        debug!("Couch backend ready at {} (database {})", self.base, self.database);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Payload>, BackendError> {
        Ok(self
            .fetch_doc(key)
            .await?
            .and_then(|mut doc| doc.get_mut("value").map(Value::take))
            .map(Payload::Json))
    }

    async fn set(&self, key: &str, payload: Payload) -> Result<(), BackendError> {
        let rev = self.current_rev(key).await?;
        let mut doc = build_doc(key, rev.as_ref());
        doc.insert("value".to_string(), payload.into_json());

        let response = self
            .authorize(self.client.put(self.url(&[key])?))
            .json(&doc)
            .send()
            .await
            .map_err(transport_error)?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), BackendError> {
        let Some(rev) = self.current_rev(key).await? else {
            return Ok(());
        };

        let mut url = self.url(&[key])?;
        url.query_pairs_mut().append_pair("rev", &rev);
        let response = self
            .authorize(self.client.delete(url))
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
        let keys = operations.iter().map(|op| op.key().to_string()).collect();
        let revs = self.fetch_revs(keys).await?;

        let docs: Vec<Value> = operations
            .into_iter()
            .map(|operation| match operation {
                BulkOperation::Set { key, payload } => {
                    let mut doc = build_doc(&key, revs.get(&key));
                    doc.insert("value".to_string(), payload.into_json());
                    Value::Object(doc)
                }
                BulkOperation::Remove { key } => {
                    let mut doc = build_doc(&key, revs.get(&key));
                    doc.insert("_deleted".to_string(), Value::Bool(true));
                    Value::Object(doc)
                }
            })
            .collect();

        let response = self
            .authorize(self.client.post(self.url(&["_bulk_docs"])?))
            .json(&json!({ "docs": docs }))
            .send()
            .await
            .map_err(transport_error)?;
        ensure_success(response).await.map_err(|e| {
            warn!("Error in _bulk_docs request: {}", e);
            e
        })?;
        Ok(())
    }

    async fn close(&self) -> Result<(), BackendError> {
        Ok(())
    }
}
