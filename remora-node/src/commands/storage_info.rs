//! 解析存储提供方下发的存储记录
//!
//! ```json
//! {
//!   "bearerToken": "...",
//!   "storageInfo": {
//!     "api": "couch",
//!     "template": "https://store.example/{category}/",
//!     "auth": "bearer"
//!   }
//! }
//! ```

use anyhow::{Context, Result};
use remora_core::{BackendSettings, ConfigOverrides};
use serde::Deserialize;

use super::Target;

/// 模板中替换 `{category}` 的分类
pub const DEFAULT_CATEGORY: &str = "documents";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StorageRecord {
    bearer_token: Option<String>,
    storage_info: StorageInfo,
}

#[derive(Debug, Deserialize)]
struct StorageInfo {
    api: String,
    template: String,
    auth: Option<String>,
}

pub fn parse(record: &str) -> Result<Target> {
    let record: StorageRecord =
        serde_json::from_str(record).context("storage record is not valid JSON")?;
    let info = record.storage_info;

    let settings = BackendSettings {
        storage_address: Some(info.template.replace("{category}", DEFAULT_CATEGORY)),
        bearer_token: record.bearer_token,
        auth: info.auth,
        ..Default::default()
    };

    Ok(Target {
        kind: info.api,
        settings,
        overrides: ConfigOverrides::default(),
    })
}
