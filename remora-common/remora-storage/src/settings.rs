use serde::{Deserialize, Serialize};

use remora_traits::BackendError;

/// Default CouchDB database holding the documents.
pub const DEFAULT_COUCH_DATABASE: &str = "documents";

/// Connection settings handed to an adapter at construction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    /// Base address of the remote store
    pub storage_address: Option<String>,
    /// Token sent in the Authorization header
    pub bearer_token: Option<String>,
    /// Authorization scheme hint reported by the storage provider
    pub auth: Option<String>,
    /// CouchDB database name
    pub database: Option<String>,
    /// Test stub only: fail `init`
    pub invalid: bool,
}

impl BackendSettings {
    pub fn new(storage_address: impl Into<String>) -> Self {
        Self {
            storage_address: Some(storage_address.into()),
            ..Default::default()
        }
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn with_invalid(mut self, invalid: bool) -> Self {
        self.invalid = invalid;
        self
    }

    pub fn require_address(&self) -> Result<&str, BackendError> {
        match self.storage_address.as_deref() {
            Some(address) if !address.trim().is_empty() => Ok(address),
            _ => Err(BackendError::unavailable("storage_address is not set")),
        }
    }

    pub fn database_or_default(&self) -> &str {
        self.database.as_deref().unwrap_or(DEFAULT_COUCH_DATABASE)
    }
}
