use serde_json::Value;

/// Value crossing the backend boundary.
///
/// `Text` carries a document the cache layer already JSON-encoded; `Json`
/// carries the document itself for stores that keep structured values.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Text(String),
    Json(Value),
}

impl Payload {
    /// Body suitable for a byte-oriented store.
    pub fn into_text(self) -> String {
        match self {
            Payload::Text(text) => text,
            Payload::Json(value) => value.to_string(),
        }
    }

    /// Value suitable for a document-oriented store.
    pub fn into_json(self) -> Value {
        match self {
            Payload::Text(text) => Value::String(text),
            Payload::Json(value) => value,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Payload::Text(text) => text.len(),
            Payload::Json(value) => value.to_string().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One entry of a bulk write.
#[derive(Debug, Clone, PartialEq)]
pub enum BulkOperation {
    Set { key: String, payload: Payload },
    Remove { key: String },
}

impl BulkOperation {
    pub fn key(&self) -> &str {
        match self {
            BulkOperation::Set { key, .. } => key,
            BulkOperation::Remove { key } => key,
        }
    }

    pub fn is_remove(&self) -> bool {
        matches!(self, BulkOperation::Remove { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_payload_into_json_keeps_string() {
        let payload = Payload::Text("{\"a\":1}".to_string());
        assert_eq!(payload.into_json(), Value::String("{\"a\":1}".to_string()));
    }

    #[test]
    fn test_json_payload_into_text_serializes() {
        let payload = Payload::Json(json!({"a": 1}));
        assert_eq!(payload.into_text(), "{\"a\":1}");
    }

    #[test]
    fn test_bulk_operation_key() {
        let set = BulkOperation::Set {
            key: "k1".to_string(),
            payload: Payload::Text("1".to_string()),
        };
        let remove = BulkOperation::Remove { key: "k2".to_string() };
        assert_eq!(set.key(), "k1");
        assert!(!set.is_remove());
        assert_eq!(remove.key(), "k2");
        assert!(remove.is_remove());
    }
}
