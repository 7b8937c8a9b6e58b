//! # Value Paths
//!
//! 文档内部的属性路径，例如 `["test", "bla"]` 指向 `doc.test.bla`。
//!
//! - `lookup`: 沿路径读取，任何缺失的中间节点返回 `None`
//! - `assign`: 沿路径写入，缺失的中间节点按段类型创建空容器
//!   (`Key` → 对象，`Index` → 数组)

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{RemoraError, Result};

/// 数组按下标写入时允许补齐的最大 `null` 数量
pub const MAX_ARRAY_PADDING: usize = 65_536;

/// 路径中的一段
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Index(usize),
    Key(String),
}

impl PathSegment {
    fn empty_container(&self) -> Value {
        match self {
            PathSegment::Key(_) => Value::Object(Map::new()),
            PathSegment::Index(_) => Value::Array(Vec::new()),
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) => write!(f, "{}", key),
            PathSegment::Index(index) => write!(f, "{}", index),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        PathSegment::Key(key.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        PathSegment::Key(key)
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

/// 属性路径，空路径表示整个文档
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValuePath(Vec<PathSegment>);

impl ValuePath {
    pub fn new(segments: Vec<PathSegment>) -> Self {
        Self(segments)
    }

    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.0.push(PathSegment::Key(key.into()));
        self
    }

    pub fn index(mut self, index: usize) -> Self {
        self.0.push(PathSegment::Index(index));
        self
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// 沿路径读取，缺失节点返回 `None`
    pub fn lookup<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        self.0.iter().try_fold(root, |node, segment| child(node, segment))
    }

    /// 沿路径写入 `value`
    ///
    /// `Null` 根节点会先变成空对象；穿过标量节点返回 `InvalidPath`。
    /// 空路径直接替换整个文档。
    pub fn assign(&self, root: &mut Value, value: Value) -> Result<()> {
        let Some((last, parents)) = self.0.split_last() else {
            *root = value;
            return Ok(());
        };

        if root.is_null() {
            *root = Value::Object(Map::new());
        }

        let mut node = root;
        for (depth, segment) in parents.iter().enumerate() {
            let next = &self.0[depth + 1];
            let entry = slot(node, segment).map_err(|e| self.describe(depth, e))?;
            if entry.is_null() {
                *entry = next.empty_container();
            }
            node = entry;
        }

        let target = slot(node, last).map_err(|e| self.describe(parents.len(), e))?;
        *target = value;
        Ok(())
    }

    fn describe(&self, depth: usize, reason: String) -> RemoraError {
        RemoraError::invalid_path(format!("{} at segment {} of {}", reason, depth, self))
    }
}

impl fmt::Display for ValuePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "[{}]", parts.join("."))
    }
}

impl From<Vec<PathSegment>> for ValuePath {
    fn from(segments: Vec<PathSegment>) -> Self {
        Self(segments)
    }
}

/// 解析 `a.b.0` 形式的路径，纯数字段作为数组下标
impl FromStr for ValuePath {
    type Err = RemoraError;

    fn from_str(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Ok(Self::root());
        }
        let segments = s
            .split('.')
            .map(|part| {
                if part.is_empty() {
                    return Err(RemoraError::invalid_path(format!("empty segment in '{}'", s)));
                }
                Ok(match part.parse::<usize>() {
                    Ok(index) => PathSegment::Index(index),
                    Err(_) => PathSegment::Key(part.to_string()),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self(segments))
    }
}

fn child<'a>(node: &'a Value, segment: &PathSegment) -> Option<&'a Value> {
    match (node, segment) {
        (Value::Object(map), PathSegment::Key(key)) => map.get(key),
        (Value::Object(map), PathSegment::Index(index)) => map.get(&index.to_string()),
        (Value::Array(items), PathSegment::Index(index)) => items.get(*index),
        (Value::Array(items), PathSegment::Key(key)) => {
            key.parse::<usize>().ok().and_then(|index| items.get(index))
        }
        _ => None,
    }
}

/// 返回 `segment` 对应的可写位置，必要时插入 `Null` 占位
fn slot<'a>(node: &'a mut Value, segment: &PathSegment) -> std::result::Result<&'a mut Value, String> {
    match node {
        Value::Object(map) => {
            let key = segment.to_string();
            Ok(map.entry(key).or_insert(Value::Null))
        }
        Value::Array(items) => {
            let index = match segment {
                PathSegment::Index(index) => *index,
                PathSegment::Key(key) => key
                    .parse::<usize>()
                    .map_err(|_| format!("key '{}' on an array", key))?,
            };
            if index >= items.len() {
                if index - items.len() > MAX_ARRAY_PADDING {
                    return Err(format!("index {} is too far past the end of the array", index));
                }
                items.resize(index + 1, Value::Null);
            }
            Ok(&mut items[index])
        }
        other => Err(format!("cannot descend into {}", type_name(other))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lookup_nested() {
        let doc = json!({"test": {"bla": [1, {"x": true}]}});
        let path = ValuePath::root().key("test").key("bla").index(1).key("x");
        assert_eq!(path.lookup(&doc), Some(&json!(true)));
    }

    #[test]
    fn test_lookup_missing_is_none() {
        let doc = json!({"a": 1});
        assert_eq!(ValuePath::root().key("b").key("c").lookup(&doc), None);
        assert_eq!(ValuePath::root().key("a").key("c").lookup(&doc), None);
        assert_eq!(ValuePath::root().key("a").lookup(&Value::Null), None);
    }

    #[test]
    fn test_lookup_empty_path_returns_root() {
        let doc = json!({"a": 1});
        assert_eq!(ValuePath::root().lookup(&doc), Some(&doc));
    }

    #[test]
    fn test_lookup_array_with_numeric_key() {
        let doc = json!({"list": ["a", "b"]});
        let path = ValuePath::new(vec!["list".into(), "1".into()]);
        assert_eq!(path.lookup(&doc), Some(&json!("b")));
    }

    #[test]
    fn test_assign_creates_intermediates() {
        let mut doc = Value::Null;
        ValuePath::root()
            .key("a")
            .key("b")
            .assign(&mut doc, json!(5))
            .unwrap();
        assert_eq!(doc, json!({"a": {"b": 5}}));
    }

    #[test]
    fn test_assign_creates_array_for_index_segment() {
        let mut doc = json!({});
        ValuePath::root()
            .key("list")
            .index(2)
            .assign(&mut doc, json!("x"))
            .unwrap();
        assert_eq!(doc, json!({"list": [null, null, "x"]}));
    }

    #[test]
    fn test_assign_replaces_null_intermediate() {
        let mut doc = json!({"a": null});
        ValuePath::root().key("a").key("b").assign(&mut doc, json!(1)).unwrap();
        assert_eq!(doc, json!({"a": {"b": 1}}));
    }

    #[test]
    fn test_assign_keeps_siblings() {
        let mut doc = json!({"a": {"keep": 1}, "other": 2});
        ValuePath::root().key("a").key("new").assign(&mut doc, json!(3)).unwrap();
        assert_eq!(doc, json!({"a": {"keep": 1, "new": 3}, "other": 2}));
    }

    #[test]
    fn test_assign_through_scalar_fails() {
        let mut doc = json!({"a": 1});
        let err = ValuePath::root()
            .key("a")
            .key("b")
            .assign(&mut doc, json!(2))
            .unwrap_err();
        assert!(matches!(err, RemoraError::InvalidPath(_)));
        assert_eq!(doc, json!({"a": 1}));
    }

    #[test]
    fn test_assign_on_scalar_root_fails() {
        let mut doc = json!("text");
        assert!(ValuePath::root().key("a").assign(&mut doc, json!(1)).is_err());
    }

    #[test]
    fn test_assign_empty_path_replaces_document() {
        let mut doc = json!({"a": 1});
        ValuePath::root().assign(&mut doc, json!([1, 2])).unwrap();
        assert_eq!(doc, json!([1, 2]));
    }

    #[test]
    fn test_assign_rejects_huge_padding() {
        let mut doc = json!({"list": []});
        let result = ValuePath::root()
            .key("list")
            .index(MAX_ARRAY_PADDING * 2)
            .assign(&mut doc, json!(1));
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_dotted_path() {
        let path: ValuePath = "a.b.0".parse().unwrap();
        assert_eq!(path, ValuePath::root().key("a").key("b").index(0));
        assert!("".parse::<ValuePath>().unwrap().is_empty());
        assert!("a..b".parse::<ValuePath>().is_err());
        assert_eq!(path.to_string(), "[a.b.0]");
    }

    #[test]
    fn test_deserialize_mixed_segments() {
        let path: ValuePath = serde_json::from_value(json!(["a", 3, "b"])).unwrap();
        assert_eq!(path, ValuePath::root().key("a").index(3).key("b"));
    }
}
