//! 设置的键值存储

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 存储层的值（与区域设置无关）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum StoredValue {
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    StringList(Vec<String>),
    DateTime(DateTime<Utc>),
}

impl StoredValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            StoredValue::Bool(_) => "bool",
            StoredValue::Int(_) => "int",
            StoredValue::Double(_) => "double",
            StoredValue::String(_) => "string",
            StoredValue::StringList(_) => "string list",
            StoredValue::DateTime(_) => "date-time",
        }
    }
}

/// 存储错误
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Format error: {0}")]
    Format(String),

    #[error("Backend error: {0}")]
    Backend(String),

    /// 单个键的值无法解码，存储本身可用
    #[error("Invalid value for '{key}': {reason}")]
    Value { key: String, reason: String },
}

/// 持久化键值存储
///
/// 存储只在单次加载/保存调用期间被借用。
pub trait SettingsStore {
    fn value(&self, key: &str) -> Result<Option<StoredValue>, StoreError>;

    fn set_value(&mut self, key: &str, value: StoredValue) -> Result<(), StoreError>;

    /// 所有键（有序）
    fn keys(&self) -> Result<Vec<String>, StoreError>;

    /// 将缓冲的写入落盘
    fn sync(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// 内存存储
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryStore {
    values: BTreeMap<String, StoredValue>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&StoredValue> {
        self.values.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: StoredValue) {
        self.values.insert(key.into(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<StoredValue> {
        self.values.remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &StoredValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl SettingsStore for MemoryStore {
    fn value(&self, key: &str) -> Result<Option<StoredValue>, StoreError> {
        Ok(self.values.get(key).cloned())
    }

    fn set_value(&mut self, key: &str, value: StoredValue) -> Result<(), StoreError> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.values.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stored_value_json_shape() {
        let json = serde_json::to_string(&StoredValue::Double(2.5)).unwrap();
        assert_eq!(json, r#"{"type":"double","value":2.5}"#);

        let list: StoredValue =
            serde_json::from_str(r#"{"type":"string_list","value":["a","b"]}"#).unwrap();
        assert_eq!(list, StoredValue::StringList(vec!["a".into(), "b".into()]));
    }

    #[test]
    fn test_memory_store() {
        let mut store = MemoryStore::new();
        store.set_value("a/b", StoredValue::Int(3)).unwrap();
        store.set_value("a/a", StoredValue::Bool(true)).unwrap();

        assert_eq!(store.value("a/b").unwrap(), Some(StoredValue::Int(3)));
        assert_eq!(store.value("missing").unwrap(), None);
        assert_eq!(store.keys().unwrap(), vec!["a/a".to_string(), "a/b".to_string()]);
    }
}
