//! 基于文件的设置存储
//!
//! - [`JsonFileStore`]：单个JSON文件，写入先缓冲，`sync` 时整体落盘
//! - [`SqliteStore`]：SQLite 键值表，值列保存JSON
//!
//! 单个键的值无法解码时返回 [`StoreError::Value`]，其余键不受影响。

use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use zview_core::settings::{SettingsStore, StoreError, StoredValue};

/// JSON文件存储
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: BTreeMap<String, JsonValue>,
    dirty: bool,
}

impl JsonFileStore {
    /// 打开存储，文件不存在时为空
    ///
    /// 文件必须是JSON对象，各个值在读取时才解码。
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let values = if path.exists() {
            let text = std::fs::read_to_string(&path)?;
            if text.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&text).map_err(|e| {
                    StoreError::Format(format!("{}: {}", path.display(), e))
                })?
            }
        } else {
            BTreeMap::new()
        };
        tracing::debug!("Opened settings file {} ({} keys)", path.display(), values.len());

        Ok(Self {
            path,
            values,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl SettingsStore for JsonFileStore {
    fn value(&self, key: &str) -> Result<Option<StoredValue>, StoreError> {
        self.values
            .get(key)
            .map(|json| serde_json::from_value(json.clone()).map_err(|e| invalid_value(key, e)))
            .transpose()
    }

    fn set_value(&mut self, key: &str, value: StoredValue) -> Result<(), StoreError> {
        let value = to_json(key, &value)?;
        if self.values.get(key) != Some(&value) {
            self.values.insert(key.to_string(), value);
            self.dirty = true;
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.values.keys().cloned().collect())
    }

    /// 先写临时文件再替换，失败时原文件不变
    fn sync(&mut self) -> Result<(), StoreError> {
        if !self.dirty && self.path.exists() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(&self.values)
            .map_err(|e| StoreError::Format(e.to_string()))?;

        let temp = self.path.with_extension("json.tmp");
        std::fs::write(&temp, text)?;
        std::fs::rename(&temp, &self.path)?;
        self.dirty = false;

        tracing::debug!("Wrote {} settings to {}", self.values.len(), self.path.display());
        Ok(())
    }
}

/// JSON 无法表示非有限浮点数，写入时直接拒绝
fn to_json(key: &str, value: &StoredValue) -> Result<JsonValue, StoreError> {
    if let StoredValue::Double(v) = value {
        if !v.is_finite() {
            return Err(StoreError::Value {
                key: key.to_string(),
                reason: format!("{} cannot be written as JSON", v),
            });
        }
    }
    serde_json::to_value(value).map_err(|e| StoreError::Format(e.to_string()))
}

fn invalid_value(key: &str, err: serde_json::Error) -> StoreError {
    StoreError::Value {
        key: key.to_string(),
        reason: err.to_string(),
    }
}

fn backend(err: rusqlite::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

/// SQLite存储
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref()).map_err(backend)?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(backend)?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )
        .map_err(backend)?;
        Ok(Self { conn })
    }
}

impl SettingsStore for SqliteStore {
    fn value(&self, key: &str) -> Result<Option<StoredValue>, StoreError> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(backend)?;

        json.map(|text| serde_json::from_str(&text).map_err(|e| invalid_value(key, e)))
            .transpose()
    }

    fn set_value(&mut self, key: &str, value: StoredValue) -> Result<(), StoreError> {
        let json = to_json(key, &value)?.to_string();
        self.conn
            .execute(
                "INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)",
                params![key, json],
            )
            .map_err(backend)?;
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT key FROM settings ORDER BY key")
            .map_err(backend)?;
        let keys = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(backend)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(backend)?;
        Ok(keys)
    }
}
