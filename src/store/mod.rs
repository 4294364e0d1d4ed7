use crate::errors::{MoversError, Result};
use crate::models::mover::MoverRecord;
use crate::models::tracking::DayObservation;
use crate::util;
use log::{info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// 以日期为键的涨跌榜存储
pub type MoverStore = KeyedStore<MoverRecord>;

/// 以 `TICKER|EVENT_DATE` 为键的后续交易日存储
pub type TrackerStore = KeyedStore<Vec<DayObservation>>;

/// JSON object file of `key -> T`, written with sorted keys and 2-space
/// indentation.
///
/// Entries that fail to decode are kept aside verbatim and written back
/// unchanged on save, so a single bad record never blocks or destroys the
/// rest. A file that cannot be parsed at all loads as empty and is marked
/// unreadable; saving over it is refused.
#[derive(Debug)]
pub struct KeyedStore<T> {
    path: PathBuf,
    entries: BTreeMap<String, T>,
    malformed: BTreeMap<String, Value>,
    unreadable: bool,
}

impl<T: Serialize + DeserializeOwned> KeyedStore<T> {
    pub fn empty(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            entries: BTreeMap::new(),
            malformed: BTreeMap::new(),
            unreadable: false,
        }
    }

    /// 从文件加载；文件不存在时返回空存储
    pub fn load(path: &Path) -> Self {
        let mut store = Self::empty(path);
        if !path.exists() {
            info!("No existing store at {}, starting empty", path.display());
            return store;
        }

        let root = match fs::read_to_string(path)
            .map_err(MoversError::from)
            .and_then(|text| serde_json::from_str::<Value>(&text).map_err(MoversError::from))
        {
            Ok(Value::Object(map)) => map,
            Ok(other) => {
                warn!(
                    "Store {} is not a JSON object (found {}); treating as unreadable",
                    path.display(),
                    type_name(&other)
                );
                store.unreadable = true;
                return store;
            }
            Err(e) => {
                warn!("Failed to load store {}: {}", path.display(), e);
                store.unreadable = true;
                return store;
            }
        };

        for (key, value) in root {
            match serde_json::from_value::<T>(value.clone()) {
                Ok(entry) => {
                    store.entries.insert(key, entry);
                }
                Err(e) => {
                    warn!("Skipping malformed entry '{}' in {}: {}", key, path.display(), e);
                    store.malformed.insert(key, value);
                }
            }
        }

        info!(
            "Loaded {} entries from {} ({} malformed)",
            store.entries.len(),
            path.display(),
            store.malformed.len()
        );
        store
    }

    /// Atomically writes the whole store, malformed entries included.
    pub fn save(&self) -> Result<()> {
        if self.unreadable {
            return Err(MoversError::DataError(format!(
                "refusing to overwrite unreadable store {}",
                self.path.display()
            )));
        }

        let mut root = Map::new();
        for (key, value) in &self.malformed {
            root.insert(key.clone(), value.clone());
        }
        for (key, entry) in &self.entries {
            root.insert(key.clone(), serde_json::to_value(entry)?);
        }

        // serde_json::Map 默认基于 BTreeMap，嵌套对象的键同样有序
        let text = serde_json::to_string_pretty(&Value::Object(root))?;
        util::write_atomic(&self.path, text.as_bytes())?;
        info!("Saved {} entries to {}", self.len(), self.path.display());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut T> {
        self.entries.get_mut(key)
    }

    /// True if the key exists in any form, decoded or not.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key) || self.malformed.contains_key(key)
    }

    pub fn is_malformed(&self, key: &str) -> bool {
        self.malformed.contains_key(key)
    }

    pub fn is_unreadable(&self) -> bool {
        self.unreadable
    }

    /// Inserts a new entry. Existing keys are left untouched and `false`
    /// is returned.
    pub fn insert_new(&mut self, key: String, entry: T) -> bool {
        if self.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, entry);
        true
    }

    /// Decoded entries in ascending key order.
    pub fn entries(&self) -> impl Iterator<Item = (&String, &T)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len() + self.malformed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn malformed_len(&self) -> usize {
        self.malformed.len()
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn obs(d: u32, open: f64, close: f64) -> DayObservation {
        DayObservation::new(NaiveDate::from_ymd_opt(2026, 3, d).unwrap(), open, close)
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let store = TrackerStore::load(&dir.path().join("none.json"));
        assert!(store.is_empty());
        assert!(!store.is_unreadable());
    }

    #[test]
    fn save_is_sorted_and_byte_stable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");

        let mut store = TrackerStore::empty(&path);
        store.insert_new("ZED|2026-03-02".to_string(), vec![obs(3, 10.0, 11.0)]);
        store.insert_new("ABC|2026-03-02".to_string(), vec![obs(3, 0.0, 1.0)]);
        store.save().unwrap();
        let first = fs::read_to_string(&path).unwrap();

        let reloaded = TrackerStore::load(&path);
        reloaded.save().unwrap();
        let second = fs::read_to_string(&path).unwrap();

        assert_eq!(first, second);
        assert!(first.find("ABC|").unwrap() < first.find("ZED|").unwrap());
        // 嵌套字段按字母序输出，两空格缩进
        assert!(first.contains("\n    {\n      \"close\": 11.0,\n      \"date\": \"2026-03-03\",\n      \"open\": 10.0,\n      \"pct_long\": 10.0\n    }"));
    }

    #[test]
    fn malformed_entries_survive_rewrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(
            &path,
            r#"{"BAD|2026-03-02": "oops", "OK|2026-03-02": [{"date": "2026-03-03", "open": 1.0, "close": 2.0}]}"#,
        )
        .unwrap();

        let mut store = TrackerStore::load(&path);
        assert_eq!(store.malformed_len(), 1);
        assert!(store.is_malformed("BAD|2026-03-02"));
        assert!(store.get("BAD|2026-03-02").is_none());
        assert!(!store.insert_new("BAD|2026-03-02".to_string(), vec![]));
        assert_eq!(store.get("OK|2026-03-02").unwrap().len(), 1);

        store.save().unwrap();
        let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["BAD|2026-03-02"], "oops");
    }

    #[test]
    fn unreadable_file_is_never_overwritten() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("movers.json");
        fs::write(&path, "{ not json").unwrap();

        let mut store = MoverStore::load(&path);
        assert!(store.is_unreadable());
        store.insert_new("2026-03-02".to_string(), MoverRecord::default());
        assert!(store.save().is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "{ not json");
    }
}
