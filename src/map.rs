//! A persisted, keyed mapping from JSON-encodable keys to JSON-encodable
//! values.
//!
//! Iteration order is not part of the contract, but whatever order this
//! implementation exposes is stable between mutations: entries keep their
//! insertion position (via `indexmap`) until removed.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::config::LogOptions;
use crate::error::{Error, Result};
use crate::log::{HandlerTable, Log};
use crate::value;

const SET: &str = "set";
const DELETE: &str = "delete";

/// A keyed mapping, durably backed by an append-only log on disk.
///
/// Keys are any JSON-encodable value, compared structurally. Internally,
/// entries are indexed by the key's canonical JSON spelling (see
/// [`value::canonical_key`]) so that e.g. the integer key `1` and the
/// string key `"1"` are never conflated.
pub struct PersistedMap {
    log: Log,
    inner: RefCell<IndexMap<String, (Value, Value)>>,
}

impl PersistedMap {
    /// Opens the map backed by `path`, creating it if necessary and
    /// replaying any existing history.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_options(path, LogOptions::default())
    }

    /// Same as [`PersistedMap::open`] but with an explicit starting
    /// compaction threshold.
    pub fn open_with_options(path: impl AsRef<Path>, options: LogOptions) -> Result<Self> {
        let log = Log::open_with_options(path, options)?;
        let map = Self {
            log,
            inner: RefCell::new(IndexMap::new()),
        };
        map.replay_from_log()?;
        map.log.compact(|| map.snapshot())?;
        Ok(map)
    }

    fn replay_from_log(&self) -> Result<()> {
        let mut handlers: HandlerTable<'_> = HashMap::new();

        handlers.insert(
            SET.to_string(),
            Box::new(|params: &[Value]| {
                let key = nth_param(params, 0, SET)?;
                let val = nth_param(params, 1, SET)?;
                let canon = value::canonical_key(&key);
                self.inner.borrow_mut().insert(canon, (key, val));
                Ok(())
            }),
        );
        handlers.insert(
            DELETE.to_string(),
            Box::new(|params: &[Value]| {
                let key = nth_param(params, 0, DELETE)?;
                let canon = value::canonical_key(&key);
                self.inner.borrow_mut().shift_remove(&canon);
                Ok(())
            }),
        );

        self.log.replay(&handlers)
    }

    fn snapshot(&self) -> Vec<(String, Vec<Value>)> {
        self.inner
            .borrow()
            .values()
            .map(|(k, v)| (SET.to_string(), vec![k.clone(), v.clone()]))
            .collect()
    }

    /// The number of key-value pairs currently in the map.
    pub fn len(&self) -> usize {
        self.inner.borrow().len()
    }

    /// Whether the map currently has no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The backing log's current compaction threshold, in bytes.
    pub fn compaction_threshold(&self) -> u64 {
        self.log.compaction_threshold()
    }

    /// Returns the value associated with `key`.
    pub fn get(&self, key: impl Serialize) -> Result<Value> {
        let key_v = value::encode_one(&key)?;
        let canon = value::canonical_key(&key_v);
        self.inner
            .borrow()
            .get(&canon)
            .map(|(_, v)| v.clone())
            .ok_or(Error::NotFound)
    }

    /// Associates `value` with `key`, overwriting any existing entry.
    pub fn set(&self, key: impl Serialize, value: impl Serialize) -> Result<()> {
        let key_v = value::encode_one(&key)?;
        let val_v = value::encode_one(&value)?;
        let canon = value::canonical_key(&key_v);
        self.inner
            .borrow_mut()
            .insert(canon, (key_v.clone(), val_v.clone()));
        self.log.append(SET, vec![key_v, val_v], || self.snapshot())
    }

    /// Removes `key` and returns its prior value.
    pub fn delete(&self, key: impl Serialize) -> Result<Value> {
        let key_v = value::encode_one(&key)?;
        let canon = value::canonical_key(&key_v);
        let removed = {
            let mut inner = self.inner.borrow_mut();
            inner.shift_remove(&canon).ok_or(Error::NotFound)?
        };
        self.log.append(DELETE, vec![key_v], || self.snapshot())?;
        Ok(removed.1)
    }

    /// Whether `key` is present in the map.
    pub fn contains(&self, key: impl Serialize) -> bool {
        match value::encode_one(&key) {
            Ok(key_v) => self
                .inner
                .borrow()
                .contains_key(&value::canonical_key(&key_v)),
            Err(_) => false,
        }
    }

    /// The map's keys, in its current (stable, insertion-order) iteration
    /// order.
    pub fn iterate_keys(&self) -> Vec<Value> {
        self.inner.borrow().values().map(|(k, _)| k.clone()).collect()
    }

    /// The map's values, in the same order as [`PersistedMap::iterate_keys`].
    pub fn iterate_values(&self) -> Vec<Value> {
        self.inner.borrow().values().map(|(_, v)| v.clone()).collect()
    }

    /// The map's `(key, value)` pairs, in the same stable order.
    pub fn iterate_items(&self) -> Vec<(Value, Value)> {
        self.inner.borrow().values().cloned().collect()
    }
}

impl PartialEq for PersistedMap {
    fn eq(&self, other: &Self) -> bool {
        let a = self.inner.borrow();
        let b = other.inner.borrow();
        a.len() == b.len() && a.iter().all(|(k, v)| b.get(k) == Some(v))
    }
}

fn nth_param(params: &[Value], n: usize, op: &str) -> Result<Value> {
    params
        .get(n)
        .cloned()
        .ok_or_else(|| Error::MalformedLog(format!("'{op}' missing parameter {n}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_map_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.log");

        let map = PersistedMap::open(&path).unwrap();
        map.set(1, 1).unwrap();
        map.set(2, "two").unwrap();
        map.set("three", 3).unwrap();
        map.set("list", vec![1, 2, 3]).unwrap();
        map.set("to be deleted", 5).unwrap();
        map.delete("to be deleted").unwrap();

        drop(map);
        let map = PersistedMap::open(&path).unwrap();
        assert_eq!(map.len(), 4);
        assert_eq!(map.get(1).unwrap(), Value::from(1));
        assert_eq!(map.get(2).unwrap(), Value::from("two"));
        assert_eq!(map.get("three").unwrap(), Value::from(3));
        assert_eq!(map.get("list").unwrap(), serde_json::json!([1, 2, 3]));
        assert!(!map.contains("to be deleted"));
    }

    #[test]
    fn integer_key_does_not_collide_with_its_string_spelling() {
        let dir = tempfile::tempdir().unwrap();
        let map = PersistedMap::open(dir.path().join("keys.log")).unwrap();

        map.set(1, "number").unwrap();
        map.set("1", "string").unwrap();

        assert_eq!(map.len(), 2);
        assert_eq!(map.get(1).unwrap(), Value::from("number"));
        assert_eq!(map.get("1").unwrap(), Value::from("string"));
    }

    #[test]
    fn delete_missing_key_errors() {
        let dir = tempfile::tempdir().unwrap();
        let map = PersistedMap::open(dir.path().join("missing.log")).unwrap();
        assert!(matches!(map.delete("nope"), Err(Error::NotFound)));
        assert!(matches!(map.get("nope"), Err(Error::NotFound)));
    }
}
