//! A persisted, ordered sequence of JSON-encodable values.
//!
//! Every mutation is synchronously recorded to the backing [`Log`] before
//! the call returns. Reconstructing a [`PersistedList`] from the same file
//! reproduces the exact same sequence of elements.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;

use serde::Serialize;
use serde_json::Value;

use crate::config::LogOptions;
use crate::error::{Error, Result};
use crate::log::{HandlerTable, Log};
use crate::value;

const APPEND: &str = "append";
const SET: &str = "set";
const DELETE: &str = "delete";
const REMOVE: &str = "remove";
const PUSH: &str = "push";
const POP: &str = "pop";

/// An ordered sequence of JSON-encodable values, durably backed by an
/// append-only log on disk.
pub struct PersistedList {
    log: Log,
    inner: RefCell<Vec<Value>>,
}

impl PersistedList {
    /// Opens the list backed by `path`, creating it if necessary and
    /// replaying any existing history.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_options(path, LogOptions::default())
    }

    /// Same as [`PersistedList::open`] but with an explicit starting
    /// compaction threshold.
    pub fn open_with_options(path: impl AsRef<Path>, options: LogOptions) -> Result<Self> {
        let log = Log::open_with_options(path, options)?;
        let list = Self {
            log,
            inner: RefCell::new(Vec::new()),
        };
        list.replay_from_log()?;
        // Compact during construction; we'd rather pay that cost now than
        // on whatever append happens to cross the threshold later.
        list.log.compact(|| list.snapshot())?;
        Ok(list)
    }

    fn replay_from_log(&self) -> Result<()> {
        let mut handlers: HandlerTable<'_> = HashMap::new();

        handlers.insert(
            APPEND.to_string(),
            Box::new(|params: &[Value]| {
                let value = first_param(params, APPEND)?;
                self.inner.borrow_mut().push(value);
                Ok(())
            }),
        );
        handlers.insert(
            SET.to_string(),
            Box::new(|params: &[Value]| {
                let index = index_param(params, SET)?;
                let value = nth_param(params, 1, SET)?;
                let mut inner = self.inner.borrow_mut();
                let len = inner.len();
                let slot = inner
                    .get_mut(index)
                    .ok_or(Error::OutOfBounds { index, len })?;
                *slot = value;
                Ok(())
            }),
        );
        handlers.insert(
            DELETE.to_string(),
            Box::new(|params: &[Value]| {
                let index = index_param(params, DELETE)?;
                let mut inner = self.inner.borrow_mut();
                let len = inner.len();
                if index >= len {
                    return Err(Error::OutOfBounds { index, len });
                }
                inner.remove(index);
                Ok(())
            }),
        );
        handlers.insert(
            REMOVE.to_string(),
            Box::new(|params: &[Value]| {
                let value = first_param(params, REMOVE)?;
                let mut inner = self.inner.borrow_mut();
                let pos = inner.iter().position(|v| v == &value).ok_or(Error::NotFound)?;
                inner.remove(pos);
                Ok(())
            }),
        );
        handlers.insert(
            PUSH.to_string(),
            Box::new(|params: &[Value]| {
                let value = first_param(params, PUSH)?;
                self.inner.borrow_mut().insert(0, value);
                Ok(())
            }),
        );
        handlers.insert(
            POP.to_string(),
            Box::new(|_params: &[Value]| {
                self.inner.borrow_mut().pop().ok_or(Error::Empty)?;
                Ok(())
            }),
        );

        self.log.replay(&handlers)
    }

    fn snapshot(&self) -> Vec<(String, Vec<Value>)> {
        self.inner
            .borrow()
            .iter()
            .cloned()
            .map(|v| (APPEND.to_string(), vec![v]))
            .collect()
    }

    /// The number of elements currently in the list.
    pub fn len(&self) -> usize {
        self.inner.borrow().len()
    }

    /// Whether the list currently has no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The backing log's current compaction threshold, in bytes.
    pub fn compaction_threshold(&self) -> u64 {
        self.log.compaction_threshold()
    }

    /// Returns the element at `index`.
    pub fn get(&self, index: usize) -> Result<Value> {
        let inner = self.inner.borrow();
        inner
            .get(index)
            .cloned()
            .ok_or(Error::OutOfBounds { index, len: inner.len() })
    }

    /// Appends `value` to the end of the list.
    pub fn append(&self, value: impl Serialize) -> Result<()> {
        let encoded = value::encode_one(&value)?;
        self.inner.borrow_mut().push(encoded.clone());
        self.log.append(APPEND, vec![encoded], || self.snapshot())
    }

    /// Replaces the element at `index` with `value`.
    pub fn set(&self, index: usize, value: impl Serialize) -> Result<()> {
        let encoded = value::encode_one(&value)?;
        {
            let mut inner = self.inner.borrow_mut();
            let len = inner.len();
            let slot = inner
                .get_mut(index)
                .ok_or(Error::OutOfBounds { index, len })?;
            *slot = encoded.clone();
        }
        self.log
            .append(SET, vec![Value::from(index as u64), encoded], || self.snapshot())
    }

    /// Removes and returns the element at `index`.
    pub fn delete_at(&self, index: usize) -> Result<Value> {
        let removed = {
            let mut inner = self.inner.borrow_mut();
            let len = inner.len();
            if index >= len {
                return Err(Error::OutOfBounds { index, len });
            }
            inner.remove(index)
        };
        self.log
            .append(DELETE, vec![Value::from(index as u64)], || self.snapshot())?;
        Ok(removed)
    }

    /// Removes the first element equal to `value`.
    pub fn remove(&self, value: &Value) -> Result<()> {
        {
            let mut inner = self.inner.borrow_mut();
            let pos = inner.iter().position(|v| v == value).ok_or(Error::NotFound)?;
            inner.remove(pos);
        }
        self.log.append(REMOVE, vec![value.clone()], || self.snapshot())
    }

    /// Inserts `value` at position 0.
    pub fn push_front(&self, value: impl Serialize) -> Result<()> {
        let encoded = value::encode_one(&value)?;
        self.inner.borrow_mut().insert(0, encoded.clone());
        self.log.append(PUSH, vec![encoded], || self.snapshot())
    }

    /// Removes and returns the last element.
    pub fn pop_back(&self) -> Result<Value> {
        let value = {
            let mut inner = self.inner.borrow_mut();
            inner.pop().ok_or(Error::Empty)?
        };
        self.log.append(POP, vec![], || self.snapshot())?;
        Ok(value)
    }

    /// The position of the first element equal to `value`.
    pub fn index_of(&self, value: &Value) -> Result<usize> {
        self.inner
            .borrow()
            .iter()
            .position(|v| v == value)
            .ok_or(Error::NotFound)
    }

    /// Whether `value` is present anywhere in the list.
    pub fn contains(&self, value: &Value) -> bool {
        self.inner.borrow().iter().any(|v| v == value)
    }

    /// An in-order copy of the list's current elements.
    pub fn iterate(&self) -> Vec<Value> {
        self.inner.borrow().clone()
    }

    /// A reverse-order copy of the list's current elements.
    pub fn reverse_iterate(&self) -> Vec<Value> {
        let mut values = self.iterate();
        values.reverse();
        values
    }
}

fn first_param(params: &[Value], op: &str) -> Result<Value> {
    nth_param(params, 0, op)
}

fn nth_param(params: &[Value], n: usize, op: &str) -> Result<Value> {
    params
        .get(n)
        .cloned()
        .ok_or_else(|| Error::MalformedLog(format!("'{op}' missing parameter {n}")))
}

fn index_param(params: &[Value], op: &str) -> Result<usize> {
    first_param(params, op)?
        .as_u64()
        .map(|i| i as usize)
        .ok_or_else(|| Error::MalformedLog(format!("'{op}' parameter 0 is not an index")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_list_appends_and_deletes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("list.log");

        let list = PersistedList::open(&path).unwrap();
        assert_eq!(list.len(), 0);

        list.append(1).unwrap();
        list.append(2).unwrap();
        list.append("to be deleted").unwrap();
        list.append("boo").unwrap();
        list.delete_at(2).unwrap();

        drop(list);
        let list = PersistedList::open(&path).unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(list.get(0).unwrap(), Value::from(1));
        assert_eq!(list.get(1).unwrap(), Value::from(2));
        assert_eq!(list.get(2).unwrap(), Value::from("boo"));
    }

    #[test]
    fn corrupted_middle_line_fails_construction() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("list.log");

        {
            let list = PersistedList::open(&path).unwrap();
            list.append(1).unwrap();
            list.append(2).unwrap();
        }

        let mut contents = std::fs::read_to_string(&path).unwrap();
        let first_newline = contents.find('\n').unwrap();
        contents.insert_str(first_newline + 1, "ooga booga I'm corrupted data\n");
        std::fs::write(&path, contents).unwrap();

        let err = PersistedList::open(&path).unwrap_err();
        assert!(matches!(err, Error::MalformedLog(_)));
    }

    #[test]
    fn empty_list_errors() {
        let dir = tempfile::tempdir().unwrap();
        let list = PersistedList::open(dir.path().join("empty.log")).unwrap();

        assert!(matches!(list.pop_back(), Err(Error::Empty)));
        assert!(matches!(list.get(0), Err(Error::OutOfBounds { index: 0, len: 0 })));
    }

    #[test]
    fn non_encodable_value_leaves_state_and_file_untouched() {
        struct NotSerializable;
        impl Serialize for NotSerializable {
            fn serialize<S>(&self, _serializer: S) -> std::result::Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                Err(serde::ser::Error::custom("not encodable"))
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("list.log");
        let list = PersistedList::open(&path).unwrap();
        list.append(1).unwrap();

        let before_len = list.len();
        let before_bytes = std::fs::read(&path).unwrap();

        assert!(list.append(NotSerializable).is_err());
        assert_eq!(list.len(), before_len);
        assert_eq!(std::fs::read(&path).unwrap(), before_bytes);
    }

    #[test]
    fn replay_does_not_duplicate_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("list.log");

        {
            let list = PersistedList::open(&path).unwrap();
            list.append(1).unwrap();
            list.append(2).unwrap();
            list.append(3).unwrap();
        }

        let line_count_before = std::fs::read_to_string(&path).unwrap().lines().count();
        let _list = PersistedList::open(&path).unwrap();
        let line_count_after = std::fs::read_to_string(&path).unwrap().lines().count();

        assert_eq!(line_count_before, line_count_after);
    }
}
