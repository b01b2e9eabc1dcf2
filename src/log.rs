//! The append-only operation log that backs every container in this
//! crate.
//!
//! A [`Log`] owns a path to a backing file. It knows nothing about list or
//! map semantics: it only appends `(op_name, parameters)` records,
//! replays them into a caller-supplied handler table, and compacts the
//! file when it grows past a moving threshold. Everything about what the
//! operations *mean* lives in the container adapters built on top.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::LogOptions;
use crate::error::{Error, Result};

#[derive(Serialize, Deserialize, Debug)]
struct Record {
    key: String,
    parameters: Vec<Value>,
}

/// A handler invoked during replay with the decoded parameter array for
/// one operation record.
pub type Handler<'a> = Box<dyn Fn(&[Value]) -> Result<()> + 'a>;

/// Maps operation names to the handler that knows how to apply them.
/// Built fresh by an adapter each time it replays; never persisted.
pub type HandlerTable<'a> = HashMap<String, Handler<'a>>;

/// An append-only, line-delimited, JSON-encoded operation log.
pub struct Log {
    path: PathBuf,
    compaction_threshold: Mutex<u64>,
}

impl Log {
    /// Opens (creating if absent) and validates the log at `path`, using
    /// the default 1 MiB compaction threshold.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_options(path, LogOptions::default())
    }

    /// Same as [`Log::open`] but with an explicit starting compaction
    /// threshold.
    pub fn open_with_options(path: impl AsRef<Path>, options: LogOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        // Create the file if it doesn't exist yet.
        fs_err::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;

        // Validate every line up front so we fail fast rather than partway
        // through a later replay.
        let file = fs_err::File::open(&path)?;
        let reader = BufReader::new(file);
        for (line_no, line) in reader.lines().enumerate() {
            let line = line.map_err(Error::Io)?;
            serde_json::from_str::<Record>(&line).map_err(|e| {
                Error::MalformedLog(format!("{}:{}: {e}", path.display(), line_no + 1))
            })?;
        }

        log::debug!("opened log at {}", path.display());

        Ok(Self {
            path,
            compaction_threshold: Mutex::new(options.initial_threshold),
        })
    }

    /// The path to the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The current compaction threshold, in bytes.
    pub fn compaction_threshold(&self) -> u64 {
        *self.compaction_threshold.lock()
    }

    /// Overrides the compaction threshold. Only ever grows automatically
    /// afterward; this is the one point at which a caller can shrink it.
    pub fn set_compaction_threshold(&self, threshold: u64) {
        *self.compaction_threshold.lock() = threshold;
    }

    /// Appends one operation record, then runs the size-triggered
    /// compaction check. `snapshot` is only invoked if compaction turns
    /// out to be necessary.
    pub fn append<F>(&self, op_name: &str, parameters: Vec<Value>, snapshot: F) -> Result<()>
    where
        F: FnOnce() -> Vec<(String, Vec<Value>)>,
    {
        self.append_record(op_name, parameters)?;
        self.compact_if_necessary(snapshot)
    }

    fn append_record(&self, op_name: &str, parameters: Vec<Value>) -> Result<()> {
        let record = Record {
            key: op_name.to_string(),
            parameters,
        };
        let line = serde_json::to_string(&record)?;

        let mut file = fs_err::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    /// Replays every record in the backing file, in order, dispatching
    /// each to the handler named by its `key`. Never writes to the file.
    pub fn replay(&self, handlers: &HandlerTable<'_>) -> Result<()> {
        let file = fs_err::File::open(&self.path)?;
        let reader = BufReader::new(file);

        for (line_no, line) in reader.lines().enumerate() {
            let line = line.map_err(Error::Io)?;
            let record: Record = serde_json::from_str(&line).map_err(|e| {
                Error::MalformedLog(format!("{}:{}: {e}", self.path.display(), line_no + 1))
            })?;
            let handler = handlers.get(record.key.as_str()).ok_or_else(|| {
                Error::MalformedLog(format!(
                    "unknown operation '{}' at {}:{}",
                    record.key,
                    self.path.display(),
                    line_no + 1
                ))
            })?;
            handler(&record.parameters)?;
        }

        Ok(())
    }

    /// Rewrites the backing file from a fresh snapshot, as returned by
    /// `snapshot`. Leaves the backing file untouched on any failure
    /// before the replacement step.
    pub fn compact<F>(&self, snapshot: F) -> Result<()>
    where
        F: FnOnce() -> Vec<(String, Vec<Value>)>,
    {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut scratch = tempfile::NamedTempFile::new_in(dir)?;

        for (op_name, parameters) in snapshot() {
            let record = Record {
                key: op_name,
                parameters,
            };
            let line = serde_json::to_string(&record)?;
            writeln!(scratch, "{line}")?;
        }
        scratch.flush()?;

        let contents = fs_err::read(scratch.path())?;
        fs_err::write(&self.path, contents)?;

        log::trace!("compacted log at {}", self.path.display());
        Ok(())
    }

    fn compact_if_necessary<F>(&self, snapshot: F) -> Result<()>
    where
        F: FnOnce() -> Vec<(String, Vec<Value>)>,
    {
        let size = fs_err::metadata(&self.path)?.len();
        let threshold = *self.compaction_threshold.lock();
        if size < threshold {
            return Ok(());
        }

        self.compact(snapshot)?;

        let size = fs_err::metadata(&self.path)?.len();
        let mut guard = self.compaction_threshold.lock();
        if size > *guard {
            // Still over threshold after compacting: grow it to avoid
            // thrashing on every subsequent append.
            *guard = size.saturating_mul(2);
            log::debug!(
                "grew compaction threshold to {} bytes for {}",
                *guard,
                self.path.display()
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_one(record: (&str, Vec<Value>)) -> Vec<(String, Vec<Value>)> {
        vec![(record.0.to_string(), record.1)]
    }

    #[test]
    fn open_creates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fresh.log");
        assert!(!path.exists());

        let log = Log::open(&path).unwrap();
        assert!(path.exists());
        assert_eq!(log.compaction_threshold(), crate::config::DEFAULT_COMPACTION_THRESHOLD);
    }

    #[test]
    fn open_rejects_malformed_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.log");
        std::fs::write(&path, "ooga booga I'm corrupted data\n").unwrap();

        let err = Log::open(&path).unwrap_err();
        assert!(matches!(err, Error::MalformedLog(_)));
    }

    #[test]
    fn append_then_replay_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rt.log");
        let log = Log::open(&path).unwrap();

        log.append("append", vec![Value::from(1)], || Vec::new())
            .unwrap();
        log.append("append", vec![Value::from(2)], || Vec::new())
            .unwrap();

        let seen = std::cell::RefCell::new(Vec::new());
        let mut handlers: HandlerTable<'_> = HashMap::new();
        handlers.insert(
            "append".to_string(),
            Box::new(|params: &[Value]| {
                seen.borrow_mut().push(params[0].clone());
                Ok(())
            }),
        );
        log.replay(&handlers).unwrap();

        assert_eq!(*seen.borrow(), vec![Value::from(1), Value::from(2)]);
    }

    #[test]
    fn compact_shrinks_a_redundant_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("compact.log");
        let log = Log::open(&path).unwrap();

        for _ in 0..100 {
            log.append_record("set", vec![Value::from(1), Value::from("x")])
                .unwrap();
        }
        let before = fs_err::metadata(&path).unwrap().len();

        log.compact(|| snapshot_one(("set", vec![Value::from(1), Value::from("x")])))
            .unwrap();
        let after = fs_err::metadata(&path).unwrap().len();

        assert!(after > 0);
        assert!(after < before);
    }

    #[test]
    fn threshold_only_grows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grow.log");
        let log = Log::open(&path).unwrap();
        log.set_compaction_threshold(1024);

        for i in 0u64..100 {
            let params: Vec<Value> = (0..=i).map(Value::from).collect();
            log.append("append", vec![Value::from(i)], || {
                vec![("append".to_string(), params.clone())]
            })
            .unwrap();
        }

        assert!(log.compaction_threshold() > 1024);
    }
}
