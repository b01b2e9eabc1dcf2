//! Configuration surface for the log engine.
//!
//! Per the library's contract, an adapter takes exactly one required
//! argument: the path to its backing file. The only other tunable is the
//! compaction threshold, which defaults to 1 MiB and is otherwise not
//! read from any environment variable, CLI flag, or settings file.

/// Initial compaction threshold: 1 MiB.
pub const DEFAULT_COMPACTION_THRESHOLD: u64 = 1024 * 1024;

/// Options accepted when opening a [`crate::log::Log`] or one of the
/// container adapters built on top of it.
///
/// This exists solely so tests (and callers who know their workload) can
/// shrink the compaction threshold below the 1 MiB default; it is not a
/// general configuration facility.
#[derive(Debug, Clone, Copy)]
pub struct LogOptions {
    /// The byte-size watermark above which compaction fires after an
    /// append. Grows geometrically afterward; this only sets the starting
    /// point.
    pub initial_threshold: u64,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            initial_threshold: DEFAULT_COMPACTION_THRESHOLD,
        }
    }
}
