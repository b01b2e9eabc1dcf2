//! # persisted
//!
//! A small embedded persistence library providing durable in-memory
//! containers backed by an append-only operation log on a local file.
//!
//! ## Overview
//!
//! Every mutation on a container is synchronously recorded to its backing
//! file before the call returns, so the container's state can be
//! reconstructed by replaying the log after a restart. This crate
//! provides:
//! - An append-only, line-delimited, JSON-encoded log engine, with
//!   crash-tolerant replay and size-triggered compaction.
//! - An ordered sequence adapter (`PersistedList`) backed by a log.
//! - A keyed mapping adapter (`PersistedMap`) backed by a log.
//! - A stack of saved pages (`SavedPageStack`), an illustrative consumer
//!   of the map.
//!
//! ## Modules
//!
//! - `error`: the closed error taxonomy shared by every layer.
//! - `value`: JSON-encodability helpers built on `serde_json::Value`.
//! - `config`: the compaction-threshold option exposed to callers.
//! - `log`: the log engine itself.
//! - `list`: the persisted list container.
//! - `map`: the persisted map container.
//! - `stack`: the saved-pages stack built on top of the map.

pub mod config;
pub mod error;
pub mod list;
pub mod log;
pub mod map;
pub mod stack;
pub mod value;

pub use error::{Error, Result};
pub use list::PersistedList;
pub use map::PersistedMap;
pub use stack::{SavedPage, SavedPageStack};
