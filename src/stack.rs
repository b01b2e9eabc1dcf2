//! A stack of saved pages: a thin, illustrative consumer of
//! [`PersistedMap`] keyed by URL.
//!
//! This module exists to fix the external contract an application layer
//! would observe; it does not attempt to model anything beyond what the
//! map already guarantees (no tagging, no folders, no search).

use std::cmp::Ordering;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::map::PersistedMap;

/// One saved page. The URL is duplicated inside the record (as well as
/// being the map key) so that [`SavedPageStack::as_sorted_list`] doesn't
/// need an external join to produce a self-contained listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedPage {
    pub title: String,
    pub timestamp: f64,
    pub url: String,
}

/// A stack of pages a user has saved for later viewing.
pub struct SavedPageStack {
    pages: PersistedMap,
}

impl SavedPageStack {
    /// Opens the stack backed by `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            pages: PersistedMap::open(path)?,
        })
    }

    /// Adds a new page to the stack, keyed by `url`.
    pub fn add(&self, url: &str, title: &str, timestamp: f64) -> Result<()> {
        let page = SavedPage {
            title: title.to_string(),
            timestamp,
            url: url.to_string(),
        };
        self.pages.set(url, page)
    }

    /// Adds a new page stamped with the current time, for callers that
    /// don't already have a timestamp on hand.
    pub fn add_now(&self, url: &str, title: &str) -> Result<()> {
        let timestamp = chrono::Utc::now().timestamp_millis() as f64 / 1000.0;
        self.add(url, title, timestamp)
    }

    /// Deletes the page referenced by `url`. Silently does nothing if the
    /// URL was never saved.
    pub fn delete(&self, url: &str) -> Result<()> {
        match self.pages.delete(url) {
            Ok(_) => Ok(()),
            Err(crate::error::Error::NotFound) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Returns every saved page, sorted by timestamp descending (most
    /// recent first). Ties are broken by the stable sort's original
    /// relative order.
    pub fn as_sorted_list(&self) -> Vec<SavedPage> {
        let mut pages: Vec<SavedPage> = self
            .pages
            .iterate_values()
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect();
        pages.sort_by(|a, b| {
            b.timestamp
                .partial_cmp(&a.timestamp)
                .unwrap_or(Ordering::Equal)
        });
        pages
    }
}

impl PartialEq for SavedPageStack {
    fn eq(&self, other: &Self) -> bool {
        self.pages == other.pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_list_sorted_by_timestamp_desc() {
        let dir = tempfile::tempdir().unwrap();
        let stack = SavedPageStack::open(dir.path().join("stack.log")).unwrap();

        stack.add("https://a.example", "A", 100.0).unwrap();
        stack.add("https://b.example", "B", 300.0).unwrap();
        stack.add("https://c.example", "C", 200.0).unwrap();

        let list = stack.as_sorted_list();
        let urls: Vec<&str> = list.iter().map(|p| p.url.as_str()).collect();
        assert_eq!(urls, vec!["https://b.example", "https://c.example", "https://a.example"]);
    }

    #[test]
    fn add_now_stamps_a_plausible_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let stack = SavedPageStack::open(dir.path().join("stack.log")).unwrap();

        stack.add_now("https://now.example", "Now").unwrap();

        let pages = stack.as_sorted_list();
        assert_eq!(pages.len(), 1);
        // Sanity bound: anything after 2020-01-01 in Unix seconds.
        assert!(pages[0].timestamp > 1_577_836_800.0);
    }

    #[test]
    fn delete_missing_url_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let stack = SavedPageStack::open(dir.path().join("stack.log")).unwrap();
        stack.delete("https://never-added.example").unwrap();
        assert_eq!(stack.as_sorted_list().len(), 0);
    }

    #[test]
    fn equality_compares_contents_not_identity() {
        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();
        let a = SavedPageStack::open(dir_a.path().join("a.log")).unwrap();
        let b = SavedPageStack::open(dir_b.path().join("b.log")).unwrap();

        a.add("https://x.example", "X", 1.0).unwrap();
        b.add("https://x.example", "X", 1.0).unwrap();
        assert!(a == b);

        b.add("https://y.example", "Y", 2.0).unwrap();
        assert!(a != b);
    }
}
