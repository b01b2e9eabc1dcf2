//! JSON value helpers shared by the log engine and its adapters.
//!
//! Parameters, list elements, and map keys/values are all JSON-encodable
//! data. Rather than invent a bespoke tagged-variant type, this crate reuses
//! `serde_json::Value` directly: it already models exactly the
//! `{Null, Bool, Number, String, Array, Object}` domain the wire format
//! needs, with structural equality and a stable `Display` impl included.

use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};

/// Re-exported for callers who want the type name without reaching into
/// `serde_json` themselves.
pub type Json = Value;

/// Checks that a single input is JSON-encodable.
///
/// Mirrors the library's internal `test_json_encoding` contract: a failure
/// here must happen before any in-memory mutation, so callers should always
/// run this before touching container state.
pub fn encode_one<T: Serialize>(item: &T) -> Result<Value> {
    serde_json::to_value(item).map_err(Error::Encoding)
}

/// The canonical JSON spelling of a value, used as a hashable surrogate key
/// for non-string map keys (numbers, booleans, ...). Two values that are
/// structurally equal as JSON always produce the same canonical spelling,
/// which is what lets e.g. the integer key `1` round-trip as `1` rather
/// than silently becoming the string key `"1"`.
pub fn canonical_key(value: &Value) -> String {
    // serde_json's Value -> String formatting is already canonical: object
    // key order follows insertion (we never build keys with more than one
    // field here) and numbers format without superfluous digits.
    value.to_string()
}
