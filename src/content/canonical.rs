// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Deterministic JSON formatting.
//!
//! Values are decoded into a generic [`serde_json::Value`] and re-encoded with
//! two-space indentation.  Object keys come out sorted because `Value`'s map
//! is ordered by key, so formatting already-formatted output is a no-op.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Errors raised while canonicalising JSON.
#[derive(Error, Debug)]
pub enum FormatError {
    /// The input could not be decoded as JSON.
    #[error("malformed JSON: {0}")]
    Malformed(#[source] serde_json::Error),

    /// The value could not be encoded as JSON.
    #[error("failed to encode JSON: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Canonicalise any serialisable value.
pub fn format_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, FormatError> {
    let value = serde_json::to_value(value).map_err(FormatError::Encode)?;
    encode(&value)
}

/// Canonicalise raw JSON bytes.
pub fn format_json_data(data: &[u8]) -> Result<Vec<u8>, FormatError> {
    let value: Value = serde_json::from_slice(data).map_err(FormatError::Malformed)?;
    encode(&value)
}

fn encode(value: &Value) -> Result<Vec<u8>, FormatError> {
    serde_json::to_vec_pretty(&sorted(value)).map_err(FormatError::Encode)
}

// Rebuilds objects in key order so the output does not depend on whether
// serde_json was compiled with `preserve_order`.
fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.clone(), sorted(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}
