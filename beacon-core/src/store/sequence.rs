//! Ordered string sequences stored in a single durable value
//!
//! Sequences are written as a JSON array of strings. Values written by older
//! clients joined the elements with [`LEGACY_DELIMITER`] instead; those are
//! still read, and are rewritten as JSON arrays on the next modification.
//!
//! Decoding the elements themselves is fallible per element: a bad element is
//! logged and skipped, the rest of the sequence is still returned.

use crate::error::Result;

/// Separator used by the delimiter-joined encoding
pub const LEGACY_DELIMITER: &str = ":::";

/// Split a stored value into its elements, in storage order.
///
/// Empty elements are never returned, so an empty value reads as an empty
/// sequence.
pub fn split(raw: &str) -> Vec<String> {
    if raw.is_empty() {
        return Vec::new();
    }

    if raw.starts_with('[') {
        match serde_json::from_str::<Vec<serde_json::Value>>(raw) {
            Ok(values) => {
                return values
                    .into_iter()
                    .map(|v| match v {
                        serde_json::Value::String(s) => s,
                        other => other.to_string(),
                    })
                    .filter(|s| !s.is_empty())
                    .collect();
            }
            Err(e) => {
                tracing::debug!(error = %e, "Stored sequence is not a JSON array, splitting on delimiter");
            }
        }
    }

    raw.split(LEGACY_DELIMITER)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Encode elements for storage
pub fn join(items: &[String]) -> Result<String> {
    Ok(serde_json::to_string(items)?)
}

/// Result of decoding every element of a sequence
#[derive(Debug)]
pub struct Decoded<T> {
    /// Successfully decoded elements, in input order
    pub items: Vec<T>,
    /// Number of elements that failed to decode
    pub skipped: usize,
}

/// Decode each element independently, skipping the ones that fail.
///
/// `what` names the element kind in log output.
pub fn decode_each<'a, T, E, I, F>(elements: I, what: &str, mut decode: F) -> Decoded<T>
where
    I: IntoIterator<Item = &'a str>,
    F: FnMut(&str) -> std::result::Result<T, E>,
    E: std::fmt::Display,
{
    let mut items = Vec::new();
    let mut skipped = 0;

    for (index, element) in elements.into_iter().enumerate() {
        match decode(element) {
            Ok(item) => items.push(item),
            Err(e) => {
                skipped += 1;
                tracing::warn!(kind = what, index, error = %e, "Skipping unreadable {}", what);
            }
        }
    }

    if skipped > 0 {
        tracing::warn!(
            kind = what,
            decoded = items.len(),
            skipped,
            "Dropped unreadable entries while reading queue"
        );
    }

    Decoded { items, skipped }
}
