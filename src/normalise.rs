//! Normalisation of source records into their index-safe stored form, and
//! the equality used to suppress no-op updates.
//!
//! Exactly one [`NormaliserMode`] is active per deployment. An index written
//! under one mode must never be reconciled under the other: stored payloads
//! and freshly normalised ones would never compare equal, and every document
//! would be rewritten on every run.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// How records are normalised before storage and comparison.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NormaliserMode {
    /// Store the whole record as one JSON string. The default: flattening
    /// sufficiently large sites ran into the index's field-count ceiling.
    #[default]
    OpaqueStringify,
    /// Historical field-path flattening, kept for indexes created under it.
    Flattened,
}

/// Converts source records into the form stored in the index.
#[derive(Debug, Clone, Copy)]
pub struct Normaliser {
    mode: NormaliserMode,
}

impl Normaliser {
    pub fn new(mode: NormaliserMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> NormaliserMode {
        self.mode
    }

    /// Normalise a record. Objects are stringified or flattened per mode;
    /// strings pass through unchanged; other scalars are left as-is. A
    /// record that cannot be serialised fails loudly rather than being
    /// stored half-converted.
    pub fn normalise(&self, record: &Value) -> Result<Value, serde_json::Error> {
        match self.mode {
            NormaliserMode::OpaqueStringify => match record {
                Value::String(_) => Ok(record.clone()),
                Value::Object(_) => Ok(Value::String(serde_json::to_string(record)?)),
                other => Ok(other.clone()),
            },
            NormaliserMode::Flattened => match record {
                Value::Object(_) | Value::Array(_) => {
                    let mut flat = Map::new();
                    flatten_into("", record, &mut flat);
                    Ok(Value::Object(flat))
                }
                other => Ok(other.clone()),
            },
        }
    }
}

/// Extract the record's top-level `name`, stored beside the body because it
/// participates in search ranking.
pub fn display_name(record: &Value) -> Option<String> {
    record.get("name").and_then(Value::as_str).map(str::to_owned)
}

/// Deep structural equality between a stored payload and a freshly
/// normalised one. Type-sensitive: a stringified number is not equal to the
/// number. Only meaningful when both sides were produced by the same
/// normaliser mode.
pub fn payload_equal(stored: &Value, fresh: &Value) -> bool {
    stored == fresh
}

/// Does the input conform to a shape like `2017-04-07T14:10:00-04:00`, or
/// any ISO-8601 prefix of it (`2017`, `2017-04`, ...)?
pub fn is_date_like(input: &str) -> bool {
    static ISO_8601: OnceLock<Regex> = OnceLock::new();
    let pattern = ISO_8601.get_or_init(|| {
        Regex::new(r"(?i)^\d{4}(-\d\d(-\d\d(T\d\d:\d\d(:\d\d)?(\.\d+)?(([+-]\d\d:\d\d)|Z)?)?)?)?$")
            .expect("date pattern is a valid regex")
    });
    pattern.is_match(input)
}

fn flatten_into(prefix: &str, value: &Value, out: &mut Map<String, Value>) {
    match value {
        Value::Object(fields) => {
            for (field, nested) in fields {
                flatten_into(&join_path(prefix, field), nested, out);
            }
        }
        Value::Array(elements) => {
            for (index, nested) in elements.iter().enumerate() {
                flatten_into(&join_path(prefix, &index.to_string()), nested, out);
            }
        }
        terminal => {
            if keeps_terminal(terminal) {
                out.insert(prefix.to_string(), terminal.clone());
            }
        }
    }
}

fn join_path(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{prefix}_{segment}")
    }
}

/// Numeric, boolean and date-like terminals are dropped from the flattened
/// form. Lossy on purpose: such fields never trigger an update and are not
/// searchable under this mode.
fn keeps_terminal(value: &Value) -> bool {
    match value {
        Value::Number(_) | Value::Bool(_) => false,
        Value::String(text) => !is_date_like(text),
        _ => true,
    }
}
