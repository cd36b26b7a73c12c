//! In-memory model of a site's CMS content tree.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Per-content-type metadata from the CMS.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentTypeMeta {
    /// A one-off content type holds a single record instead of an item
    /// collection, and its item id equals the content type name.
    #[serde(default)]
    pub one_off: bool,
}

/// Snapshot of one site's authoritative content data.
///
/// `data` maps a content type either to its single record (one-off types) or
/// to an object of item id → record (collection types); `content_types`
/// carries the metadata saying which. Every content type present in `data`
/// is expected to have a metadata entry. The tree is supplied wholesale per
/// reconciliation run and never mutated by it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteTree {
    #[serde(rename = "contentType", default)]
    pub content_types: BTreeMap<String, ContentTypeMeta>,
    #[serde(default)]
    pub data: BTreeMap<String, Value>,
}

impl SiteTree {
    /// Whether the tree currently classifies `content_type` as one-off.
    pub fn is_one_off(&self, content_type: &str) -> bool {
        self.content_types
            .get(content_type)
            .map(|meta| meta.one_off)
            .unwrap_or(false)
    }

    /// Resolve the source record behind an indexed document's identity.
    ///
    /// `one_off` comes from the caller (for snapshot documents, the flag
    /// the document was stored with), not from the current metadata.
    /// Returns `Some` only when the identity path lands on a JSON object;
    /// anything else (content type gone, item id gone, a non-object value)
    /// is the caller's delete signal. Missing relationships are never an
    /// error here.
    pub fn record_for(&self, content_type: &str, item_id: &str, one_off: bool) -> Option<&Value> {
        let node = self.data.get(content_type)?;
        let record = if one_off { node } else { node.get(item_id)? };
        record.is_object().then_some(record)
    }
}
