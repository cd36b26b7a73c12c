//! The diff engine: classifies every indexed document and every source
//! record into the minimal set of index operations.
//!
//! [`plan`] is a pure function over its two snapshot inputs: no I/O, no
//! state between calls, which makes it safe to run anywhere and testable
//! without mocks. All decisions are value returns; nothing is shared across
//! the per-document iterations.

use std::collections::HashSet;

use serde_json::Value;

use crate::contract::{IndexedDocument, StoredSource};
use crate::key;
use crate::normalise::{display_name, payload_equal, Normaliser};
use crate::tree::SiteTree;

/// One write the index needs in order to converge on the source tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// The source record has no indexed counterpart yet.
    Create {
        key: String,
        index: String,
        body: StoredSource,
    },
    /// The indexed payload no longer matches the source record.
    Update {
        id: String,
        index: String,
        body: StoredSource,
    },
    /// The indexed document has no resolvable source record.
    Delete { id: String, index: String },
}

/// Outcome for a single indexed document during the update/delete phase.
#[derive(Debug, Clone, PartialEq)]
pub enum DocDecision {
    /// Stored payload still matches the source record.
    Keep,
    /// No resolvable source record behind the document's identity key.
    Remove,
    /// Source record changed; reindex with this envelope.
    Reindex(StoredSource),
}

/// Compute the operations bringing `snapshot` in sync with `tree`.
///
/// Creates come first, then update/deletes in snapshot order. The two groups
/// target disjoint keys, so the bulk apply is order-insensitive beyond that.
/// An empty result means the index is already in sync and no write call
/// should be issued.
pub fn plan(
    tree: &SiteTree,
    index_name: &str,
    snapshot: &[IndexedDocument],
    normaliser: &Normaliser,
) -> Result<Vec<Operation>, serde_json::Error> {
    let mut operations = create_operations(tree, index_name, snapshot, normaliser)?;

    for doc in snapshot {
        match decide(tree, normaliser, doc)? {
            DocDecision::Keep => {}
            DocDecision::Remove => operations.push(Operation::Delete {
                id: doc.id.clone(),
                index: doc.index.clone(),
            }),
            DocDecision::Reindex(body) => operations.push(Operation::Update {
                id: doc.id.clone(),
                index: doc.index.clone(),
                body,
            }),
        }
    }

    Ok(operations)
}

/// Create phase: one operation per source key missing from the index.
fn create_operations(
    tree: &SiteTree,
    index_name: &str,
    snapshot: &[IndexedDocument],
    normaliser: &Normaliser,
) -> Result<Vec<Operation>, serde_json::Error> {
    let index_keys: HashSet<String> = snapshot.iter().map(key::indexed_document_key).collect();

    let mut operations = Vec::new();
    for source_key in key::source_tree_keys(tree) {
        if index_keys.contains(&source_key) {
            continue;
        }
        let Some((content_type, item_id)) = key::decode(&source_key) else {
            continue;
        };
        // One-off records carry their content type as their id.
        let one_off = content_type == item_id;
        let Some(record) = source_record(tree, content_type, item_id, one_off) else {
            continue;
        };
        let body = StoredSource {
            doc: normaliser.normalise(record)?,
            name: display_name(record),
            content_type: content_type.to_string(),
            one_off,
        };
        operations.push(Operation::Create {
            key: source_key,
            index: index_name.to_string(),
            body,
        });
    }

    Ok(operations)
}

/// Per-document decision for the update/delete phase.
///
/// Resolution follows the document's own stored one-off flag, not the tree's
/// current metadata: a content type's classification is frozen at first
/// index time, and changing it requires deleting and recreating the entry.
/// A failed resolution is the delete signal, never an error.
pub fn decide(
    tree: &SiteTree,
    normaliser: &Normaliser,
    doc: &IndexedDocument,
) -> Result<DocDecision, serde_json::Error> {
    let Some(record) = tree.record_for(&doc.source.content_type, &doc.id, doc.source.one_off)
    else {
        return Ok(DocDecision::Remove);
    };

    let fresh = normaliser.normalise(record)?;
    if payload_equal(&doc.source.doc, &fresh) {
        return Ok(DocDecision::Keep);
    }

    Ok(DocDecision::Reindex(StoredSource {
        doc: fresh,
        name: display_name(record),
        content_type: doc.source.content_type.clone(),
        one_off: doc.source.one_off,
    }))
}

/// Fetch the record for a source key during the create phase. Unlike the
/// update/delete resolution, any present value qualifies: the normaliser
/// copes with non-object records.
fn source_record<'t>(
    tree: &'t SiteTree,
    content_type: &str,
    item_id: &str,
    one_off: bool,
) -> Option<&'t Value> {
    let node = tree.data.get(content_type)?;
    if one_off {
        Some(node)
    } else {
        node.get(item_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalise::NormaliserMode;
    use serde_json::json;

    fn tree(value: Value) -> SiteTree {
        serde_json::from_value(value).expect("tree fixture")
    }

    fn doc(id: &str, content_type: &str, one_off: bool, payload: Value) -> IndexedDocument {
        IndexedDocument {
            id: id.to_string(),
            index: "my-site".to_string(),
            source: StoredSource {
                doc: payload,
                name: None,
                content_type: content_type.to_string(),
                one_off,
            },
        }
    }

    fn opaque() -> Normaliser {
        Normaliser::new(NormaliserMode::OpaqueStringify)
    }

    fn stored_payload(record: &Value) -> Value {
        opaque().normalise(record).unwrap()
    }

    #[test]
    fn empty_index_creates_every_source_record() {
        let tree = tree(json!({
            "contentType": { "pages": { "oneOff": false } },
            "data": { "pages": { "a": { "name": "A" }, "b": { "name": "B" } } }
        }));

        let ops = plan(&tree, "my-site", &[], &opaque()).unwrap();

        assert_eq!(ops.len(), 2);
        match &ops[0] {
            Operation::Create { key, index, body } => {
                assert_eq!(key, "pages!a");
                assert_eq!(index, "my-site");
                assert_eq!(body.name.as_deref(), Some("A"));
                assert_eq!(body.content_type, "pages");
                assert!(!body.one_off);
            }
            other => panic!("expected create, got {other:?}"),
        }
        assert!(matches!(&ops[1], Operation::Create { key, .. } if key == "pages!b"));
    }

    #[test]
    fn no_create_for_keys_already_indexed() {
        let record = json!({ "name": "A" });
        let tree = tree(json!({
            "contentType": { "pages": { "oneOff": false } },
            "data": { "pages": { "a": record } }
        }));
        let snapshot = vec![doc("a", "pages", false, stored_payload(&record))];

        let ops = plan(&tree, "my-site", &snapshot, &opaque()).unwrap();
        assert!(ops.is_empty(), "unchanged record must produce no operations");
    }

    #[test]
    fn removed_item_is_deleted() {
        let tree = tree(json!({
            "contentType": { "pages": { "oneOff": false } },
            "data": { "pages": {} }
        }));
        let snapshot = vec![doc("a", "pages", false, json!("{\"name\":\"A\"}"))];

        let ops = plan(&tree, "my-site", &snapshot, &opaque()).unwrap();

        assert_eq!(
            ops,
            vec![Operation::Delete {
                id: "a".to_string(),
                index: "my-site".to_string(),
            }]
        );
    }

    #[test]
    fn removed_content_type_is_deleted() {
        let tree = tree(json!({ "contentType": {}, "data": {} }));
        let snapshot = vec![doc("a", "pages", false, json!("{}"))];

        let ops = plan(&tree, "my-site", &snapshot, &opaque()).unwrap();
        assert_eq!(ops.len(), 1);
        assert!(matches!(&ops[0], Operation::Delete { id, .. } if id == "a"));
    }

    #[test]
    fn changed_record_is_updated_with_new_payload() {
        let tree = tree(json!({
            "contentType": { "pages": { "oneOff": false } },
            "data": { "pages": { "a": { "name": "A2" } } }
        }));
        let snapshot = vec![doc(
            "a",
            "pages",
            false,
            stored_payload(&json!({ "name": "A" })),
        )];

        let ops = plan(&tree, "my-site", &snapshot, &opaque()).unwrap();

        assert_eq!(ops.len(), 1);
        match &ops[0] {
            Operation::Update { id, body, .. } => {
                assert_eq!(id, "a");
                assert_eq!(body.doc, stored_payload(&json!({ "name": "A2" })));
                assert_eq!(body.name.as_deref(), Some("A2"));
                assert_eq!(body.content_type, "pages");
            }
            other => panic!("expected update, got {other:?}"),
        }
    }

    #[test]
    fn one_off_lifecycle() {
        let with_settings = tree(json!({
            "contentType": { "settings": { "oneOff": true } },
            "data": { "settings": { "name": "Site" } }
        }));

        // Absent from the index: one create keyed T!T.
        let ops = plan(&with_settings, "my-site", &[], &opaque()).unwrap();
        assert_eq!(ops.len(), 1);
        match &ops[0] {
            Operation::Create { key, body, .. } => {
                assert_eq!(key, "settings!settings");
                assert!(body.one_off);
            }
            other => panic!("expected create, got {other:?}"),
        }

        // Present and equal: nothing.
        let snapshot = vec![doc(
            "settings",
            "settings",
            true,
            stored_payload(&json!({ "name": "Site" })),
        )];
        assert!(plan(&with_settings, "my-site", &snapshot, &opaque())
            .unwrap()
            .is_empty());

        // Present and different: one update that stays one-off.
        let changed = tree(json!({
            "contentType": { "settings": { "oneOff": true } },
            "data": { "settings": { "name": "Renamed" } }
        }));
        let ops = plan(&changed, "my-site", &snapshot, &opaque()).unwrap();
        assert_eq!(ops.len(), 1);
        assert!(matches!(&ops[0], Operation::Update { body, .. } if body.one_off));

        // Removed from the tree: one delete.
        let emptied = tree(json!({ "contentType": {}, "data": {} }));
        let ops = plan(&emptied, "my-site", &snapshot, &opaque()).unwrap();
        assert!(matches!(&ops[0], Operation::Delete { id, .. } if id == "settings"));
    }

    #[test]
    fn resolution_follows_the_stored_one_off_flag() {
        // The tree now calls "settings" a collection, but the indexed
        // document was stored one-off: resolution still takes the one-off
        // path and lands on the type's node itself.
        let tree = tree(json!({
            "contentType": { "settings": { "oneOff": false } },
            "data": { "settings": { "name": "Site" } }
        }));
        let snapshot = vec![doc(
            "settings",
            "settings",
            true,
            stored_payload(&json!({ "name": "Site" })),
        )];

        let decision = decide(&tree, &opaque(), &snapshot[0]).unwrap();
        assert_eq!(decision, DocDecision::Keep);
    }

    #[test]
    fn non_object_source_value_is_a_delete() {
        let tree = tree(json!({
            "contentType": { "pages": { "oneOff": false } },
            "data": { "pages": { "a": "not a record" } }
        }));
        let snapshot = vec![doc("a", "pages", false, json!("not a record"))];

        let decision = decide(&tree, &opaque(), &snapshot[0]).unwrap();
        assert_eq!(decision, DocDecision::Remove);
    }

    #[test]
    fn creates_precede_update_deletes() {
        let tree = tree(json!({
            "contentType": { "pages": { "oneOff": false } },
            "data": { "pages": { "new": { "name": "N" } } }
        }));
        let snapshot = vec![doc("gone", "pages", false, json!("{}"))];

        let ops = plan(&tree, "my-site", &snapshot, &opaque()).unwrap();
        assert_eq!(ops.len(), 2);
        assert!(matches!(&ops[0], Operation::Create { .. }));
        assert!(matches!(&ops[1], Operation::Delete { .. }));
    }

    #[test]
    fn second_run_over_applied_state_is_empty() {
        let tree = tree(json!({
            "contentType": {
                "pages": { "oneOff": false },
                "settings": { "oneOff": true }
            },
            "data": {
                "pages": { "a": { "name": "A" }, "b": { "name": "B" } },
                "settings": { "name": "Site" }
            }
        }));

        let first = plan(&tree, "my-site", &[], &opaque()).unwrap();

        // Apply the creates by hand to build the post-run snapshot.
        let snapshot: Vec<IndexedDocument> = first
            .iter()
            .map(|op| match op {
                Operation::Create { key, index, body } => IndexedDocument {
                    id: key::decode(key).map(|(_, id)| id).unwrap().to_string(),
                    index: index.clone(),
                    source: body.clone(),
                },
                other => panic!("first run against an empty index: {other:?}"),
            })
            .collect();

        let second = plan(&tree, "my-site", &snapshot, &opaque()).unwrap();
        assert!(second.is_empty(), "second run must be a no-op");
    }

    #[test]
    fn flattened_mode_ignores_dropped_field_changes() {
        // A numeric field is not part of the flattened payload, so changing
        // it can never trigger an update.
        let normaliser = Normaliser::new(NormaliserMode::Flattened);
        let tree = tree(json!({
            "contentType": { "pages": { "oneOff": false } },
            "data": { "pages": { "a": { "name": "A", "views": 2 } } }
        }));
        let stored = normaliser
            .normalise(&json!({ "name": "A", "views": 1 }))
            .unwrap();
        let snapshot = vec![doc("a", "pages", false, stored)];

        let ops = plan(&tree, "my-site", &snapshot, &normaliser).unwrap();
        assert!(ops.is_empty());
    }
}
