//! Assembles an operation list into the wire batch for the service's bulk
//! endpoint.

use serde_json::{json, Value};

use crate::key;
use crate::reconcile::Operation;

/// Map operations onto action-header / payload-body wire records.
///
/// Create and update become an `index` header followed by the envelope body;
/// delete is a bare `delete` header. The result is one flat ordered list for
/// a single bulk call. The service applies items independently; there is no
/// cross-item atomicity, and per-item outcomes come back with the response.
pub fn assemble(operations: &[Operation]) -> Result<Vec<Value>, serde_json::Error> {
    let mut records = Vec::with_capacity(operations.len() * 2);
    for operation in operations {
        match operation {
            Operation::Create { key, index, body } => {
                let id = key::decode(key).map_or(key.as_str(), |(_, item_id)| item_id);
                records.push(json!({ "index": { "_index": index, "_id": id } }));
                records.push(serde_json::to_value(body)?);
            }
            Operation::Update { id, index, body } => {
                records.push(json!({ "index": { "_index": index, "_id": id } }));
                records.push(serde_json::to_value(body)?);
            }
            Operation::Delete { id, index } => {
                records.push(json!({ "delete": { "_index": index, "_id": id } }));
            }
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::StoredSource;

    fn body(name: &str) -> StoredSource {
        StoredSource {
            doc: json!(format!("{{\"name\":\"{name}\"}}")),
            name: Some(name.to_string()),
            content_type: "pages".to_string(),
            one_off: false,
        }
    }

    #[test]
    fn create_becomes_header_and_body() {
        let ops = vec![Operation::Create {
            key: "pages!a".to_string(),
            index: "my-site".to_string(),
            body: body("A"),
        }];

        let records = assemble(&ops).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0],
            json!({ "index": { "_index": "my-site", "_id": "a" } })
        );
        assert_eq!(records[1]["contentType"], "pages");
        assert_eq!(records[1]["name"], "A");
    }

    #[test]
    fn one_off_create_uses_the_content_type_as_id() {
        let ops = vec![Operation::Create {
            key: "settings!settings".to_string(),
            index: "my-site".to_string(),
            body: StoredSource {
                doc: json!("{}"),
                name: None,
                content_type: "settings".to_string(),
                one_off: true,
            },
        }];

        let records = assemble(&ops).unwrap();
        assert_eq!(records[0]["index"]["_id"], "settings");
        assert_eq!(records[1]["oneOff"], true);
        assert!(
            records[1].get("name").is_none(),
            "absent name must not be serialised"
        );
    }

    #[test]
    fn delete_is_a_bare_header() {
        let ops = vec![Operation::Delete {
            id: "a".to_string(),
            index: "my-site".to_string(),
        }];

        let records = assemble(&ops).unwrap();
        assert_eq!(
            records,
            vec![json!({ "delete": { "_index": "my-site", "_id": "a" } })]
        );
    }

    #[test]
    fn batch_preserves_operation_order() {
        let ops = vec![
            Operation::Create {
                key: "pages!a".to_string(),
                index: "my-site".to_string(),
                body: body("A"),
            },
            Operation::Delete {
                id: "b".to_string(),
                index: "my-site".to_string(),
            },
        ];

        let records = assemble(&ops).unwrap();
        assert_eq!(records.len(), 3);
        assert!(records[0].get("index").is_some());
        assert!(records[2].get("delete").is_some());
    }

    #[test]
    fn empty_operation_list_yields_empty_batch() {
        assert!(assemble(&[]).unwrap().is_empty());
    }
}
