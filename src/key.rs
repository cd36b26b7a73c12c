//! Identity keys correlating source records with indexed documents.
//!
//! A key is `contentType!itemId`. One-off content types use their own name
//! as the item id, yielding `"T!T"`. Two entities are the same logical
//! document iff their keys match.

use crate::contract::IndexedDocument;
use crate::tree::SiteTree;

/// Separator between the content-type and item-id halves of a key.
/// Neither half may contain it.
pub const SEPARATOR: char = '!';

/// Build the identity key for a (content type, item id) pair.
pub fn encode(content_type: &str, item_id: &str) -> String {
    debug_assert!(
        !content_type.contains(SEPARATOR) && !item_id.contains(SEPARATOR),
        "key halves must not contain the separator"
    );
    format!("{content_type}{SEPARATOR}{item_id}")
}

/// Split a key back into (content type, item id) on the first separator.
pub fn decode(key: &str) -> Option<(&str, &str)> {
    key.split_once(SEPARATOR)
}

/// Enumerate the identity keys of every record in a source tree: one `T!T`
/// key per one-off type, one `T!id` key per item of a collection type.
pub fn source_tree_keys(tree: &SiteTree) -> Vec<String> {
    let mut keys = Vec::new();
    for (content_type, node) in &tree.data {
        if tree.is_one_off(content_type) {
            keys.push(encode(content_type, content_type));
        } else if let Some(items) = node.as_object() {
            for item_id in items.keys() {
                keys.push(encode(content_type, item_id));
            }
        }
    }
    keys
}

/// Identity key of a document already stored in the index.
pub fn indexed_document_key(doc: &IndexedDocument) -> String {
    encode(&doc.source.content_type, &doc.id)
}
