//! # contract: interface to the external search service
//!
//! This module defines a single trait ([`SearchStore`]) and the plain data
//! types exchanged with it. The reconciliation engine never touches this
//! trait; it consumes and produces in-memory structures only. The trait is
//! consumed by the orchestration layer ([`crate::synchronise`]) and the CLI,
//! implemented by [`crate::client::HttpSearchStore`] in production and by the
//! generated `MockSearchStore` in tests.
//!
//! All methods are async and return [`SearchError`], which carries the two
//! conditions callers branch on: an index that already exists (expected
//! during idempotent setup) and an index that does not exist (distinct from
//! an empty one).
//!
//! Site names passed to these methods are the escaped form produced by the
//! originating system; implementations derive the actual index name through
//! [`crate::site::index_name_for_site`] exactly once.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors surfaced by a [`SearchStore`] implementation.
#[derive(Debug, Error)]
pub enum SearchError {
    /// The target index does not exist. Callers distinguish this from an
    /// empty index and decide whether to create-then-retry or abort.
    #[error("index not found: {0}")]
    IndexNotFound(String),

    /// Index creation hit an index that is already there. `ensure_index`
    /// treats this as success.
    #[error("index already exists: {0}")]
    IndexAlreadyExists(String),

    /// The service rejected the request for any other reason.
    #[error("search service responded {status}: {reason}")]
    Service { status: u16, reason: String },

    /// The request never completed.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The service answered with a payload this client cannot interpret.
    #[error("unreadable response payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Stored envelope of one document in the index (the `_source` object).
///
/// `doc` is the normalised payload: a JSON string under the opaque-stringify
/// mode, a flat object under the flattened mode. `name` is kept beside the
/// body because it participates in search ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSource {
    pub doc: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub content_type: String,
    #[serde(default)]
    pub one_off: bool,
}

/// One document currently stored in the search index, as returned by a
/// snapshot read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_index")]
    pub index: String,
    #[serde(rename = "_source")]
    pub source: StoredSource,
}

/// Summary row for one index, as reported by the service's cat API.
#[derive(Debug, Clone, Deserialize)]
pub struct IndexInfo {
    #[serde(rename = "index")]
    pub name: String,
    #[serde(rename = "docs.count", default)]
    pub doc_count: Option<String>,
    #[serde(default)]
    pub health: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Parameters for a free-text query against one site's index.
#[derive(Debug, Clone)]
pub struct QueryParams<'a> {
    /// Query text; wrapped into a prefix-phrase pattern before being sent.
    pub text: &'a str,
    /// Restrict matches to one content type.
    pub content_type: Option<&'a str>,
    /// 1-based page; values below 1 are clamped to 1.
    pub page: u32,
    pub page_size: u32,
}

impl<'a> QueryParams<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            text,
            content_type: None,
            page: 1,
            page_size: 10,
        }
    }
}

/// One ranked match returned from a query, trimmed to what the CMS consumes.
#[derive(Debug, Clone, Serialize)]
pub struct QueryMatch {
    pub id: String,
    pub content_type: String,
    pub name: Option<String>,
    pub one_off: bool,
    pub score: Option<f64>,
    /// Highlighted `name` snippets; falls back to the stored name when the
    /// service returned no highlight for the field.
    pub highlight: Vec<String>,
}

/// Trait for reading and writing one site's search index.
/// The implementor is responsible for connecting to the backing service.
///
/// The trait is implemented by real clients and by test mocks.
#[cfg_attr(any(test, feature = "test-export-mocks"), mockall::automock)]
#[async_trait]
pub trait SearchStore: Send + Sync {
    /// Full read of a site's current documents, capped at a fixed maximum.
    ///
    /// Fails with [`SearchError::IndexNotFound`] when the index is missing,
    /// which is not the same as an empty result.
    async fn read_snapshot(&self, site: &str) -> Result<Vec<IndexedDocument>, SearchError>;

    /// Send one assembled bulk batch (see [`crate::bulk::assemble`]).
    ///
    /// Returns the heterogeneous per-item result array exactly as the
    /// service reported it; items are applied independently and partial
    /// failures are not retried here.
    async fn apply_batch(&self, actions: &[Value]) -> Result<Vec<Value>, SearchError>;

    /// Create the index for a site. Must run before documents can be stored.
    async fn create_index(&self, site: &str) -> Result<(), SearchError>;

    /// Delete the index for a site.
    async fn delete_index(&self, site: &str) -> Result<(), SearchError>;

    /// List indices matching a pattern. There should be one per site.
    async fn list_indices(&self, pattern: &str) -> Result<Vec<IndexInfo>, SearchError>;

    /// Free-text search with highlighting and paging.
    async fn query<'a>(
        &self,
        site: &str,
        params: QueryParams<'a>,
    ) -> Result<Vec<QueryMatch>, SearchError>;

    /// Delete a single document by id.
    async fn delete_document(&self, site: &str, id: &str) -> Result<(), SearchError>;

    /// Delete every document of one content type.
    async fn delete_by_content_type(
        &self,
        site: &str,
        content_type: &str,
    ) -> Result<(), SearchError>;

    /// Store a single document under the given id.
    async fn index_document(
        &self,
        site: &str,
        id: &str,
        body: &StoredSource,
    ) -> Result<(), SearchError>;
}
