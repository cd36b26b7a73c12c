//! HTTP implementation of the search-store contract against an
//! Elasticsearch-compatible service.
//!
//! Thin transport wrapper: one request/response per call, no retries, no
//! state beyond the connection settings. Timeout and retry policy belong to
//! the caller.

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};
use tracing::debug;

use crate::config::SearchConfig;
use crate::contract::{
    IndexInfo, IndexedDocument, QueryMatch, QueryParams, SearchError, SearchStore, StoredSource,
};
use crate::site::index_name_for_site;

/// Maximum documents returned by a snapshot read. Indexes larger than this
/// need caller-side pagination, which this layer does not provide.
pub const SNAPSHOT_LIMIT: usize = 10_000;

/// `reqwest`-backed [`SearchStore`].
pub struct HttpSearchStore {
    http: reqwest::Client,
    base_url: String,
    auth: Option<(String, String)>,
}

impl HttpSearchStore {
    pub fn new(config: &SearchConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.endpoint.trim_end_matches('/').to_string(),
            auth: config
                .auth
                .as_ref()
                .map(|auth| (auth.username.clone(), auth.password.clone())),
        }
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self.http.request(method, format!("{}/{path}", self.base_url));
        if let Some((username, password)) = &self.auth {
            builder = builder.basic_auth(username, Some(password));
        }
        builder
    }

    /// Read the response body, mapping service-level failures onto the typed
    /// error variants callers branch on.
    async fn read_response(response: reqwest::Response, index: &str) -> Result<Value, SearchError> {
        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            if text.is_empty() {
                return Ok(Value::Null);
            }
            return Ok(serde_json::from_str(&text)?);
        }

        let reason = error_type(&text);
        match status {
            StatusCode::NOT_FOUND => Err(SearchError::IndexNotFound(index.to_string())),
            StatusCode::BAD_REQUEST
                if reason.as_deref() == Some("resource_already_exists_exception") =>
            {
                Err(SearchError::IndexAlreadyExists(index.to_string()))
            }
            _ => Err(SearchError::Service {
                status: status.as_u16(),
                reason: reason.unwrap_or(text),
            }),
        }
    }
}

#[async_trait]
impl SearchStore for HttpSearchStore {
    async fn read_snapshot(&self, site: &str) -> Result<Vec<IndexedDocument>, SearchError> {
        let index = index_name_for_site(site);
        let body = json!({
            "size": SNAPSHOT_LIMIT,
            "query": { "match_all": {} }
        });

        let response = self
            .request(Method::POST, &format!("{index}/_search"))
            .json(&body)
            .send()
            .await?;
        let payload = Self::read_response(response, &index).await?;

        let hits = payload
            .pointer("/hits/hits")
            .cloned()
            .unwrap_or(Value::Array(Vec::new()));
        let documents: Vec<IndexedDocument> = serde_json::from_value(hits)?;
        debug!(index = %index, count = documents.len(), "read index snapshot");
        Ok(documents)
    }

    async fn apply_batch(&self, actions: &[Value]) -> Result<Vec<Value>, SearchError> {
        let mut ndjson = String::new();
        for action in actions {
            ndjson.push_str(&serde_json::to_string(action)?);
            ndjson.push('\n');
        }

        let response = self
            .request(Method::POST, "_bulk")
            .header("content-type", "application/x-ndjson")
            .body(ndjson)
            .send()
            .await?;
        let payload = Self::read_response(response, "_bulk").await?;

        let items = payload
            .get("items")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        debug!(items = items.len(), "bulk call applied");
        Ok(items)
    }

    async fn create_index(&self, site: &str) -> Result<(), SearchError> {
        let index = index_name_for_site(site);
        let response = self.request(Method::PUT, &index).send().await?;
        Self::read_response(response, &index).await?;
        Ok(())
    }

    async fn delete_index(&self, site: &str) -> Result<(), SearchError> {
        let index = index_name_for_site(site);
        let response = self.request(Method::DELETE, &index).send().await?;
        Self::read_response(response, &index).await?;
        Ok(())
    }

    async fn list_indices(&self, pattern: &str) -> Result<Vec<IndexInfo>, SearchError> {
        let pattern = if pattern.is_empty() { "*" } else { pattern };
        let response = self
            .request(Method::GET, &format!("_cat/indices/{pattern}"))
            .query(&[("format", "json")])
            .send()
            .await?;
        let payload = Self::read_response(response, pattern).await?;
        Ok(serde_json::from_value(payload)?)
    }

    async fn query<'a>(
        &self,
        site: &str,
        params: QueryParams<'a>,
    ) -> Result<Vec<QueryMatch>, SearchError> {
        let index = index_name_for_site(site);
        let page = params.page.max(1);
        let text = prefix_phrase(params.text);

        let base_query = json!({
            "multi_match": {
                "fields": ["name^5", "doc"],
                "type": "phrase_prefix",
                "query": text,
            }
        });
        let query = match params.content_type {
            Some(content_type) => json!({
                "bool": {
                    "must": base_query,
                    "filter": { "term": { "contentType": content_type } },
                }
            }),
            None => base_query,
        };
        let body = json!({
            "from": (page - 1) * params.page_size,
            "size": params.page_size,
            "query": query,
            "highlight": {
                "fields": { "*": {} },
                "encoder": "html",
            },
        });

        let response = self
            .request(Method::POST, &format!("{index}/_search"))
            .json(&body)
            .send()
            .await?;
        let payload = Self::read_response(response, &index).await?;

        let hits = payload
            .pointer("/hits/hits")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        Ok(hits.iter().map(query_match_from_hit).collect())
    }

    async fn delete_document(&self, site: &str, id: &str) -> Result<(), SearchError> {
        let index = index_name_for_site(site);
        let response = self
            .request(Method::DELETE, &format!("{index}/_doc/{id}"))
            .send()
            .await?;
        Self::read_response(response, &index).await?;
        Ok(())
    }

    async fn delete_by_content_type(
        &self,
        site: &str,
        content_type: &str,
    ) -> Result<(), SearchError> {
        let index = index_name_for_site(site);
        let body = json!({ "query": { "term": { "contentType": content_type } } });
        let response = self
            .request(Method::POST, &format!("{index}/_delete_by_query"))
            .json(&body)
            .send()
            .await?;
        Self::read_response(response, &index).await?;
        Ok(())
    }

    async fn index_document(
        &self,
        site: &str,
        id: &str,
        body: &StoredSource,
    ) -> Result<(), SearchError> {
        let index = index_name_for_site(site);
        let response = self
            .request(Method::PUT, &format!("{index}/_doc/{id}"))
            .json(body)
            .send()
            .await?;
        Self::read_response(response, &index).await?;
        Ok(())
    }
}

/// Wrap query text with leading/trailing wildcard markers when absent.
fn prefix_phrase(text: &str) -> String {
    let mut text = text.to_string();
    if !text.starts_with('*') {
        text.insert(0, '*');
    }
    if !text.ends_with('*') {
        text.push('*');
    }
    text
}

/// Pull the service's `error.type` out of a failure body, if it is JSON.
fn error_type(body: &str) -> Option<String> {
    let parsed: Value = serde_json::from_str(body).ok()?;
    parsed
        .get("error")?
        .get("type")?
        .as_str()
        .map(str::to_owned)
}

/// Trim a raw search hit down to what the CMS consumes.
fn query_match_from_hit(hit: &Value) -> QueryMatch {
    let source = hit.get("_source");
    let stored_name = source
        .and_then(|s| s.get("name"))
        .and_then(Value::as_str)
        .map(str::to_owned);
    let highlight = hit
        .pointer("/highlight/name")
        .and_then(Value::as_array)
        .map(|snippets| {
            snippets
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_else(|| stored_name.clone().into_iter().collect());

    QueryMatch {
        id: hit
            .get("_id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        content_type: source
            .and_then(|s| s.get("contentType"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        name: stored_name,
        one_off: source
            .and_then(|s| s.get("oneOff"))
            .and_then(Value::as_bool)
            .unwrap_or(false),
        score: hit.get("_score").and_then(Value::as_f64),
        highlight,
    }
}
