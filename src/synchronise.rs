//! High-level pipeline: bring one site's search index in line with its
//! content tree.
//!
//! The steps, in order:
//!   - Ensure the site's index exists (an already-existing index is success)
//!   - Read the full (capped) index snapshot
//!   - Diff the snapshot against the tree ([`crate::reconcile::plan`])
//!   - Assemble and apply the bulk batch, skipped entirely when the plan is
//!     empty
//!
//! Callers must serialise runs per site: nothing here coordinates concurrent
//! writers against the same index.
//!
//! # Callable From
//! - Used by the CLI and the integration tests
//! - Expects a concrete (async) [`SearchStore`] implementation

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::bulk;
use crate::contract::{SearchError, SearchStore};
use crate::normalise::Normaliser;
use crate::reconcile::{self, Operation};
use crate::site::index_name_for_site;
use crate::tree::SiteTree;

/// Failure modes of a synchronisation run.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("search store call failed: {0}")]
    Store(#[from] SearchError),
    #[error("could not normalise source record: {0}")]
    Plan(#[from] serde_json::Error),
}

/// Outcome of one synchronisation run.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub creates: usize,
    pub updates: usize,
    pub deletes: usize,
    /// Per-item results from the bulk call, exactly as the service reported
    /// them. Empty when the plan was empty and no write was issued. Partial
    /// failures are not retried here; inspect and compensate upstream.
    pub item_results: Vec<Value>,
}

impl SyncReport {
    pub fn total_operations(&self) -> usize {
        self.creates + self.updates + self.deletes
    }
}

/// Create the site's index if it is missing. An index that already exists is
/// the expected steady state, not a failure.
pub async fn ensure_index<S>(store: &S, site: &str) -> Result<(), SyncError>
where
    S: SearchStore,
{
    match store.create_index(site).await {
        Ok(()) => {
            info!(site = %site, "[SYNC] created index");
            Ok(())
        }
        Err(SearchError::IndexAlreadyExists(_)) => Ok(()),
        Err(error) => {
            error!(site = %site, error = %error, "[SYNC][ERROR] could not ensure index");
            Err(error.into())
        }
    }
}

/// Full pipeline: ensure the index, read its snapshot, diff against the tree
/// and apply the resulting batch.
pub async fn synchronise<S>(
    store: &S,
    site: &str,
    tree: &SiteTree,
    normaliser: &Normaliser,
) -> Result<SyncReport, SyncError>
where
    S: SearchStore,
{
    info!(site = %site, "[SYNC] starting synchronisation");

    ensure_index(store, site).await?;

    let snapshot = store.read_snapshot(site).await?;
    info!(site = %site, indexed = snapshot.len(), "[SYNC] read index snapshot");

    let index_name = index_name_for_site(site);
    let operations = reconcile::plan(tree, &index_name, &snapshot, normaliser)?;

    let mut report = SyncReport::default();
    for operation in &operations {
        match operation {
            Operation::Create { .. } => report.creates += 1,
            Operation::Update { .. } => report.updates += 1,
            Operation::Delete { .. } => report.deletes += 1,
        }
    }

    if operations.is_empty() {
        info!(site = %site, "[SYNC] index already in sync, nothing to write");
        return Ok(report);
    }

    info!(
        site = %site,
        creates = report.creates,
        updates = report.updates,
        deletes = report.deletes,
        "[SYNC] applying bulk batch"
    );
    let actions = bulk::assemble(&operations)?;
    report.item_results = store.apply_batch(&actions).await?;
    debug!(items = report.item_results.len(), "[SYNC] bulk response received");

    Ok(report)
}
