use serde::{Deserialize, Serialize};
use tracing::info;

use crate::normalise::NormaliserMode;

/// Basic-auth credentials for the search service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchAuth {
    pub username: String,
    pub password: String,
}

/// Connection settings for the search service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Base URL of the service, e.g. `http://localhost:9200`.
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<SearchAuth>,
}

/// Fully merged runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub search: SearchConfig,
    /// Fixed per deployment; switching it invalidates every stored payload
    /// for comparison purposes.
    pub normaliser: NormaliserMode,
}

impl Settings {
    pub fn trace_loaded(&self) {
        info!(
            endpoint = %self.search.endpoint,
            authenticated = self.search.auth.is_some(),
            normaliser = ?self.normaliser,
            "Loaded Settings"
        );
    }
}
