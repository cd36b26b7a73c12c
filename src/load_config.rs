use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{error, info};

use crate::config::{SearchAuth, SearchConfig, Settings};
use crate::normalise::NormaliserMode;

#[derive(Deserialize)]
struct StaticConfig {
    search: SearchSection,
    #[serde(default)]
    normaliser: Option<String>,
}

#[derive(Deserialize)]
struct SearchSection {
    endpoint: String,
}

/// Loads the static YAML settings file (no secrets) and merges credentials
/// from the environment (`SEARCH_USERNAME`/`SEARCH_PASSWORD`). Returns fully
/// merged [`Settings`] or an error.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let content = fs::read_to_string(path_ref)
        .with_context(|| format!("Failed to read config file {path_ref:?}"))?;

    let static_conf: StaticConfig = match serde_yaml::from_str(&content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    let normaliser = match static_conf.normaliser.as_deref() {
        None | Some("OpaqueStringify") => NormaliserMode::OpaqueStringify,
        Some("Flattened") => NormaliserMode::Flattened,
        Some(other) => {
            error!(mode = %other, "Unsupported normaliser mode in config");
            anyhow::bail!("Unsupported normaliser mode: {}", other);
        }
    };

    let auth = match std::env::var("SEARCH_USERNAME") {
        Ok(username) => {
            let password = std::env::var("SEARCH_PASSWORD")
                .context("SEARCH_PASSWORD must be set when SEARCH_USERNAME is")?;
            info!(username = %username, "Using basic auth credentials from environment");
            Some(SearchAuth { username, password })
        }
        Err(_) => None,
    };

    let settings = Settings {
        search: SearchConfig {
            endpoint: static_conf.search.endpoint,
            auth,
        },
        normaliser,
    };
    settings.trace_loaded();
    Ok(settings)
}
