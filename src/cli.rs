use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::client::HttpSearchStore;
use crate::contract::{QueryParams, SearchStore, StoredSource};
use crate::load_config::load_config;
use crate::normalise::{display_name, Normaliser};
use crate::synchronise::synchronise;
use crate::tree::SiteTree;

/// CLI for site-search-sync: reconcile CMS site data with its search index.
#[derive(Parser)]
#[clap(
    name = "site-search-sync",
    version,
    about = "Reconcile a site's CMS content tree against its search index"
)]
pub struct Cli {
    /// Path to the YAML settings file
    #[clap(long, global = true, default_value = "config.yaml")]
    pub config: PathBuf,
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Diff a site's content tree against its index and apply the result
    Sync {
        /// Site whose index is the target
        #[clap(long)]
        site: String,
        /// Path to the site's CMS data snapshot (JSON)
        #[clap(long)]
        data: PathBuf,
    },
    /// Create the index for a site
    CreateIndex {
        #[clap(long)]
        site: String,
    },
    /// Delete the index for a site
    DeleteIndex {
        #[clap(long)]
        site: String,
    },
    /// List indices, optionally filtered by a pattern
    ListIndices {
        #[clap(long, default_value = "*")]
        pattern: String,
    },
    /// Free-text search within a site's index
    Query {
        #[clap(long)]
        site: String,
        /// Query text; wrapped into a prefix-phrase pattern automatically
        text: String,
        #[clap(long)]
        content_type: Option<String>,
        #[clap(long, default_value_t = 1)]
        page: u32,
        #[clap(long, default_value_t = 10)]
        page_size: u32,
    },
    /// Delete one document from a site's index
    DeleteDocument {
        #[clap(long)]
        site: String,
        #[clap(long)]
        id: String,
    },
    /// Delete every document of a content type from a site's index
    DeleteContentType {
        #[clap(long)]
        site: String,
        #[clap(long)]
        content_type: String,
    },
    /// Index a single document from a JSON record file
    IndexDocument {
        #[clap(long)]
        site: String,
        #[clap(long)]
        id: String,
        #[clap(long)]
        content_type: String,
        /// Mark the document as the single record of a one-off content type
        #[clap(long)]
        one_off: bool,
        /// Path to the record (JSON)
        #[clap(long)]
        data: PathBuf,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    let settings = load_config(&cli.config)?;
    let store = HttpSearchStore::new(&settings.search);
    let normaliser = Normaliser::new(settings.normaliser);

    match cli.command {
        Commands::Sync { site, data } => {
            let tree = read_site_tree(&data)?;
            println!("Synchronise starting...");
            let report = synchronise(&store, &site, &tree, &normaliser).await?;
            println!(
                "Synchronise complete: {} creates, {} updates, {} deletes.",
                report.creates, report.updates, report.deletes
            );
            for item in &report.item_results {
                if let Some(error) = item
                    .pointer("/index/error")
                    .or_else(|| item.pointer("/delete/error"))
                {
                    eprintln!("[WARN] bulk item failed: {error}");
                }
            }
        }
        Commands::CreateIndex { site } => {
            store.create_index(&site).await?;
            println!("Created index for site {site}");
        }
        Commands::DeleteIndex { site } => {
            store.delete_index(&site).await?;
            println!("Deleted index for site {site}");
        }
        Commands::ListIndices { pattern } => {
            let indices = store.list_indices(&pattern).await?;
            for info in indices {
                println!("{}\t{}", info.name, info.doc_count.as_deref().unwrap_or("-"));
            }
        }
        Commands::Query {
            site,
            text,
            content_type,
            page,
            page_size,
        } => {
            let params = QueryParams {
                text: &text,
                content_type: content_type.as_deref(),
                page,
                page_size,
            };
            let matches = store.query(&site, params).await?;
            println!("{}", serde_json::to_string_pretty(&matches)?);
        }
        Commands::DeleteDocument { site, id } => {
            store.delete_document(&site, &id).await?;
            println!("Deleted document {id}");
        }
        Commands::DeleteContentType { site, content_type } => {
            store.delete_by_content_type(&site, &content_type).await?;
            println!("Deleted all {content_type} documents");
        }
        Commands::IndexDocument {
            site,
            id,
            content_type,
            one_off,
            data,
        } => {
            let record = read_record(&data)?;
            let body = StoredSource {
                doc: normaliser.normalise(&record)?,
                name: display_name(&record),
                content_type,
                one_off,
            };
            store.index_document(&site, &id, &body).await?;
            println!("Indexed document {id}");
        }
    }

    Ok(())
}

fn read_site_tree(path: &Path) -> Result<SiteTree> {
    let content = fs_read(path)?;
    serde_json::from_str(&content).context("Site data is not a valid content tree")
}

fn read_record(path: &Path) -> Result<serde_json::Value> {
    let content = fs_read(path)?;
    serde_json::from_str(&content).context("Record file is not valid JSON")
}

fn fs_read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read data file {path:?}"))
}
