#![doc = "site-search-sync: reconcile a CMS site's content tree with its search index."]

//! The diff engine ([`reconcile`]) is pure: given a site's content tree and
//! the index's current snapshot, it produces the minimal list of create,
//! update and delete operations. Everything effectful lives behind the
//! [`contract::SearchStore`] trait, implemented over HTTP by
//! [`client::HttpSearchStore`] and mocked in tests.

pub mod bulk;
pub mod cli;
pub mod client;
pub mod config;
pub mod contract;
pub mod key;
pub mod load_config;
pub mod normalise;
pub mod reconcile;
pub mod site;
pub mod synchronise;
pub mod tree;
