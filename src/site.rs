//! Site-name handling.

/// Derive the search index name for a site.
///
/// Site names arrive with dots escaped as the two-character sequence `",1"`
/// (the originating system cannot store dots in its keys); the index name is
/// the unescaped form. This must run exactly once on every path that turns a
/// site name into an index name.
pub fn index_name_for_site(site: &str) -> String {
    site.replace(",1", ".")
}
