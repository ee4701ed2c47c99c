//! Canonical URL identity and duplicate suppression.
//!
//! Profile, page, and group URLs arrive littered with tracking query
//! parameters (`?ref=search`, `?__tn__=...`). The canonical form, query
//! string and fragment stripped, is the sole identity key everywhere:
//! collection dedup, the sent-set, and report rows.

use std::collections::HashSet;
use url::Url;

/// Compute the canonical form of a raw URL.
///
/// Two raw URLs that differ only in query string or fragment collapse to
/// the same canonical URL. Input that does not parse as an absolute URL is
/// truncated at the first `?` or `#` instead.
pub fn canonicalize(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut url) => {
            url.set_query(None);
            url.set_fragment(None);
            url.to_string()
        }
        Err(_) => raw
            .split(['?', '#'])
            .next()
            .unwrap_or(raw)
            .to_string(),
    }
}

/// Canonical URLs already messaged in this process lifetime.
///
/// Consulted before any network action for an entity; grows only when a
/// send actually succeeds. Shared across engine instances so that a second
/// run in the same process never re-contacts anyone.
#[derive(Debug, Default)]
pub struct SentSet {
    inner: HashSet<String>,
}

impl SentSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, canonical_url: &str) -> bool {
        self.inner.contains(canonical_url)
    }

    /// Record a successful send. Returns `false` if the URL was already present.
    pub fn insert(&mut self, canonical_url: impl Into<String>) -> bool {
        self.inner.insert(canonical_url.into())
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_variants_collapse() {
        assert_eq!(
            canonicalize("https://x/y?a=1"),
            canonicalize("https://x/y?b=2")
        );
    }

    #[test]
    fn fragment_is_stripped() {
        assert_eq!(canonicalize("https://x/y#section"), "https://x/y");
    }

    #[test]
    fn plain_url_is_unchanged() {
        assert_eq!(
            canonicalize("https://example.com/profile.php"),
            "https://example.com/profile.php"
        );
    }

    #[test]
    fn unparseable_input_splits_at_query() {
        assert_eq!(canonicalize("/groups/123?ref=search"), "/groups/123");
    }

    #[test]
    fn sent_set_grows_only_on_new_urls() {
        let mut sent = SentSet::new();
        assert!(sent.insert("https://s/1"));
        assert!(!sent.insert("https://s/1"));
        assert!(sent.contains("https://s/1"));
        assert_eq!(sent.len(), 1);
    }
}
