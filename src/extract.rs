//! Entity extraction over visible DOM nodes.
//!
//! Extractors turn [`NodeSnapshot`]s from the live feed into [`Entity`]
//! values. A malformed node (no name, no link) yields `None` and is dropped
//! silently; a single bad node never aborts a collection iteration.

use crate::identity::canonicalize;
use crate::session::NodeSnapshot;
use regex::Regex;
use std::collections::BTreeMap;

/// One discovered profile, page, or group.
///
/// Created at extraction time, persisted immediately, never mutated.
/// `canonical_url` (query string stripped) is the identity key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    pub display_name: String,
    pub canonical_url: String,
    /// Where this entity was found: a keyword, a page name, a group name.
    pub source_context: String,
    /// Channel-specific extras (keyword, counts, about text, ...).
    pub attributes: BTreeMap<String, String>,
}

impl Entity {
    /// Attribute lookup with missing keys rendered as empty.
    pub fn attr(&self, key: &str) -> &str {
        self.attributes.get(key).map(String::as_str).unwrap_or("")
    }
}

/// Turns feed DOM nodes into entities for one collection routine.
pub trait EntityExtractor: Send + Sync {
    /// CSS selector for candidate nodes in the feed.
    fn selector(&self) -> &str;

    /// Convert one node into an entity; `None` drops a malformed node.
    fn extract(&self, node: &NodeSnapshot) -> Option<Entity>;
}

/// Followers of a page, or members of a group: profile links in a people list.
pub struct ProfileLinkExtractor {
    /// Display name of the page, group, or account being walked.
    pub source_name: String,
    /// Canonical URL of the page, group, or account being walked.
    pub source_url: String,
    /// Extra attributes stamped on every extracted entity (e.g. group
    /// passthrough columns for the outreach report).
    pub extra: BTreeMap<String, String>,
    selector: &'static str,
}

impl ProfileLinkExtractor {
    pub fn new(source_name: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            source_url: source_url.into(),
            extra: BTreeMap::new(),
            selector: "a[href*='/user/'], a[href*='profile.php']",
        }
    }

    pub fn with_extra(mut self, key: &str, value: impl Into<String>) -> Self {
        self.extra.insert(key.to_string(), value.into());
        self
    }

    /// Override the node selector; people lists differ per surface (a
    /// follower page, a member list, a follower dialog).
    pub fn with_selector(mut self, selector: &'static str) -> Self {
        self.selector = selector;
        self
    }
}

impl EntityExtractor for ProfileLinkExtractor {
    fn selector(&self) -> &str {
        self.selector
    }

    fn extract(&self, node: &NodeSnapshot) -> Option<Entity> {
        let name = node.text.trim();
        let href = node.href.as_deref()?;
        if name.is_empty() {
            return None;
        }

        let mut attributes = self.extra.clone();
        attributes.insert("source_url".to_string(), self.source_url.clone());

        Some(Entity {
            display_name: name.to_string(),
            canonical_url: canonicalize(href),
            source_context: self.source_name.clone(),
            attributes,
        })
    }
}

/// Page or group hits in a keyword search feed.
pub struct SearchHitExtractor {
    pub keyword: String,
    /// URL substrings a hit must contain (e.g. `/pages/`, `/groups/`).
    pub accept: &'static [&'static str],
    selector: &'static str,
}

impl SearchHitExtractor {
    pub fn pages(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            accept: &["/pages/", "/groups/"],
            selector: "a[href*='/pages/'], a[href*='/groups/']",
        }
    }

    pub fn groups(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            accept: &["/groups/"],
            selector: "a[href*='/groups/']",
        }
    }
}

impl EntityExtractor for SearchHitExtractor {
    fn selector(&self) -> &str {
        self.selector
    }

    fn extract(&self, node: &NodeSnapshot) -> Option<Entity> {
        let href = node.href.as_deref()?;
        // Category tiles and nested search links look like hits but are not.
        if href.contains("category") || href.contains("search") {
            return None;
        }
        if !self.accept.iter().any(|needle| href.contains(needle)) {
            return None;
        }

        let name = node.text.trim();
        let display_name = if name.is_empty() {
            // The feed sometimes renders the link before its label; the
            // detail pass fills the real name in later.
            "Unknown".to_string()
        } else {
            name.to_string()
        };

        let mut attributes = BTreeMap::new();
        attributes.insert("keyword".to_string(), self.keyword.clone());

        Some(Entity {
            display_name,
            canonical_url: canonicalize(href),
            source_context: self.keyword.clone(),
            attributes,
        })
    }
}

/// Parse a compact count like `1,234`, `5.6K`, or `2M`.
///
/// Unparseable input yields zero, matching how the feeds render absent
/// counts.
pub fn parse_compact_count(text: &str) -> u64 {
    let cleaned = text.replace(',', "").trim().to_lowercase();
    if let Some(stripped) = cleaned.strip_suffix('k') {
        return stripped
            .parse::<f64>()
            .map(|n| (n * 1_000.0) as u64)
            .unwrap_or(0);
    }
    if let Some(stripped) = cleaned.strip_suffix('m') {
        return stripped
            .parse::<f64>()
            .map(|n| (n * 1_000_000.0) as u64)
            .unwrap_or(0);
    }
    cleaned.parse::<u64>().unwrap_or(0)
}

/// Pull a count out of surrounding prose, e.g. `"12K members"` with noun
/// `"members"` yields 12000.
pub fn find_count(text: &str, noun: &str) -> Option<u64> {
    let pattern = format!(r"([\d,\.]+[KkMm]?)\s+{}", regex::escape(noun));
    let re = Regex::new(&pattern).ok()?;
    re.captures(text)
        .map(|caps| parse_compact_count(&caps[1]))
}

/// The first keyword appearing in an entity's name or about/bio text.
pub fn matching_keyword<'a>(keywords: &'a [String], name: &str, about: &str) -> Option<&'a str> {
    let name = name.to_lowercase();
    let about = about.to_lowercase();
    keywords
        .iter()
        .find(|k| {
            let k = k.to_lowercase();
            name.contains(&k) || about.contains(&k)
        })
        .map(String::as_str)
}

/// Whether a page qualifies: any keyword appears in its name or about text.
pub fn matches_keywords(keywords: &[String], name: &str, about: &str) -> bool {
    matching_keyword(keywords, name, about).is_some()
}

/// Longest free-text excerpt kept in a record field.
pub const EXCERPT_CHARS: usize = 500;

/// Truncate free text to a bounded number of characters (not bytes).
pub fn excerpt(text: &str) -> String {
    text.chars().take(EXCERPT_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn node(text: &str, href: Option<&str>) -> NodeSnapshot {
        NodeSnapshot {
            text: text.to_string(),
            href: href.map(String::from),
            attrs: HashMap::new(),
        }
    }

    #[test]
    fn profile_link_extracts_and_canonicalizes() {
        let ex = ProfileLinkExtractor::new("Relief Clinic", "https://s/pages/relief");
        let entity = ex
            .extract(&node("Asha Khan", Some("https://s/user/9?ref=pb")))
            .unwrap();
        assert_eq!(entity.display_name, "Asha Khan");
        assert_eq!(entity.canonical_url, "https://s/user/9");
        assert_eq!(entity.source_context, "Relief Clinic");
        assert_eq!(entity.attr("source_url"), "https://s/pages/relief");
    }

    #[test]
    fn malformed_nodes_are_dropped() {
        let ex = ProfileLinkExtractor::new("src", "https://s/p");
        assert!(ex.extract(&node("", Some("https://s/user/9"))).is_none());
        assert!(ex.extract(&node("Named", None)).is_none());
    }

    #[test]
    fn search_hits_skip_category_and_search_links() {
        let ex = SearchHitExtractor::groups("physio lahore");
        assert!(ex
            .extract(&node("Physio Lahore", Some("https://s/groups/category/x")))
            .is_none());
        assert!(ex
            .extract(&node("More", Some("https://s/search/groups/?q=x")))
            .is_none());

        let hit = ex
            .extract(&node("Physio Lahore", Some("https://s/groups/77?ref=ss")))
            .unwrap();
        assert_eq!(hit.canonical_url, "https://s/groups/77");
        assert_eq!(hit.attr("keyword"), "physio lahore");
    }

    #[test]
    fn unnamed_hit_gets_placeholder_name() {
        let ex = SearchHitExtractor::groups("k");
        let hit = ex.extract(&node("", Some("https://s/groups/5"))).unwrap();
        assert_eq!(hit.display_name, "Unknown");
    }

    #[test]
    fn compact_counts() {
        assert_eq!(parse_compact_count("1,234"), 1_234);
        assert_eq!(parse_compact_count("5.6K"), 5_600);
        assert_eq!(parse_compact_count("2M"), 2_000_000);
        assert_eq!(parse_compact_count("17"), 17);
        assert_eq!(parse_compact_count("lots"), 0);
    }

    #[test]
    fn counts_in_prose() {
        assert_eq!(find_count("12K members · public", "members"), Some(12_000));
        assert_eq!(
            find_count("4,205 people like this", "people like this"),
            Some(4_205)
        );
        assert_eq!(find_count("no numbers here", "members"), None);
    }

    #[test]
    fn keyword_match_covers_name_and_about() {
        let keywords = vec!["physio".to_string(), "spine".to_string()];
        assert!(matches_keywords(&keywords, "City Physio Center", ""));
        assert!(matches_keywords(&keywords, "Wellness Hub", "spine care since 2008"));
        assert!(!matches_keywords(&keywords, "Bakery", "fresh bread"));
        assert_eq!(
            matching_keyword(&keywords, "Wellness Hub", "spine care"),
            Some("spine")
        );
    }

    #[test]
    fn custom_selector_overrides_the_default() {
        let ex = ProfileLinkExtractor::new("hub", "https://s/hub")
            .with_selector("div[role='dialog'] a[href]");
        assert_eq!(ex.selector(), "div[role='dialog'] a[href]");
    }

    #[test]
    fn excerpt_is_char_safe() {
        let long = "é".repeat(600);
        assert_eq!(excerpt(&long).chars().count(), EXCERPT_CHARS);
        assert_eq!(excerpt("short"), "short");
    }
}
