#![allow(dead_code)]

//! A scripted in-memory session for driving the engines in tests.

use async_trait::async_trait;
use prospector::error::SessionError;
use prospector::session::{BrowserSession, ClickOutcome, Locate, NodeSnapshot, Target};
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

/// Stable lookup key for a target.
pub fn key(target: &Target) -> String {
    format!("{target:?}")
}

/// Build a profile-link node the way the live DOM snapshot would.
pub fn profile_node(name: &str, href: &str) -> NodeSnapshot {
    NodeSnapshot {
        text: name.to_string(),
        href: Some(href.to_string()),
        attrs: HashMap::new(),
    }
}

/// Build a text-only node, the shape headings and count spans come in.
pub fn text_node(text: &str) -> NodeSnapshot {
    NodeSnapshot {
        text: text.to_string(),
        href: None,
        attrs: HashMap::new(),
    }
}

/// Scripted [`BrowserSession`]: queues of heights and node batches for the
/// collection loop, per-target clickability and click outcomes for the
/// outreach state machine, and an ordered log of every primitive invoked.
#[derive(Default)]
pub struct FakeSession {
    pub current: String,
    /// Rendered text per URL, consulted by `page_contains`.
    pub page_text: HashMap<String, String>,
    /// URLs whose navigation fails.
    pub unreachable: HashSet<String>,
    /// Targets that `wait_clickable` resolves immediately.
    pub clickable: HashSet<String>,
    /// Scripted click outcomes per target; default is `Clicked`.
    pub click_outcomes: HashMap<String, VecDeque<ClickOutcome>>,
    /// `content_height` readings; the last one repeats once exhausted.
    pub heights: VecDeque<u64>,
    last_height: u64,
    /// `query_nodes` results per call; empty once exhausted.
    pub node_batches: VecDeque<Vec<NodeSnapshot>>,
    /// When set, the first `query_nodes` call after the batches run out
    /// fails with this message.
    pub query_failure: Option<String>,
    /// Scroll scope currently in effect, mirrored from `set_scroll_root`.
    pub scroll_root: Option<String>,
    /// Ordered trace of primitives: `navigate:`, `scroll`, `wait:`, `click:`,
    /// `dismiss`, `submit`.
    pub log: Vec<String>,
    /// Every character typed, in order.
    pub typed: String,
}

impl FakeSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_heights(mut self, heights: &[u64]) -> Self {
        self.heights = heights.iter().copied().collect();
        self
    }

    pub fn push_batch(&mut self, nodes: Vec<NodeSnapshot>) {
        self.node_batches.push_back(nodes);
    }

    pub fn make_clickable(&mut self, target: &Target) {
        self.clickable.insert(key(target));
    }

    pub fn script_clicks(&mut self, target: &Target, outcomes: &[ClickOutcome]) {
        self.click_outcomes
            .insert(key(target), outcomes.iter().copied().collect());
    }

    pub fn set_page_text(&mut self, url: &str, text: &str) {
        self.page_text.insert(url.to_string(), text.to_string());
    }

    pub fn count_log(&self, prefix: &str) -> usize {
        self.log.iter().filter(|e| e.starts_with(prefix)).count()
    }
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
        self.log.push(format!("navigate:{url}"));
        if self.unreachable.contains(url) {
            return Err(SessionError::Navigation {
                url: url.to_string(),
                message: "unreachable".to_string(),
            });
        }
        self.current = url.to_string();
        Ok(())
    }

    async fn current_url(&mut self) -> Result<String, SessionError> {
        Ok(self.current.clone())
    }

    async fn page_contains(&mut self, needle: &str) -> Result<bool, SessionError> {
        Ok(self
            .page_text
            .get(&self.current)
            .is_some_and(|text| text.contains(needle)))
    }

    async fn scroll_to_bottom(&mut self) -> Result<(), SessionError> {
        self.log.push("scroll".to_string());
        Ok(())
    }

    async fn content_height(&mut self) -> Result<u64, SessionError> {
        if let Some(h) = self.heights.pop_front() {
            self.last_height = h;
        }
        Ok(self.last_height)
    }

    async fn query_nodes(&mut self, selector: &str) -> Result<Vec<NodeSnapshot>, SessionError> {
        self.log.push(format!("query:{selector}"));
        if let Some(batch) = self.node_batches.pop_front() {
            return Ok(batch);
        }
        if let Some(message) = self.query_failure.take() {
            return Err(SessionError::Script(message));
        }
        Ok(Vec::new())
    }

    fn set_scroll_root(&mut self, selector: Option<String>) {
        self.log.push(format!(
            "scroll_root:{}",
            selector.as_deref().unwrap_or("document")
        ));
        self.scroll_root = selector;
    }

    async fn wait_clickable(
        &mut self,
        target: &Target,
        _timeout: Duration,
    ) -> Result<Locate, SessionError> {
        let key = key(target);
        self.log.push(format!("wait:{key}"));
        Ok(if self.clickable.contains(&key) {
            Locate::Found
        } else {
            Locate::NotFound
        })
    }

    async fn click(&mut self, target: &Target) -> Result<ClickOutcome, SessionError> {
        let key = key(target);
        self.log.push(format!("click:{key}"));
        Ok(self
            .click_outcomes
            .get_mut(&key)
            .and_then(VecDeque::pop_front)
            .unwrap_or(ClickOutcome::Clicked))
    }

    async fn dismiss_overlays(&mut self) -> Result<usize, SessionError> {
        self.log.push("dismiss".to_string());
        Ok(1)
    }

    async fn type_char(&mut self, _target: &Target, ch: char) -> Result<(), SessionError> {
        self.typed.push(ch);
        Ok(())
    }

    async fn press_submit_key(&mut self, _target: &Target) -> Result<(), SessionError> {
        self.log.push("submit".to_string());
        Ok(())
    }
}
