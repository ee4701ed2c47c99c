//! Browser session capability layer.
//!
//! Engines never talk to a concrete browser. They consume [`BrowserSession`],
//! an abstract handle over the primitives the workflows need: navigate,
//! scroll, query, click, type, bounded waits, and overlay dismissal. The
//! production implementation is [`chromium::ChromiumSession`]; tests script
//! fakes against the same trait.

pub mod chromium;
pub mod login;

use crate::error::SessionError;
use crate::pacing::DelayScheduler;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// A snapshot of one visible DOM node: everything extraction needs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeSnapshot {
    /// Whitespace-normalized text content.
    pub text: String,
    /// Absolutized `href`, when the node is a link.
    pub href: Option<String>,
    /// Raw element attributes.
    pub attrs: HashMap<String, String>,
}

/// One strategy for finding an interactive control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A CSS selector.
    Css(String),
    /// A clickable element (`a`, `button`, `[role=button]`) whose text
    /// contains the label, case-insensitively.
    LabeledControl(String),
    /// An element whose `aria-label` contains the label, case-insensitively.
    AriaLabel(String),
}

impl Target {
    pub fn css(selector: impl Into<String>) -> Self {
        Target::Css(selector.into())
    }

    pub fn labeled(label: impl Into<String>) -> Self {
        Target::LabeledControl(label.into())
    }

    pub fn aria(label: impl Into<String>) -> Self {
        Target::AriaLabel(label.into())
    }
}

/// Typed outcome of a bounded locate attempt. Never signalled by throwing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locate {
    Found,
    NotFound,
}

/// Outcome of a click attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    Clicked,
    /// Another element (an overlay, a dialog) swallowed the click.
    Intercepted,
}

/// The browser primitives both engines are built on.
///
/// All waits are bounded and local; a timeout surfaces as a typed outcome
/// (`Locate::NotFound`, `ClickOutcome::Intercepted`), never as an error.
/// Errors mean the primitive itself failed and the caller decides whether
/// that is fatal.
#[async_trait]
pub trait BrowserSession: Send {
    /// Navigate the tab to a URL and wait for the load to settle.
    async fn navigate(&mut self, url: &str) -> Result<(), SessionError>;

    /// The tab's current URL.
    async fn current_url(&mut self) -> Result<String, SessionError>;

    /// Whether the rendered page contains the literal text.
    async fn page_contains(&mut self, needle: &str) -> Result<bool, SessionError>;

    /// Scroll to the bottom of the scrollable content.
    async fn scroll_to_bottom(&mut self) -> Result<(), SessionError>;

    /// Current scrollable content height in CSS pixels.
    async fn content_height(&mut self) -> Result<u64, SessionError>;

    /// Scope the scroll and height primitives to a container (a modal list,
    /// for example) instead of the document. `None` restores document
    /// scrolling. A set root that matches nothing makes those primitives
    /// fail, which collection treats as a dead container.
    fn set_scroll_root(&mut self, selector: Option<String>);

    /// Snapshot every node currently matching the CSS selector.
    async fn query_nodes(&mut self, selector: &str) -> Result<Vec<NodeSnapshot>, SessionError>;

    /// Bounded wait for a target to become present and visible.
    async fn wait_clickable(
        &mut self,
        target: &Target,
        timeout: Duration,
    ) -> Result<Locate, SessionError>;

    /// Click a target, reporting interception instead of erroring on it.
    async fn click(&mut self, target: &Target) -> Result<ClickOutcome, SessionError>;

    /// Click every visible close affordance. Returns how many were dismissed.
    async fn dismiss_overlays(&mut self) -> Result<usize, SessionError>;

    /// Focus the target and type a single character into it.
    async fn type_char(&mut self, target: &Target, ch: char) -> Result<(), SessionError>;

    /// Press the affirmative key (Enter) inside the target.
    async fn press_submit_key(&mut self, target: &Target) -> Result<(), SessionError>;
}

/// Type text character-by-character with keystroke pacing.
///
/// The one human-typing primitive in the codebase; the login flow and the
/// outreach composer both go through it.
pub async fn type_with_pacing(
    session: &mut dyn BrowserSession,
    target: &Target,
    text: &str,
    pacer: &mut DelayScheduler,
) -> Result<(), SessionError> {
    for ch in text.chars() {
        session.type_char(target, ch).await?;
        pacer.keystroke().await;
    }
    Ok(())
}
