//! Locator fallback chain for the send-message control.
//!
//! Profile layouts vary wildly, so the control is hunted with an ordered
//! list of independent strategies. Each gets a bounded wait; the first one
//! that resolves to a visible control wins. Exhausting the chain is a typed
//! outcome, not an error.

use crate::session::{BrowserSession, Locate, Target};
use std::time::Duration;

/// How long each individual strategy may wait.
const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(5);

/// An ordered set of strategies for finding one control.
pub struct LocatorChain {
    strategies: Vec<Target>,
    attempt_timeout: Duration,
}

impl LocatorChain {
    pub fn new(strategies: Vec<Target>, attempt_timeout: Duration) -> Self {
        Self {
            strategies,
            attempt_timeout,
        }
    }

    /// The send-message control strategies, in preference order: a direct
    /// messages link, a labeled clickable, then aria-label variants.
    pub fn message_control() -> Self {
        Self::new(
            vec![
                Target::css("a[href*='/messages/']"),
                Target::labeled("Message"),
                Target::aria("Message"),
                Target::aria("Send message"),
            ],
            DEFAULT_ATTEMPT_TIMEOUT,
        )
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Try each strategy in order with a bounded wait; the first one that
    /// yields a clickable control wins. `None` means every strategy
    /// exhausted its wait.
    pub async fn locate(
        &self,
        session: &mut dyn BrowserSession,
    ) -> Result<Option<&Target>, crate::error::SessionError> {
        for (index, target) in self.strategies.iter().enumerate() {
            match session.wait_clickable(target, self.attempt_timeout).await? {
                Locate::Found => {
                    tracing::debug!(strategy = index, ?target, "control located");
                    return Ok(Some(target));
                }
                Locate::NotFound => continue,
            }
        }
        Ok(None)
    }
}
