//! Scroll-pagination collection engine.
//!
//! Drives scroll → pause → measure → extract → dedup → persist cycles over
//! an infinite-scroll feed until a target count is reached or the content
//! height stops growing. Every newly discovered entity is checkpointed into
//! its channel the moment it is seen; interrupting a run loses nothing
//! already found.

use crate::error::{CollectError, SessionError};
use crate::extract::{Entity, EntityExtractor};
use crate::pacing::DelayScheduler;
use crate::session::BrowserSession;
use crate::store::{ChannelSpec, EntityStore};
use std::collections::HashSet;

/// Canonical URLs seen so far in one engine run, plus the running count.
///
/// The count never decreases: entities are only ever added.
#[derive(Debug, Default)]
pub struct CollectionSession {
    seen: HashSet<String>,
    collected_count: usize,
}

impl CollectionSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a canonical URL; `true` if it was new.
    fn admit(&mut self, canonical_url: &str) -> bool {
        if self.seen.insert(canonical_url.to_string()) {
            self.collected_count += 1;
            true
        } else {
            false
        }
    }

    pub fn collected_count(&self) -> usize {
        self.collected_count
    }
}

/// Walks one infinite-scroll feed.
pub struct CollectionEngine<'a> {
    session: &'a mut dyn BrowserSession,
    store: &'a mut EntityStore,
    pacer: &'a mut DelayScheduler,
}

impl<'a> CollectionEngine<'a> {
    pub fn new(
        session: &'a mut dyn BrowserSession,
        store: &'a mut EntityStore,
        pacer: &'a mut DelayScheduler,
    ) -> Self {
        Self {
            session,
            store,
            pacer,
        }
    }

    /// Collect entities from the current feed until `target_count` entities
    /// have been gathered or the content height has been unchanged for
    /// `max_stalls` consecutive iterations.
    ///
    /// Stall policy: the stall counter resets on *any* height change, even
    /// when no new entities were extracted that iteration. A feed that
    /// reflows without adding content therefore keeps the loop alive; a
    /// fully loaded container that never grows ends the loop after exactly
    /// `max_stalls` iterations. Hitting the stall ceiling before the target
    /// is an accepted termination, not an error.
    pub async fn collect(
        &mut self,
        extractor: &dyn EntityExtractor,
        channel: &ChannelSpec,
        target_count: usize,
        max_stalls: u32,
    ) -> Result<Vec<Entity>, CollectError> {
        let mut session_state = CollectionSession::new();
        let mut collected: Vec<Entity> = Vec::new();
        let mut stall_count = 0u32;

        // Baseline before the first scroll, so a container that is already
        // fully loaded registers as stalled from iteration one.
        let mut prev_height = self
            .session
            .content_height()
            .await
            .map_err(|e| fatal(collected.len(), e))?;

        while collected.len() < target_count && stall_count < max_stalls {
            self.session
                .scroll_to_bottom()
                .await
                .map_err(|e| fatal(collected.len(), e))?;
            self.pacer.page().await;

            let height = self
                .session
                .content_height()
                .await
                .map_err(|e| fatal(collected.len(), e))?;

            let nodes = self
                .session
                .query_nodes(extractor.selector())
                .await
                .map_err(|e| fatal(collected.len(), e))?;
            let mut new_this_iteration = 0usize;
            for node in &nodes {
                let Some(entity) = extractor.extract(node) else {
                    continue;
                };
                if !session_state.admit(&entity.canonical_url) {
                    continue;
                }
                self.store.append_entity(channel, &entity)?;
                tracing::debug!(
                    name = %entity.display_name,
                    url = %entity.canonical_url,
                    "collected entity"
                );
                collected.push(entity);
                new_this_iteration += 1;
            }

            if height == prev_height {
                stall_count += 1;
            } else {
                stall_count = 0;
            }
            prev_height = height;

            tracing::debug!(
                height,
                new = new_this_iteration,
                total = collected.len(),
                stall_count,
                "scroll iteration"
            );
        }

        tracing::info!(
            collected = collected.len(),
            target = target_count,
            stall_count,
            channel = channel.name,
            "collection finished"
        );
        debug_assert_eq!(session_state.collected_count(), collected.len());
        Ok(collected)
    }
}

fn fatal(collected: usize, source: SessionError) -> CollectError {
    CollectError::Container { collected, source }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_session_count_is_monotonic() {
        let mut s = CollectionSession::new();
        assert!(s.admit("https://s/1"));
        assert!(!s.admit("https://s/1"));
        assert!(s.admit("https://s/2"));
        assert_eq!(s.collected_count(), 2);
    }
}
