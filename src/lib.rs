//! Prospector: browser-driven social collection and outreach runtime.
//!
//! Two engines share one browser session capability layer:
//! [`collect::CollectionEngine`] walks infinite-scroll feeds and checkpoints
//! every newly discovered entity into append-only CSV channels, and
//! [`outreach::OutreachEngine`] replays a collected roster through a
//! navigate → locate → compose → send state machine with locator fallback,
//! duplicate suppression, and human-mimicking pacing.

pub mod cli;
pub mod collect;
pub mod config;
pub mod error;
pub mod extract;
pub mod identity;
pub mod outreach;
pub mod pacing;
pub mod session;
pub mod store;
pub mod template;
