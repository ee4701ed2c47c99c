//! Randomized human-mimicking pauses.
//!
//! Every wait in the system goes through [`DelayScheduler`], which samples
//! uniformly from an inclusive millisecond window. Four independent
//! granularities (keystroke, action, entity, page) are carried in a
//! [`PacingProfile`] so each can be tuned without touching the others.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

/// An inclusive pause window in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    pub const ZERO: DelayRange = DelayRange::new(0, 0);

    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    /// Build a range from whole seconds, the unit the CLI exposes.
    pub const fn from_secs(min: u64, max: u64) -> Self {
        Self::new(min * 1_000, max * 1_000)
    }
}

/// Pause windows for the four interaction granularities.
#[derive(Debug, Clone, Copy)]
pub struct PacingProfile {
    /// Between individual typed characters.
    pub keystroke: DelayRange,
    /// Between clicks and other discrete UI actions.
    pub action: DelayRange,
    /// After navigating to a new entity.
    pub entity: DelayRange,
    /// After a scroll step or between feed pages.
    pub page: DelayRange,
}

impl Default for PacingProfile {
    fn default() -> Self {
        Self {
            keystroke: DelayRange::new(50, 200),
            action: DelayRange::new(1_000, 2_000),
            entity: DelayRange::new(3_000, 5_000),
            page: DelayRange::new(2_000, 4_000),
        }
    }
}

impl PacingProfile {
    /// A zero-wait profile for tests and dry runs.
    pub fn instant() -> Self {
        Self {
            keystroke: DelayRange::ZERO,
            action: DelayRange::ZERO,
            entity: DelayRange::ZERO,
            page: DelayRange::ZERO,
        }
    }
}

/// Samples randomized pause durations and sleeps the single control task.
pub struct DelayScheduler {
    rng: StdRng,
    profile: PacingProfile,
}

impl DelayScheduler {
    pub fn new(profile: PacingProfile) -> Self {
        Self {
            rng: StdRng::from_entropy(),
            profile,
        }
    }

    /// Deterministic scheduler for tests.
    pub fn seeded(profile: PacingProfile, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            profile,
        }
    }

    pub fn profile(&self) -> &PacingProfile {
        &self.profile
    }

    /// Sample a duration uniformly from `[min, max]`.
    pub fn sample(&mut self, range: DelayRange) -> Duration {
        if range.max_ms <= range.min_ms {
            return Duration::from_millis(range.min_ms);
        }
        Duration::from_millis(self.rng.gen_range(range.min_ms..=range.max_ms))
    }

    /// Block the control task for a pause sampled from `range`.
    pub async fn wait(&mut self, range: DelayRange) {
        let pause = self.sample(range);
        if !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }
    }

    pub async fn keystroke(&mut self) {
        let range = self.profile.keystroke;
        self.wait(range).await;
    }

    pub async fn action(&mut self) {
        let range = self.profile.action;
        self.wait(range).await;
    }

    pub async fn entity(&mut self) {
        let range = self.profile.entity;
        self.wait(range).await;
    }

    pub async fn page(&mut self) {
        let range = self.profile.page;
        self.wait(range).await;
    }
}
