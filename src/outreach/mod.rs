//! Per-entity outreach state machine.
//!
//! For each prospect: normalize → (skip if already messaged) → navigate →
//! locate the send control through a fallback chain → open the composer →
//! type the personalized message with keystroke pacing → submit. Every
//! prospect that is processed gets exactly one report row; failures are
//! recorded with a short machine-readable reason and the run continues.
//! Only session death escapes the per-entity boundary.

pub mod locator;

use crate::error::{OutreachError, SessionError, StoreError};
use crate::identity::{canonicalize, SentSet};
use crate::pacing::{DelayRange, DelayScheduler};
use crate::session::{type_with_pacing, BrowserSession, ClickOutcome, Locate, Target};
use crate::store::{channels, EntityStore, Prospect};
use crate::template::MessageTemplate;
use chrono::{DateTime, Utc};
use locator::LocatorChain;
use std::fmt;
use std::time::Duration;

/// Page markers that mean the destination content is gone or gated.
const UNAVAILABLE_MARKERS: &[&str] = &[
    "This content isn't available",
    "This page isn't available",
];

/// The composer surface that opens after activating the send control.
const COMPOSER_SELECTOR: &str = "div[role='textbox'][contenteditable='true']";

/// Bounded wait for the composer to appear.
const COMPOSER_TIMEOUT: Duration = Duration::from_secs(5);

/// Short check for the "Press Enter to send" affordance after the primary
/// submit; its continued presence means the key press did not land.
const CONFIRM_TIMEOUT: Duration = Duration::from_secs(2);

/// Machine-readable failure reasons written to the report's error column.
pub mod reason {
    pub const ALREADY_MESSAGED: &str = "already messaged";
    pub const NOT_ACCESSIBLE: &str = "profile/page not accessible";
    pub const CONTROL_NOT_FOUND: &str = "control not found";
    pub const CONTROL_STUCK: &str = "could not activate control";
    pub const COMPOSER_MISSING: &str = "composer not accessible";
    pub const SEND_FAILED: &str = "could not send";
}

/// Where an attempt was when it ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    NotStarted,
    Navigated,
    ControlLocated,
    Composed,
    Sent,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::NotStarted => "not_started",
            Stage::Navigated => "navigated",
            Stage::ControlLocated => "control_located",
            Stage::Composed => "composed",
            Stage::Sent => "sent",
        };
        f.write_str(s)
    }
}

/// Terminal classification of one processed prospect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutreachStatus {
    Success,
    Failed,
    Skipped,
}

impl OutreachStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutreachStatus::Success => "SUCCESS",
            OutreachStatus::Failed => "FAILED",
            OutreachStatus::Skipped => "SKIPPED",
        }
    }
}

/// One immutable outcome row, created when outreach for a prospect concludes.
#[derive(Debug, Clone)]
pub struct OutreachRecord {
    pub prospect: Prospect,
    pub status: OutreachStatus,
    pub reason: Option<&'static str>,
    pub timestamp: DateTime<Utc>,
}

impl OutreachRecord {
    fn row(&self) -> Vec<String> {
        vec![
            self.prospect.name.clone(),
            self.prospect.profile_url.clone(),
            self.prospect.group_name.clone(),
            self.prospect.group_url.clone(),
            self.status.as_str().to_string(),
            self.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            self.reason.unwrap_or("").to_string(),
        ]
    }
}

/// Counters returned by [`OutreachEngine::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutreachSummary {
    pub success_count: usize,
    pub failed_count: usize,
    pub skipped_count: usize,
}

impl OutreachSummary {
    pub fn processed(&self) -> usize {
        self.success_count + self.failed_count + self.skipped_count
    }
}

/// How one attempt ended, before it becomes a record.
enum AttemptError {
    /// Recoverable: record FAILED(reason) and continue with the next prospect.
    Entity { stage: Stage, reason: &'static str },
    /// Fatal: the session itself is unusable.
    Fatal(SessionError),
}

/// Runs the outreach workflow over a roster, strictly in input order.
pub struct OutreachEngine<'a> {
    session: &'a mut dyn BrowserSession,
    store: &'a mut EntityStore,
    sent: &'a mut SentSet,
    pacer: DelayScheduler,
    locators: LocatorChain,
    composer: Target,
}

impl<'a> OutreachEngine<'a> {
    pub fn new(
        session: &'a mut dyn BrowserSession,
        store: &'a mut EntityStore,
        sent: &'a mut SentSet,
        pacer: DelayScheduler,
    ) -> Self {
        Self {
            session,
            store,
            sent,
            pacer,
            locators: LocatorChain::message_control(),
            composer: Target::css(COMPOSER_SELECTOR),
        }
    }

    /// Replace the locator chain (platform layouts drift).
    pub fn with_locators(mut self, locators: LocatorChain) -> Self {
        self.locators = locators;
        self
    }

    /// Process prospects until the roster or the send budget is exhausted.
    ///
    /// `max_sends` bounds successful sends; once reached, remaining
    /// prospects are left untouched and unrecorded. `delay_range` is the
    /// caller-supplied pause after each successful send.
    pub async fn run(
        &mut self,
        prospects: &[Prospect],
        template: &MessageTemplate,
        max_sends: usize,
        delay_range: DelayRange,
    ) -> Result<OutreachSummary, OutreachError> {
        let mut summary = OutreachSummary::default();

        for prospect in prospects {
            if summary.success_count >= max_sends {
                tracing::info!(max_sends, "send budget exhausted, stopping");
                break;
            }

            let canonical_url = canonicalize(&prospect.profile_url);

            if self.sent.contains(&canonical_url) {
                tracing::info!(name = %prospect.name, "skipping, already messaged");
                summary.skipped_count += 1;
                self.record(prospect, OutreachStatus::Skipped, Some(reason::ALREADY_MESSAGED))
                    .map_err(OutreachError::Store)?;
                continue;
            }

            match self.attempt(prospect, &canonical_url, template).await {
                Ok(()) => {
                    self.sent.insert(canonical_url);
                    summary.success_count += 1;
                    self.record(prospect, OutreachStatus::Success, None)
                        .map_err(OutreachError::Store)?;
                    tracing::info!(name = %prospect.name, "message sent");
                    self.pacer.wait(delay_range).await;
                }
                Err(AttemptError::Entity { stage, reason }) => {
                    summary.failed_count += 1;
                    self.record(prospect, OutreachStatus::Failed, Some(reason))
                        .map_err(OutreachError::Store)?;
                    tracing::warn!(name = %prospect.name, %stage, reason, "outreach failed");
                }
                Err(AttemptError::Fatal(source)) => {
                    return Err(OutreachError::Session {
                        processed: summary.processed(),
                        source,
                    });
                }
            }
        }

        tracing::info!(
            success = summary.success_count,
            failed = summary.failed_count,
            skipped = summary.skipped_count,
            "outreach run complete"
        );
        Ok(summary)
    }

    /// The per-prospect state machine. Returns `Ok` only from the `Sent`
    /// terminal state.
    async fn attempt(
        &mut self,
        prospect: &Prospect,
        canonical_url: &str,
        template: &MessageTemplate,
    ) -> Result<(), AttemptError> {
        let mut stage = Stage::NotStarted;

        match self.session.navigate(canonical_url).await {
            Ok(()) => {}
            // A URL that will not load is this prospect's problem, not the run's.
            Err(SessionError::Navigation { .. }) => {
                return Err(AttemptError::Entity {
                    stage,
                    reason: reason::NOT_ACCESSIBLE,
                })
            }
            Err(e) => return Err(AttemptError::Fatal(e)),
        }
        stage = Stage::Navigated;
        self.pacer.entity().await;

        for marker in UNAVAILABLE_MARKERS {
            if self
                .session
                .page_contains(marker)
                .await
                .map_err(AttemptError::Fatal)?
            {
                return Err(AttemptError::Entity {
                    stage,
                    reason: reason::NOT_ACCESSIBLE,
                });
            }
        }

        let Some(control) = self
            .locators
            .locate(&mut *self.session)
            .await
            .map_err(AttemptError::Fatal)?
        else {
            return Err(AttemptError::Entity {
                stage,
                reason: reason::CONTROL_NOT_FOUND,
            });
        };
        let control = control.clone();
        stage = Stage::ControlLocated;

        self.activate(&control, stage).await?;
        self.pacer.action().await;

        match self
            .session
            .wait_clickable(&self.composer, COMPOSER_TIMEOUT)
            .await
            .map_err(AttemptError::Fatal)?
        {
            Locate::Found => {}
            Locate::NotFound => {
                return Err(AttemptError::Entity {
                    stage,
                    reason: reason::COMPOSER_MISSING,
                })
            }
        }

        let message = template.render(&prospect.name);
        type_with_pacing(&mut *self.session, &self.composer, &message, &mut self.pacer)
            .await
            .map_err(|e| composing_failure(e, stage))?;
        stage = Stage::Composed;
        self.pacer.action().await;

        self.submit(stage).await?;
        stage = Stage::Sent;
        tracing::debug!(name = %prospect.name, %stage, "state machine complete");
        Ok(())
    }

    /// Click the control with bounded overlay recovery: on interception,
    /// dismiss close affordances and retry exactly once.
    async fn activate(&mut self, control: &Target, stage: Stage) -> Result<(), AttemptError> {
        match self
            .session
            .click(control)
            .await
            .map_err(AttemptError::Fatal)?
        {
            ClickOutcome::Clicked => return Ok(()),
            ClickOutcome::Intercepted => {
                tracing::debug!("click intercepted, dismissing overlays");
            }
        }

        self.session
            .dismiss_overlays()
            .await
            .map_err(AttemptError::Fatal)?;
        self.pacer.action().await;

        match self
            .session
            .click(control)
            .await
            .map_err(AttemptError::Fatal)?
        {
            ClickOutcome::Clicked => Ok(()),
            ClickOutcome::Intercepted => Err(AttemptError::Entity {
                stage,
                reason: reason::CONTROL_STUCK,
            }),
        }
    }

    /// Submit the composed message: affirmative key first, then an explicit
    /// send-control click only if the confirmation affordance lingers.
    async fn submit(&mut self, stage: Stage) -> Result<(), AttemptError> {
        self.session
            .press_submit_key(&self.composer)
            .await
            .map_err(|e| composing_failure(e, stage))?;
        self.pacer.action().await;

        let confirm = Target::aria("Press Enter to send");
        if self
            .session
            .wait_clickable(&confirm, CONFIRM_TIMEOUT)
            .await
            .map_err(AttemptError::Fatal)?
            == Locate::Found
        {
            match self
                .session
                .click(&confirm)
                .await
                .map_err(AttemptError::Fatal)?
            {
                ClickOutcome::Clicked => {}
                ClickOutcome::Intercepted => {
                    return Err(AttemptError::Entity {
                        stage,
                        reason: reason::SEND_FAILED,
                    })
                }
            }
        }
        Ok(())
    }

    fn record(
        &mut self,
        prospect: &Prospect,
        status: OutreachStatus,
        reason: Option<&'static str>,
    ) -> Result<(), StoreError> {
        let record = OutreachRecord {
            prospect: prospect.clone(),
            status,
            reason,
            timestamp: Utc::now(),
        };
        self.store.append(&channels::OUTREACH_REPORT, &record.row())
    }
}

/// A composer that vanishes mid-typing or mid-submit is a send failure for
/// this one prospect; anything else is the session dying under us.
fn composing_failure(source: SessionError, stage: Stage) -> AttemptError {
    match source {
        SessionError::Script(_) => AttemptError::Entity {
            stage,
            reason: reason::SEND_FAILED,
        },
        other => AttemptError::Fatal(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_match_report_vocabulary() {
        assert_eq!(OutreachStatus::Success.as_str(), "SUCCESS");
        assert_eq!(OutreachStatus::Failed.as_str(), "FAILED");
        assert_eq!(OutreachStatus::Skipped.as_str(), "SKIPPED");
    }

    #[test]
    fn record_row_matches_report_field_order() {
        let record = OutreachRecord {
            prospect: Prospect {
                name: "Asha".to_string(),
                profile_url: "https://s/user/1?x=1".to_string(),
                group_name: "Physio Hub".to_string(),
                group_url: "https://s/groups/7".to_string(),
            },
            status: OutreachStatus::Failed,
            reason: Some(reason::CONTROL_NOT_FOUND),
            timestamp: Utc::now(),
        };
        let row = record.row();
        assert_eq!(row.len(), channels::OUTREACH_REPORT.fields.len());
        assert_eq!(row[0], "Asha");
        assert_eq!(row[4], "FAILED");
        assert_eq!(row[6], "control not found");
    }
}
