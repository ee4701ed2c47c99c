//! Outreach subcommand: message every prospect on a roster.

use crate::config::Settings;
use crate::identity::SentSet;
use crate::outreach::OutreachEngine;
use crate::pacing::{DelayRange, DelayScheduler};
use crate::store::{load_roster, EntityStore};
use crate::template::MessageTemplate;
use std::path::Path;
use tracing::warn;

pub async fn run(
    settings: &Settings,
    roster: &Path,
    template: MessageTemplate,
    max_sends: usize,
    delay: DelayRange,
) -> anyhow::Result<()> {
    let prospects = load_roster(roster)?;
    anyhow::ensure!(
        !prospects.is_empty(),
        "{} contains no prospects",
        roster.display()
    );
    if !template.has_placeholder() {
        warn!("template has no {{name}} placeholder; every prospect gets identical text");
    }

    let mut pacer = DelayScheduler::new(settings.pacing);
    let mut session = super::open_session(settings, &mut pacer).await?;
    let mut store = EntityStore::open(&settings.output_dir)?;
    let mut sent = SentSet::new();

    let mut engine = OutreachEngine::new(
        &mut session,
        &mut store,
        &mut sent,
        DelayScheduler::new(settings.pacing),
    );
    let summary = engine.run(&prospects, &template, max_sends, delay).await?;
    drop(engine);

    session.close().await?;
    println!("Outreach run complete:");
    println!("  sent:    {}", summary.success_count);
    println!("  failed:  {}", summary.failed_count);
    println!("  skipped: {}", summary.skipped_count);
    println!(
        "  report:  {}",
        store
            .path_for(&crate::store::channels::OUTREACH_REPORT)
            .display()
    );
    Ok(())
}
