//! CLI command implementations.

pub mod collect_cmd;
pub mod instagram_cmd;
pub mod outreach_cmd;

use crate::config::Settings;
use crate::pacing::DelayScheduler;
use crate::session::chromium::ChromiumSession;
use crate::session::login::{self, Credentials};
use anyhow::Context;

/// Launch a browser logged in to Facebook; the Facebook subcommands start here.
pub(crate) async fn open_session(
    settings: &Settings,
    pacer: &mut DelayScheduler,
) -> anyhow::Result<ChromiumSession> {
    let credentials = Credentials::from_env()
        .context("set PROSPECTOR_EMAIL and PROSPECTOR_PASSWORD before running")?;
    let mut session = ChromiumSession::launch(settings.headless).await?;
    login::facebook(&mut session, &credentials, pacer)
        .await
        .context("login failed")?;
    Ok(session)
}

/// Launch a browser logged in to Instagram.
pub(crate) async fn open_instagram_session(
    settings: &Settings,
    pacer: &mut DelayScheduler,
) -> anyhow::Result<ChromiumSession> {
    let credentials = Credentials::instagram_from_env()
        .context("set PROSPECTOR_IG_USERNAME and PROSPECTOR_IG_PASSWORD before running")?;
    let mut session = ChromiumSession::launch(settings.headless).await?;
    login::instagram(&mut session, &credentials, pacer)
        .await
        .context("instagram login failed")?;
    Ok(session)
}
