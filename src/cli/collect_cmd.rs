//! Collection subcommands: pages, followers, groups.

use crate::collect::CollectionEngine;
use crate::config::{Settings, INTER_KEYWORD_DELAY, INTER_SOURCE_DELAY};
use crate::error::SessionError;
use crate::extract::{
    excerpt, find_count, matches_keywords, Entity, ProfileLinkExtractor, SearchHitExtractor,
};
use crate::identity::canonicalize;
use crate::pacing::DelayScheduler;
use crate::session::{BrowserSession, ClickOutcome, Locate, Target};
use crate::store::{channels, load_sources, EntityStore};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Text markers for a page or group that cannot be opened.
const UNAVAILABLE_MARKERS: &[&str] = &[
    "This content isn't available",
    "This page isn't available",
];

/// How long to wait for an optional tab or link before giving up on it.
const TAB_TIMEOUT: Duration = Duration::from_secs(5);

fn search_url(kind: &str, keyword: &str) -> String {
    let query: String = url::form_urlencoded::byte_serialize(keyword.as_bytes()).collect();
    format!("https://www.facebook.com/search/{kind}/?q={query}")
}

fn progress_bar(len: u64, noun: &str) -> ProgressBar {
    let bar = ProgressBar::new(len);
    bar.set_style(
        ProgressStyle::with_template("{prefix:>10} [{bar:30}] {pos}/{len}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar.set_prefix(noun.to_string());
    bar
}

async fn is_unavailable(session: &mut dyn BrowserSession) -> Result<bool, SessionError> {
    for marker in UNAVAILABLE_MARKERS {
        if session.page_contains(marker).await? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Keyword-search feeds, candidate checkpointing, then a detail pass that
/// qualifies pages by keyword match over name and about text.
pub async fn run_pages(
    settings: &Settings,
    keywords: &[String],
    max_pages: usize,
    max_candidates: usize,
    max_stalls: u32,
) -> anyhow::Result<()> {
    let mut pacer = DelayScheduler::new(settings.pacing);
    let mut session = super::open_session(settings, &mut pacer).await?;
    let mut store = EntityStore::open(&settings.output_dir)?;

    let candidates = collect_candidates(
        &mut session,
        &mut store,
        &mut pacer,
        keywords,
        "pages",
        &channels::PAGE_CANDIDATES,
        max_candidates,
        max_stalls,
    )
    .await?;
    info!(candidates = candidates.len(), "search pass finished");

    let bar = progress_bar(candidates.len() as u64, "pages");
    let mut qualified = 0usize;
    for candidate in &candidates {
        if qualified >= max_pages {
            break;
        }
        bar.inc(1);
        match enrich_page(&mut session, &mut pacer, candidate).await {
            Ok(page) => {
                if matches_keywords(keywords, &page.display_name, page.attr("about")) {
                    store.append_entity(&channels::PAGES, &page)?;
                    qualified += 1;
                    info!(name = %page.display_name, url = %page.canonical_url, "page qualified");
                } else {
                    info!(name = %page.display_name, "page did not match keywords");
                }
            }
            Err(e) => {
                warn!(url = %candidate.canonical_url, error = %e, "page detail pass failed");
            }
        }
        pacer.entity().await;
    }
    bar.finish_and_clear();

    session.close().await?;
    println!(
        "Collected {} qualified pages from {} candidates into {}",
        qualified,
        candidates.len(),
        settings.output_dir.display()
    );
    Ok(())
}

/// Walk each source page's follower list.
pub async fn run_followers(
    settings: &Settings,
    roster: &Path,
    max_followers_per_page: usize,
    max_stalls: u32,
) -> anyhow::Result<()> {
    let sources = load_sources(roster)?;
    anyhow::ensure!(
        !sources.is_empty(),
        "{} contains no sources",
        roster.display()
    );

    let mut pacer = DelayScheduler::new(settings.pacing);
    let mut session = super::open_session(settings, &mut pacer).await?;
    let mut store = EntityStore::open(&settings.output_dir)?;

    let bar = progress_bar(sources.len() as u64, "followers");
    let mut total = 0usize;
    for (name, url) in &sources {
        bar.inc(1);
        let canonical = canonicalize(url);
        let followers_url = format!("{}/followers", canonical.trim_end_matches('/'));
        if let Err(e) = session.navigate(&followers_url).await {
            warn!(source = %name, error = %e, "follower list unreachable, skipping");
            continue;
        }
        pacer.entity().await;
        if is_unavailable(&mut session).await? {
            warn!(source = %name, "follower list not public, skipping");
            continue;
        }

        let extractor = ProfileLinkExtractor::new(name.clone(), canonical.clone());
        let mut engine = CollectionEngine::new(&mut session, &mut store, &mut pacer);
        let found = engine
            .collect(
                &extractor,
                &channels::FOLLOWERS,
                max_followers_per_page,
                max_stalls,
            )
            .await?;
        total += found.len();
        info!(source = %name, count = found.len(), "follower list walked");
        pacer.wait(INTER_SOURCE_DELAY).await;
    }
    bar.finish_and_clear();

    session.close().await?;
    println!(
        "Collected {} followers from {} sources into {}",
        total,
        sources.len(),
        settings.output_dir.display()
    );
    Ok(())
}

/// Keyword-search feeds for groups, then a detail pass that records each
/// group and walks its member list when accessible.
pub async fn run_groups(
    settings: &Settings,
    keywords: &[String],
    max_groups: usize,
    max_members: usize,
    max_stalls: u32,
) -> anyhow::Result<()> {
    let mut pacer = DelayScheduler::new(settings.pacing);
    let mut session = super::open_session(settings, &mut pacer).await?;
    let mut store = EntityStore::open(&settings.output_dir)?;

    let candidates = collect_candidates(
        &mut session,
        &mut store,
        &mut pacer,
        keywords,
        "groups",
        &channels::GROUP_CANDIDATES,
        max_groups,
        max_stalls,
    )
    .await?;
    info!(candidates = candidates.len(), "search pass finished");

    let bar = progress_bar(candidates.len().min(max_groups) as u64, "groups");
    let mut walked = 0usize;
    let mut member_total = 0usize;
    for candidate in candidates.iter().take(max_groups) {
        bar.inc(1);
        if let Some(members) = walk_group(
            &mut session,
            &mut store,
            &mut pacer,
            candidate,
            max_members,
            max_stalls,
        )
        .await?
        {
            walked += 1;
            member_total += members;
        }
        pacer.wait(INTER_SOURCE_DELAY).await;
    }
    bar.finish_and_clear();

    session.close().await?;
    println!(
        "Recorded {} groups and {} members into {}",
        walked,
        member_total,
        settings.output_dir.display()
    );
    Ok(())
}

/// Visit one group candidate: record it and walk its member list.
///
/// Accessibility is checked before anything is recorded; an unreachable or
/// unavailable group leaves no row behind. Returns the member count for a
/// recorded group, `None` for a skipped one.
pub async fn walk_group(
    session: &mut dyn BrowserSession,
    store: &mut EntityStore,
    pacer: &mut DelayScheduler,
    candidate: &Entity,
    max_members: usize,
    max_stalls: u32,
) -> anyhow::Result<Option<usize>> {
    if let Err(e) = session.navigate(&candidate.canonical_url).await {
        warn!(url = %candidate.canonical_url, error = %e, "group unreachable, skipping");
        return Ok(None);
    }
    pacer.entity().await;

    if is_unavailable(session).await? {
        warn!(url = %candidate.canonical_url, "group not accessible, skipping");
        return Ok(None);
    }

    let group = enrich_group(session, candidate).await?;
    store.append_entity(&channels::GROUPS, &group)?;

    let mut member_count = 0usize;
    if open_members_tab(session, pacer).await? {
        let extractor =
            ProfileLinkExtractor::new(group.display_name.clone(), group.canonical_url.clone())
                .with_extra("group_name", group.display_name.clone())
                .with_extra("group_url", group.canonical_url.clone());
        let mut engine = CollectionEngine::new(session, store, pacer);
        let members = engine
            .collect(&extractor, &channels::MEMBERS, max_members, max_stalls)
            .await?;
        member_count = members.len();
        info!(group = %group.display_name, count = member_count, "member list walked");
    } else {
        warn!(name = %group.display_name, "members tab not found");
    }
    Ok(Some(member_count))
}

/// Walk one search feed per keyword, checkpointing hits into `channel` and
/// returning the deduplicated candidate list.
#[allow(clippy::too_many_arguments)]
async fn collect_candidates(
    session: &mut dyn BrowserSession,
    store: &mut EntityStore,
    pacer: &mut DelayScheduler,
    keywords: &[String],
    kind: &str,
    channel: &crate::store::ChannelSpec,
    per_keyword: usize,
    max_stalls: u32,
) -> anyhow::Result<Vec<Entity>> {
    let mut candidates: Vec<Entity> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for keyword in keywords {
        info!(keyword = %keyword, kind, "searching");
        session.navigate(&search_url(kind, keyword)).await?;
        pacer.page().await;

        let extractor = match kind {
            "groups" => SearchHitExtractor::groups(keyword.clone()),
            _ => SearchHitExtractor::pages(keyword.clone()),
        };
        let mut engine = CollectionEngine::new(session, store, pacer);
        let found = engine
            .collect(&extractor, channel, per_keyword, max_stalls)
            .await?;
        // Cross-keyword dedup; within one keyword the engine already dedups.
        for entity in found {
            if seen.insert(entity.canonical_url.clone()) {
                candidates.push(entity);
            }
        }
        pacer.wait(INTER_KEYWORD_DELAY).await;
    }
    Ok(candidates)
}

/// Visit a candidate page and fill in name, counts, and about text.
async fn enrich_page(
    session: &mut dyn BrowserSession,
    pacer: &mut DelayScheduler,
    candidate: &Entity,
) -> Result<Entity, SessionError> {
    session.navigate(&candidate.canonical_url).await?;
    pacer.entity().await;

    let display_name = heading_or(session, &candidate.display_name).await?;

    let mut likes = 0u64;
    let mut followers = 0u64;
    for node in session.query_nodes("span").await? {
        if likes == 0 {
            if let Some(n) = find_count(&node.text, "people like this") {
                likes = n;
            }
        }
        if followers == 0 {
            if let Some(n) = find_count(&node.text, "people follow this") {
                followers = n;
            }
        }
        if likes > 0 && followers > 0 {
            break;
        }
    }

    let mut about = String::new();
    let about_link = Target::css("a[href*='/about']");
    if session.wait_clickable(&about_link, TAB_TIMEOUT).await? == Locate::Found
        && session.click(&about_link).await? == ClickOutcome::Clicked
    {
        pacer.action().await;
        about = joined_text(session, "div[role='main'] span").await?;
    }

    let mut enriched = candidate.clone();
    enriched.display_name = display_name;
    enriched
        .attributes
        .insert("likes".to_string(), likes.to_string());
    enriched
        .attributes
        .insert("followers".to_string(), followers.to_string());
    enriched
        .attributes
        .insert("about".to_string(), excerpt(&about));
    Ok(enriched)
}

/// Fill in a group candidate's name, member count, and description from the
/// group page already on screen.
async fn enrich_group(
    session: &mut dyn BrowserSession,
    candidate: &Entity,
) -> Result<Entity, SessionError> {
    let display_name = heading_or(session, &candidate.display_name).await?;

    let mut members = 0u64;
    for node in session.query_nodes("span").await? {
        if let Some(n) = find_count(&node.text, "members") {
            members = n;
            break;
        }
    }
    let description = joined_text(session, "div[role='main'] span").await?;

    let mut enriched = candidate.clone();
    enriched.display_name = display_name;
    enriched
        .attributes
        .insert("members".to_string(), members.to_string());
    enriched
        .attributes
        .insert("description".to_string(), excerpt(&description));
    Ok(enriched)
}

/// First non-empty `h1` on the page, or the fallback name.
async fn heading_or(
    session: &mut dyn BrowserSession,
    fallback: &str,
) -> Result<String, SessionError> {
    Ok(session
        .query_nodes("h1")
        .await?
        .into_iter()
        .map(|n| n.text)
        .find(|t| !t.is_empty())
        .unwrap_or_else(|| fallback.to_string()))
}

async fn joined_text(
    session: &mut dyn BrowserSession,
    selector: &str,
) -> Result<String, SessionError> {
    Ok(session
        .query_nodes(selector)
        .await?
        .into_iter()
        .map(|n| n.text)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" "))
}

/// Click through to a group's member list; `false` when no tab is found.
async fn open_members_tab(
    session: &mut dyn BrowserSession,
    pacer: &mut DelayScheduler,
) -> Result<bool, SessionError> {
    for target in [Target::css("a[href*='/members/']"), Target::labeled("Members")] {
        if session.wait_clickable(&target, TAB_TIMEOUT).await? == Locate::Found
            && session.click(&target).await? == ClickOutcome::Clicked
        {
            pacer.action().await;
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_url_encodes_keyword() {
        assert_eq!(
            search_url("pages", "physio lahore"),
            "https://www.facebook.com/search/pages/?q=physio+lahore"
        );
    }

}
