//! Instagram subcommand: hashtag-driven account discovery plus per-account
//! follower collection.
//!
//! Three stages: walk each keyword's hashtag feed for post links, visit
//! posts to find and qualify the posting accounts (public, keyword in name
//! or bio), then walk each qualified account's follower dialog. The dialog
//! list scrolls independently of the page, so collection scopes the scroll
//! primitives to it.

use crate::collect::CollectionEngine;
use crate::config::{Settings, INTER_KEYWORD_DELAY};
use crate::error::SessionError;
use crate::extract::{
    excerpt, matching_keyword, parse_compact_count, Entity, ProfileLinkExtractor,
};
use crate::identity::canonicalize;
use crate::pacing::{DelayRange, DelayScheduler};
use crate::session::{BrowserSession, ClickOutcome, Locate, Target};
use crate::store::{channels, EntityStore};
use indicatif::ProgressBar;
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;
use tracing::{debug, info, warn};

const POST_LINK_SELECTOR: &str = "a[href*='/p/']";
/// The poster's profile link on a post page.
const POSTER_SELECTOR: &str = "a.notranslate, header a";
const PRIVATE_MARKER: &str = "This Account is Private";
const BIO_SELECTOR: &str = "header section span";
const FOLLOWERS_LINK: &str = "a[href*='/followers/']";
const FOLLOWER_DIALOG: &str = "div[role='dialog']";
const FOLLOWER_ROW_SELECTOR: &str = "div[role='dialog'] a[href]";

/// Scroll rounds over a hashtag feed while gathering post links.
const DISCOVERY_SCROLL_ROUNDS: usize = 5;
const DIALOG_TIMEOUT: Duration = Duration::from_secs(10);

/// Long pause between follower walks; dialog scraping is the noisiest
/// surface this crate touches.
const INTER_ACCOUNT_DELAY: DelayRange = DelayRange::from_secs(20, 30);

/// A keyword's hashtag feed URL; hashtags have no spaces or punctuation.
fn hashtag_url(keyword: &str) -> String {
    let tag: String = keyword
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect::<String>()
        .to_lowercase();
    format!("https://www.instagram.com/explore/tags/{tag}/")
}

fn profile_url(username: &str) -> String {
    format!("https://www.instagram.com/{username}/")
}

pub async fn run(
    settings: &Settings,
    keywords: &[String],
    max_accounts: usize,
    max_posts: usize,
    max_followers_per_account: usize,
    max_stalls: u32,
) -> anyhow::Result<()> {
    let mut pacer = DelayScheduler::new(settings.pacing);
    let mut session = super::open_instagram_session(settings, &mut pacer).await?;
    let mut store = EntityStore::open(&settings.output_dir)?;

    let mut post_links: Vec<String> = Vec::new();
    let mut seen_posts: HashSet<String> = HashSet::new();
    for keyword in keywords {
        info!(keyword = %keyword, "walking hashtag feed");
        session.navigate(&hashtag_url(keyword)).await?;
        pacer.page().await;
        for link in discover_post_links(&mut session, &mut pacer, DISCOVERY_SCROLL_ROUNDS).await? {
            if seen_posts.insert(link.clone()) {
                post_links.push(link);
            }
        }
        pacer.wait(INTER_KEYWORD_DELAY).await;
    }
    info!(posts = post_links.len(), "hashtag discovery finished");

    let bar = ProgressBar::new(post_links.len().min(max_posts) as u64);
    let mut accounts: Vec<Entity> = Vec::new();
    let mut seen_accounts: HashSet<String> = HashSet::new();
    for post in post_links.iter().take(max_posts) {
        if accounts.len() >= max_accounts {
            break;
        }
        bar.inc(1);
        let username = match poster_username(&mut session, &mut pacer, post).await {
            Ok(Some(username)) => username,
            Ok(None) => continue,
            Err(e) => {
                warn!(post = %post, error = %e, "post check failed");
                continue;
            }
        };
        if !seen_accounts.insert(username.clone()) {
            continue;
        }
        match qualify_account(&mut session, &mut pacer, keywords, &username).await {
            Ok(Some(account)) => {
                store.append_entity(&channels::IG_ACCOUNTS, &account)?;
                info!(
                    username = %account.display_name,
                    followers = %account.attr("followers"),
                    "account qualified"
                );
                accounts.push(account);
            }
            Ok(None) => {}
            Err(e) => warn!(username = %username, error = %e, "account check failed"),
        }
        pacer.entity().await;
    }
    bar.finish_and_clear();
    info!(accounts = accounts.len(), "account qualification finished");

    let mut follower_total = 0usize;
    for account in &accounts {
        if let Some(count) = collect_account_followers(
            &mut session,
            &mut store,
            &mut pacer,
            account,
            max_followers_per_account,
            max_stalls,
        )
        .await?
        {
            follower_total += count;
        }
        pacer.wait(INTER_ACCOUNT_DELAY).await;
    }

    session.close().await?;
    println!(
        "Recorded {} accounts and {} followers into {}",
        accounts.len(),
        follower_total,
        settings.output_dir.display()
    );
    Ok(())
}

/// Scroll a hashtag feed a fixed number of rounds, gathering deduplicated
/// post links.
pub async fn discover_post_links(
    session: &mut dyn BrowserSession,
    pacer: &mut DelayScheduler,
    rounds: usize,
) -> Result<Vec<String>, SessionError> {
    let mut links = Vec::new();
    let mut seen = HashSet::new();
    for _ in 0..rounds {
        session.scroll_to_bottom().await?;
        pacer.page().await;
        for node in session.query_nodes(POST_LINK_SELECTOR).await? {
            let Some(href) = node.href else { continue };
            let canonical = canonicalize(&href);
            if seen.insert(canonical.clone()) {
                links.push(canonical);
            }
        }
    }
    Ok(links)
}

/// The posting account's username, from the post page header.
async fn poster_username(
    session: &mut dyn BrowserSession,
    pacer: &mut DelayScheduler,
    post_url: &str,
) -> Result<Option<String>, SessionError> {
    session.navigate(post_url).await?;
    pacer.entity().await;
    Ok(session
        .query_nodes(POSTER_SELECTOR)
        .await?
        .into_iter()
        .map(|node| node.text.trim().to_string())
        // Usernames never contain whitespace; header links with spaced text
        // are captions or location tags.
        .find(|text| !text.is_empty() && !text.contains(' ')))
}

/// Visit an account's profile and qualify it: public, keyword in the
/// username or bio. Returns the account entity with follower count and a
/// bio excerpt, or `None` when it does not qualify.
pub async fn qualify_account(
    session: &mut dyn BrowserSession,
    pacer: &mut DelayScheduler,
    keywords: &[String],
    username: &str,
) -> Result<Option<Entity>, SessionError> {
    let url = profile_url(username);
    session.navigate(&url).await?;
    pacer.entity().await;

    if session.page_contains(PRIVATE_MARKER).await? {
        debug!(username, "private account, skipping");
        return Ok(None);
    }

    let bio = session
        .query_nodes(BIO_SELECTOR)
        .await?
        .into_iter()
        .map(|node| node.text)
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    let Some(keyword) = matching_keyword(keywords, username, &bio) else {
        debug!(username, "no keyword in name or bio, skipping");
        return Ok(None);
    };
    let keyword = keyword.to_string();

    let followers = session
        .query_nodes(FOLLOWERS_LINK)
        .await?
        .into_iter()
        .find_map(|node| {
            let cleaned = node.text.replace("followers", "");
            let cleaned = cleaned.trim();
            (!cleaned.is_empty()).then(|| parse_compact_count(cleaned))
        })
        .unwrap_or(0);

    let mut attributes = BTreeMap::new();
    attributes.insert("followers".to_string(), followers.to_string());
    attributes.insert("bio".to_string(), excerpt(&bio));

    Ok(Some(Entity {
        display_name: username.to_string(),
        canonical_url: canonicalize(&url),
        source_context: keyword,
        attributes,
    }))
}

/// Open an account's follower dialog and collect from it, scoping the
/// scroll primitives to the dialog. `None` when the dialog never opens.
pub async fn collect_account_followers(
    session: &mut dyn BrowserSession,
    store: &mut EntityStore,
    pacer: &mut DelayScheduler,
    account: &Entity,
    max_followers: usize,
    max_stalls: u32,
) -> anyhow::Result<Option<usize>> {
    if let Err(e) = session.navigate(&account.canonical_url).await {
        warn!(account = %account.display_name, error = %e, "profile unreachable, skipping");
        return Ok(None);
    }
    pacer.entity().await;

    let followers_link = Target::css(FOLLOWERS_LINK);
    if session.wait_clickable(&followers_link, DIALOG_TIMEOUT).await? == Locate::NotFound
        || session.click(&followers_link).await? != ClickOutcome::Clicked
    {
        warn!(account = %account.display_name, "followers link unusable, skipping");
        return Ok(None);
    }
    let dialog = Target::css(FOLLOWER_DIALOG);
    if session.wait_clickable(&dialog, DIALOG_TIMEOUT).await? == Locate::NotFound {
        warn!(account = %account.display_name, "follower dialog never opened, skipping");
        return Ok(None);
    }
    pacer.action().await;

    // The dialog list scrolls, not the page behind it.
    session.set_scroll_root(Some(FOLLOWER_DIALOG.to_string()));
    let extractor = ProfileLinkExtractor::new(
        account.display_name.clone(),
        account.canonical_url.clone(),
    )
    .with_selector(FOLLOWER_ROW_SELECTOR);
    let mut engine = CollectionEngine::new(session, store, pacer);
    let collected = engine
        .collect(
            &extractor,
            &channels::IG_FOLLOWERS,
            max_followers,
            max_stalls,
        )
        .await;
    session.set_scroll_root(None);
    let collected = collected?;

    session.dismiss_overlays().await?;
    info!(
        account = %account.display_name,
        count = collected.len(),
        "follower dialog walked"
    );
    Ok(Some(collected.len()))
}
