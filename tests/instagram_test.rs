//! Instagram discovery and follower collection against a scripted session.

mod common;

use common::{profile_node, text_node, FakeSession};
use prospector::cli::instagram_cmd::{
    collect_account_followers, discover_post_links, qualify_account,
};
use prospector::extract::Entity;
use prospector::pacing::{DelayScheduler, PacingProfile};
use prospector::session::Target;
use prospector::store::{channels, csv, EntityStore};
use std::collections::BTreeMap;

fn pacer() -> DelayScheduler {
    DelayScheduler::seeded(PacingProfile::instant(), 7)
}

fn store(dir: &tempfile::TempDir) -> EntityStore {
    EntityStore::with_run_tag(dir.path(), "test".to_string()).unwrap()
}

fn keywords() -> Vec<String> {
    vec!["physio".to_string()]
}

fn account() -> Entity {
    Entity {
        display_name: "physio_hub".to_string(),
        canonical_url: "https://www.instagram.com/physio_hub/".to_string(),
        source_context: "physio".to_string(),
        attributes: BTreeMap::new(),
    }
}

#[tokio::test]
async fn post_discovery_dedups_query_variants_across_rounds() {
    let mut session = FakeSession::new();
    session.push_batch(vec![profile_node(
        "",
        "https://www.instagram.com/p/AAA/?igsh=1",
    )]);
    session.push_batch(vec![
        profile_node("", "https://www.instagram.com/p/AAA/?igsh=2"),
        profile_node("", "https://www.instagram.com/p/BBB/"),
    ]);
    let mut pacer = pacer();

    let links = discover_post_links(&mut session, &mut pacer, 2)
        .await
        .unwrap();

    assert_eq!(
        links,
        vec![
            "https://www.instagram.com/p/AAA/",
            "https://www.instagram.com/p/BBB/"
        ]
    );
    assert_eq!(session.count_log("scroll"), 2);
}

#[tokio::test]
async fn private_account_is_rejected_without_reading_the_profile() {
    let mut session = FakeSession::new();
    session.set_page_text(
        "https://www.instagram.com/locked_away/",
        "This Account is Private. Follow to see their photos and videos.",
    );
    let mut pacer = pacer();

    let qualified = qualify_account(&mut session, &mut pacer, &keywords(), "locked_away")
        .await
        .unwrap();

    assert_eq!(qualified, None);
    assert_eq!(session.count_log("query:"), 0);
}

#[tokio::test]
async fn account_without_keyword_in_name_or_bio_is_rejected() {
    let mut session = FakeSession::new();
    session.push_batch(vec![text_node("Fresh bread daily since 1998")]); // bio
    let mut pacer = pacer();

    let qualified = qualify_account(&mut session, &mut pacer, &keywords(), "corner_bakery")
        .await
        .unwrap();

    assert_eq!(qualified, None);
}

#[tokio::test]
async fn matching_account_carries_followers_and_bio() {
    let mut session = FakeSession::new();
    session.push_batch(vec![text_node("Sports physio clinic in Lahore")]); // bio
    session.push_batch(vec![text_node("2,153 followers")]);
    let mut pacer = pacer();

    let qualified = qualify_account(&mut session, &mut pacer, &keywords(), "rehab_lab")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(qualified.display_name, "rehab_lab");
    assert_eq!(
        qualified.canonical_url,
        "https://www.instagram.com/rehab_lab/"
    );
    assert_eq!(qualified.source_context, "physio");
    assert_eq!(qualified.attr("followers"), "2153");
    assert_eq!(qualified.attr("bio"), "Sports physio clinic in Lahore");
}

#[tokio::test]
async fn follower_walk_scopes_scrolling_to_the_dialog() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = FakeSession::new().with_heights(&[100]);
    session.make_clickable(&Target::css("a[href*='/followers/']"));
    session.make_clickable(&Target::css("div[role='dialog']"));
    session.push_batch(vec![
        profile_node("fan_one", "https://www.instagram.com/fan_one/"),
        profile_node("fan_two", "https://www.instagram.com/fan_two/"),
    ]);
    let mut store = store(&dir);
    let mut pacer = pacer();

    let count = collect_account_followers(&mut session, &mut store, &mut pacer, &account(), 10, 1)
        .await
        .unwrap();
    assert_eq!(count, Some(2));

    // The dialog is scoped before collection and the document restored after.
    let scopes: Vec<&String> = session
        .log
        .iter()
        .filter(|e| e.starts_with("scroll_root:"))
        .collect();
    assert_eq!(
        scopes,
        vec!["scroll_root:div[role='dialog']", "scroll_root:document"]
    );

    let rows = csv::parse(
        &std::fs::read_to_string(store.path_for(&channels::IG_FOLLOWERS)).unwrap(),
    );
    assert_eq!(rows[0], vec!["name", "profile_url", "source_context"]);
    assert_eq!(
        rows[1],
        vec!["fan_one", "https://www.instagram.com/fan_one/", "physio_hub"]
    );
}

#[tokio::test]
async fn missing_followers_link_skips_the_account() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = FakeSession::new();
    let mut store = store(&dir);
    let mut pacer = pacer();

    let count = collect_account_followers(&mut session, &mut store, &mut pacer, &account(), 10, 1)
        .await
        .unwrap();

    assert_eq!(count, None);
    assert_eq!(session.count_log("scroll_root:"), 0);
    assert!(!store.path_for(&channels::IG_FOLLOWERS).exists());
}
