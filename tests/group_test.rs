//! Group detail pass against a scripted session.

mod common;

use common::{profile_node, text_node, FakeSession};
use prospector::cli::collect_cmd::walk_group;
use prospector::extract::Entity;
use prospector::pacing::{DelayScheduler, PacingProfile};
use prospector::store::{channels, csv, EntityStore};
use std::collections::BTreeMap;

const GROUP_URL: &str = "https://s/groups/77";

fn pacer() -> DelayScheduler {
    DelayScheduler::seeded(PacingProfile::instant(), 7)
}

fn store(dir: &tempfile::TempDir) -> EntityStore {
    EntityStore::with_run_tag(dir.path(), "test".to_string()).unwrap()
}

fn candidate() -> Entity {
    let mut attributes = BTreeMap::new();
    attributes.insert("keyword".to_string(), "physio".to_string());
    Entity {
        display_name: "Unknown".to_string(),
        canonical_url: GROUP_URL.to_string(),
        source_context: "physio".to_string(),
        attributes,
    }
}

#[tokio::test]
async fn inaccessible_group_is_not_recorded() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = FakeSession::new();
    session.set_page_text(GROUP_URL, "Sorry. This content isn't available right now");
    let mut store = store(&dir);
    let mut pacer = pacer();

    let walked = walk_group(&mut session, &mut store, &mut pacer, &candidate(), 10, 1)
        .await
        .unwrap();

    assert_eq!(walked, None);
    assert!(!store.path_for(&channels::GROUPS).exists());
    assert_eq!(session.count_log("query:"), 0);
}

#[tokio::test]
async fn accessible_group_is_recorded_with_detail_fields() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = FakeSession::new().with_heights(&[100]);
    session.push_batch(vec![text_node("Physio Hub")]); // h1
    session.push_batch(vec![text_node("1.2K members · Public group")]);
    session.push_batch(vec![text_node("Rehab advice and referrals")]);
    session.push_batch(vec![profile_node("Asha", "https://s/user/1")]);
    session.make_clickable(&prospector::session::Target::css("a[href*='/members/']"));
    let mut store = store(&dir);
    let mut pacer = pacer();

    let walked = walk_group(&mut session, &mut store, &mut pacer, &candidate(), 10, 1)
        .await
        .unwrap();
    assert_eq!(walked, Some(1));

    let groups = csv::parse(
        &std::fs::read_to_string(store.path_for(&channels::GROUPS)).unwrap(),
    );
    assert_eq!(
        groups[1],
        vec![
            "Physio Hub",
            GROUP_URL,
            "physio",
            "1200",
            "Rehab advice and referrals"
        ]
    );

    let members = csv::parse(
        &std::fs::read_to_string(store.path_for(&channels::MEMBERS)).unwrap(),
    );
    assert_eq!(
        members[1],
        vec!["Asha", "https://s/user/1", "Physio Hub", "Physio Hub", GROUP_URL]
    );
}

#[tokio::test]
async fn unreachable_group_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = FakeSession::new();
    session.unreachable.insert(GROUP_URL.to_string());
    let mut store = store(&dir);
    let mut pacer = pacer();

    let walked = walk_group(&mut session, &mut store, &mut pacer, &candidate(), 10, 1)
        .await
        .unwrap();

    assert_eq!(walked, None);
    assert!(!store.path_for(&channels::GROUPS).exists());
}
