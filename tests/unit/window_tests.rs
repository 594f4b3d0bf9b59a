//! Unit tests for 24h window evaluation: strict boundary, memory
//! precedence, and the durable fallback path.

use std::sync::Arc;

use wa_relay::inbox::InboxStore;
use wa_relay::models::message::{Direction, InboxItem, StoredMessage};
use wa_relay::persistence::{db, message_repo::MessageRepo};
use wa_relay::window::{WindowEvaluator, WINDOW_MS};

fn inbound(from: &str, ts: i64) -> InboxItem {
    InboxItem {
        id: None,
        direction: Direction::Inbound,
        timestamp: ts,
        from: Some(from.into()),
        to: None,
        name: None,
        msg_type: "text".into(),
        text: Some("hi".into()),
        media_id: None,
        media_type: None,
        file_name: None,
        raw: None,
    }
}

fn stored_inbound(wa_id: &str, ts_ms: i64) -> StoredMessage {
    StoredMessage {
        meta_message_id: None,
        wa_id: wa_id.into(),
        direction: Direction::Inbound,
        msg_type: "text".into(),
        body: Some("hi".into()),
        ts_ms,
        raw: None,
    }
}

async fn evaluator() -> (WindowEvaluator, Arc<InboxStore>, MessageRepo) {
    let db = Arc::new(db::connect_memory().await.expect("db"));
    let inbox = Arc::new(InboxStore::new());
    let repo = MessageRepo::new(db);
    let window = WindowEvaluator::new(Arc::clone(&inbox), repo.clone());
    (window, inbox, repo)
}

// ─── Strict boundary on the in-memory path ────────────────────────────

#[tokio::test]
async fn one_millisecond_inside_the_window_is_open() {
    let (window, inbox, _repo) = evaluator().await;
    inbox.push(inbound("1", 1_000));

    assert!(window.is_in_window_at("1", 1_000 + WINDOW_MS - 1).await);
}

#[tokio::test]
async fn exactly_twenty_four_hours_is_closed() {
    let (window, inbox, _repo) = evaluator().await;
    inbox.push(inbound("1", 1_000));

    assert!(!window.is_in_window_at("1", 1_000 + WINDOW_MS).await);
}

#[tokio::test]
async fn newest_inbound_wins_for_a_contact() {
    let (window, inbox, _repo) = evaluator().await;
    inbox.push(inbound("1", 5));
    inbox.push(inbound("1", 10));

    // 5 is outside the window at this instant; 10 is not.
    assert!(window.is_in_window_at("1", 10 + WINDOW_MS - 1).await);
}

// ─── Durable fallback path ────────────────────────────────────────────

#[tokio::test]
async fn memory_miss_falls_back_to_durable_rows() {
    let (window, _inbox, repo) = evaluator().await;
    repo.insert(&stored_inbound("1", 2_000)).await.expect("insert");

    assert!(window.is_in_window_at("1", 2_000 + WINDOW_MS - 1).await);
    assert!(!window.is_in_window_at("1", 2_000 + WINDOW_MS).await);
}

#[tokio::test]
async fn no_inbound_anywhere_is_closed() {
    let (window, _inbox, _repo) = evaluator().await;
    assert!(!window.is_in_window_at("1", 1_000_000).await);
}

// ─── Memory precedence ────────────────────────────────────────────────

#[tokio::test]
async fn memory_is_authoritative_over_fresher_durable_rows() {
    let (window, inbox, repo) = evaluator().await;
    let now = 10 * WINDOW_MS;

    // Durable row is inside the window, memory is outside of it. The
    // memory answer wins without consulting the database.
    inbox.push(inbound("1", now - WINDOW_MS - 1));
    repo.insert(&stored_inbound("1", now - 1)).await.expect("insert");

    assert!(!window.is_in_window_at("1", now).await);
}

#[tokio::test]
async fn stale_durable_rows_do_not_shadow_fresh_memory() {
    let (window, inbox, repo) = evaluator().await;
    let now = 10 * WINDOW_MS;

    inbox.push(inbound("1", now - 1));
    repo.insert(&stored_inbound("1", now - 2 * WINDOW_MS))
        .await
        .expect("insert");

    assert!(window.is_in_window_at("1", now).await);
}

// ─── Contact isolation ────────────────────────────────────────────────

#[tokio::test]
async fn windows_are_tracked_per_contact() {
    let (window, inbox, _repo) = evaluator().await;
    let now = 10 * WINDOW_MS;
    inbox.push(inbound("open", now - 1));

    assert!(window.is_in_window_at("open", now).await);
    assert!(!window.is_in_window_at("closed", now).await);
}
