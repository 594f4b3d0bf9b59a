//! Dispatcher integration tests against a mocked Graph API.
//!
//! Covers the template fallback chain, session-window gating, and
//! outbound recording.

use chrono::Utc;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use wa_relay::dispatch::{SendRequest, SendStep};
use wa_relay::models::message::{Direction, InboxItem};
use wa_relay::AppError;

use super::test_helpers::{test_config, test_state};

const MESSAGES_PATH: &str = "/PHONE1/messages";

fn request(body: serde_json::Value) -> SendRequest {
    serde_json::from_value(body).expect("valid send request")
}

fn accepted() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "messaging_product": "whatsapp",
        "contacts": [{ "wa_id": "15551234567" }],
        "messages": [{ "id": "wamid.SENT1" }]
    }))
}

fn rejected(code: i64, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(400).set_body_json(json!({
        "error": { "message": message, "code": code }
    }))
}

fn fresh_inbound(from: &str) -> InboxItem {
    InboxItem {
        id: None,
        direction: Direction::Inbound,
        timestamp: Utc::now().timestamp_millis(),
        from: Some(from.into()),
        to: None,
        name: None,
        msg_type: "text".into(),
        text: Some("hola".into()),
        media_id: None,
        media_type: None,
        file_name: None,
        raw: None,
    }
}

// ─── Free text inside an open window ──────────────────────────────────

#[tokio::test]
async fn open_window_sends_text_directly() {
    let server = MockServer::start().await;
    let state = test_state(test_config(&server.uri())).await;
    state.inbox.push(fresh_inbound("15551234567"));

    Mock::given(method("POST"))
        .and(path(MESSAGES_PATH))
        .and(body_partial_json(json!({ "type": "text" })))
        .respond_with(accepted())
        .expect(1)
        .mount(&server)
        .await;

    let outcome = state
        .dispatcher
        .send(request(json!({ "to": "15551234567", "text": "your order shipped" })))
        .await
        .expect("send");

    assert_eq!(outcome.step, SendStep::TextOnly);
    assert!(outcome.template_opened.is_none());
    assert!(outcome.text_message.is_some());

    // The send is recorded at the head of the inbox and mirrored durably.
    let head = state.inbox.query(&wa_relay::inbox::InboxQuery::default()).items;
    assert_eq!(head[0].direction, Direction::Outbound);
    assert_eq!(head[0].text.as_deref(), Some("your order shipped"));
    assert_eq!(head[0].id.as_deref(), Some("wamid.SENT1"));

    let rows = state
        .repo
        .recent_for_contact("15551234567", 10)
        .await
        .expect("rows");
    assert!(rows
        .iter()
        .any(|r| r.direction == Direction::Outbound && r.body.as_deref() == Some("your order shipped")));
}

// ─── Closed window: session template then text ────────────────────────

#[tokio::test]
async fn closed_window_opens_session_template_before_text() {
    let server = MockServer::start().await;
    let state = test_state(test_config(&server.uri())).await;

    Mock::given(method("POST"))
        .and(path(MESSAGES_PATH))
        .and(body_partial_json(json!({ "type": "template" })))
        .respond_with(accepted())
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(MESSAGES_PATH))
        .and(body_partial_json(json!({ "type": "text" })))
        .respond_with(accepted())
        .expect(1)
        .mount(&server)
        .await;

    let outcome = state
        .dispatcher
        .send(request(json!({ "to": "15551234567", "text": "hello again" })))
        .await
        .expect("send");

    assert_eq!(outcome.step, SendStep::TemplateThenText);
    assert!(outcome.template_opened.is_some());
    assert!(outcome.text_message.is_some());
}

#[tokio::test]
async fn closed_window_without_text_sends_session_template_only() {
    let server = MockServer::start().await;
    let state = test_state(test_config(&server.uri())).await;

    Mock::given(method("POST"))
        .and(path(MESSAGES_PATH))
        .and(body_partial_json(json!({ "template": { "name": "hello_world" } })))
        .respond_with(accepted())
        .expect(1)
        .mount(&server)
        .await;

    let outcome = state
        .dispatcher
        .send(request(json!({ "to": "15551234567" })))
        .await
        .expect("send");

    assert_eq!(outcome.step, SendStep::SessionTemplateOnly);
    assert!(outcome.template_opened.is_some());
    assert!(outcome.text_message.is_none());
}

#[tokio::test]
async fn session_template_override_is_used() {
    let server = MockServer::start().await;
    let state = test_state(test_config(&server.uri())).await;

    Mock::given(method("POST"))
        .and(path(MESSAGES_PATH))
        .and(body_partial_json(json!({
            "template": { "name": "reengage", "language": { "code": "es" } }
        })))
        .respond_with(accepted())
        .expect(1)
        .mount(&server)
        .await;

    let outcome = state
        .dispatcher
        .send(request(json!({
            "to": "15551234567",
            "sessionTemplate": "reengage",
            "sessionLanguage": "es"
        })))
        .await
        .expect("send");

    assert_eq!(outcome.step, SendStep::SessionTemplateOnly);
}

// ─── Window overrides ─────────────────────────────────────────────────

#[tokio::test]
async fn ensure_session_forces_template_even_inside_window() {
    let server = MockServer::start().await;
    let state = test_state(test_config(&server.uri())).await;
    state.inbox.push(fresh_inbound("15551234567"));

    Mock::given(method("POST"))
        .and(path(MESSAGES_PATH))
        .and(body_partial_json(json!({ "type": "template" })))
        .respond_with(accepted())
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(MESSAGES_PATH))
        .and(body_partial_json(json!({ "type": "text" })))
        .respond_with(accepted())
        .expect(1)
        .mount(&server)
        .await;

    let outcome = state
        .dispatcher
        .send(request(json!({
            "to": "15551234567",
            "text": "forced",
            "ensureSession": true
        })))
        .await
        .expect("send");

    assert_eq!(outcome.step, SendStep::TemplateThenText);
}

#[tokio::test]
async fn auto_session_off_skips_window_handling() {
    let server = MockServer::start().await;
    let state = test_state(test_config(&server.uri())).await;
    // Window is closed, but autoSession=false means no template open.

    Mock::given(method("POST"))
        .and(path(MESSAGES_PATH))
        .and(body_partial_json(json!({ "type": "text" })))
        .respond_with(accepted())
        .expect(1)
        .mount(&server)
        .await;

    let outcome = state
        .dispatcher
        .send(request(json!({
            "to": "15551234567",
            "text": "raw send",
            "autoSession": false
        })))
        .await
        .expect("send");

    assert_eq!(outcome.step, SendStep::TextOnly);
    assert!(outcome.template_opened.is_none());
}

#[tokio::test]
async fn no_text_and_open_window_is_no_content() {
    let server = MockServer::start().await;
    let state = test_state(test_config(&server.uri())).await;
    state.inbox.push(fresh_inbound("15551234567"));

    let outcome = state
        .dispatcher
        .send(request(json!({ "to": "15551234567" })))
        .await
        .expect("send");

    assert_eq!(outcome.step, SendStep::NoContent);
    assert!(outcome.template_opened.is_none());
    assert!(outcome.text_message.is_none());
    // Nothing reached the platform.
    assert!(server.received_requests().await.expect("requests").is_empty());
}

// ─── Explicit template fallback chain ─────────────────────────────────

#[tokio::test]
async fn explicit_template_first_candidate_succeeds() {
    let server = MockServer::start().await;
    let state = test_state(test_config(&server.uri())).await;

    Mock::given(method("POST"))
        .and(path(MESSAGES_PATH))
        .and(body_partial_json(json!({
            "template": { "name": "promo", "language": { "code": "es" } }
        })))
        .respond_with(accepted())
        .expect(1)
        .mount(&server)
        .await;

    let outcome = state
        .dispatcher
        .send(request(json!({
            "to": "15551234567",
            "templateName": "promo",
            "languageCode": "es",
            "variables": ["Ana", "#42"]
        })))
        .await
        .expect("send");

    assert_eq!(outcome.step, SendStep::Template);
    let used = outcome.used.expect("used template");
    assert_eq!(used.name, "promo");
    assert_eq!(used.language, "es");

    // Template sends are recorded in the inbox with a readable label.
    let head = state.inbox.query(&wa_relay::inbox::InboxQuery::default()).items;
    assert_eq!(head[0].msg_type, "template");
    assert_eq!(head[0].text.as_deref(), Some("[TPL] promo/es | Ana | #42"));
}

#[tokio::test]
async fn rejected_language_falls_back_to_en_us() {
    let server = MockServer::start().await;
    let state = test_state(test_config(&server.uri())).await;

    Mock::given(method("POST"))
        .and(path(MESSAGES_PATH))
        .and(body_partial_json(json!({ "template": { "language": { "code": "es" } } })))
        .respond_with(rejected(132_001, "template not approved for language"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(MESSAGES_PATH))
        .and(body_partial_json(json!({ "template": { "language": { "code": "en_US" } } })))
        .respond_with(accepted())
        .expect(1)
        .mount(&server)
        .await;

    let outcome = state
        .dispatcher
        .send(request(json!({
            "to": "15551234567",
            "templateName": "promo",
            "languageCode": "es"
        })))
        .await
        .expect("send");

    assert_eq!(outcome.step, SendStep::TemplateFallbackEnUs);
    let used = outcome.used.clone().expect("used template");
    assert_eq!(used.name, "promo");
    assert_eq!(used.language, "en_US");

    // The wire form of the step is stable.
    let value = serde_json::to_value(&outcome).expect("serialize");
    assert_eq!(value["step"], "template_fallback_en_US");
}

#[tokio::test]
async fn unknown_template_falls_back_to_hello_world() {
    let server = MockServer::start().await;
    let state = test_state(test_config(&server.uri())).await;

    Mock::given(method("POST"))
        .and(path(MESSAGES_PATH))
        .and(body_partial_json(json!({ "template": { "name": "promo" } })))
        .respond_with(rejected(132_001, "template not found"))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(MESSAGES_PATH))
        .and(body_partial_json(json!({ "template": { "name": "hello_world" } })))
        .respond_with(accepted())
        .expect(1)
        .mount(&server)
        .await;

    let outcome = state
        .dispatcher
        .send(request(json!({
            "to": "15551234567",
            "templateName": "promo",
            "languageCode": "es"
        })))
        .await
        .expect("send");

    assert_eq!(outcome.step, SendStep::HelloWorldFallback);
    let used = outcome.used.expect("used template");
    assert_eq!(used.name, "hello_world");
    assert_eq!(used.language, "en_US");
}

#[tokio::test]
async fn exhausted_chain_surfaces_the_last_platform_error() {
    let server = MockServer::start().await;
    let state = test_state(test_config(&server.uri())).await;

    Mock::given(method("POST"))
        .and(path(MESSAGES_PATH))
        .respond_with(rejected(131_026, "recipient unavailable"))
        .expect(3)
        .mount(&server)
        .await;

    let err = state
        .dispatcher
        .send(request(json!({
            "to": "15551234567",
            "templateName": "promo",
            "languageCode": "es"
        })))
        .await
        .expect_err("must fail");

    match err {
        AppError::Graph { code, message } => {
            assert_eq!(code, Some(131_026));
            assert_eq!(message, "recipient unavailable");
        }
        other => panic!("unexpected error: {other}"),
    }
    // Nothing is recorded on failure.
    assert!(state.inbox.is_empty());
}

// ─── Validation ───────────────────────────────────────────────────────

#[tokio::test]
async fn missing_destination_is_rejected_before_any_network_call() {
    let server = MockServer::start().await;
    let state = test_state(test_config(&server.uri())).await;

    let err = state
        .dispatcher
        .send(request(json!({ "text": "orphan" })))
        .await
        .expect_err("must fail");

    assert!(matches!(err, AppError::BadRequest(_)));
    assert!(server.received_requests().await.expect("requests").is_empty());
}
