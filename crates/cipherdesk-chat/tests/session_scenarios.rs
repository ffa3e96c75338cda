//! End-to-end session scenarios against a scripted backend.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use cipherdesk_chat::controller::RAW_QUERY_NOTICE;
use cipherdesk_chat::{
    ChatResponse, IgnoredReason, MockBackend, PageAction, Phase, RawQueryResponse,
    SessionController, SubmitOutcome, APOLOGY, GREETING,
};
use cipherdesk_core::config::DisplayConfig;
use cipherdesk_core::types::{Mode, Role};
use cipherdesk_core::{InputBuffer, PROTECTED_RENDERING, SENTINEL_MARKER};

// =============================================================================
// Helpers
// =============================================================================

fn session_with(backend: MockBackend) -> (SessionController, Arc<MockBackend>) {
    let backend = Arc::new(backend);
    let session =
        SessionController::new(backend.clone(), InputBuffer::new(), &DisplayConfig::default());
    (session, backend)
}

fn chat(value: Value) -> ChatResponse {
    serde_json::from_value(value).unwrap()
}

fn raw(value: Value) -> RawQueryResponse {
    serde_json::from_value(value).unwrap()
}

fn brokers(n: usize) -> Value {
    let rows: Vec<Value> = (0..n)
        .map(|i| {
            json!({
                "broker_id": i + 1,
                "name": format!("Broker {}", i + 1),
                "license_number": format!("[ENCRYPTED:lic{}]", i),
                "contact_email": format!("[ENCRYPTED:mail{}]", i),
                "registration_date": "2023-01-15"
            })
        })
        .collect();
    Value::Array(rows)
}

// =============================================================================
// Conversational mode
// =============================================================================

#[tokio::test]
async fn test_brokers_contact_details_are_redacted() {
    let (session, backend) = session_with(MockBackend::new().with_chat(chat(json!({
        "response": "Here's what I found:",
        "data": brokers(3),
        "metadata": {"encrypted": true, "he_tripwire": []}
    }))));

    let outcome = session
        .submit("Show me brokers with their contact details")
        .await
        .unwrap();
    let SubmitOutcome::Answered(id) = outcome else {
        panic!("expected an answer, got {:?}", outcome);
    };
    assert_eq!(backend.call_count(), 1);

    let messages = session.messages().unwrap();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[1].role, Role::User);
    assert_eq!(messages[2].role, Role::Assistant);

    let fragment = session.fragment(id).unwrap();
    assert!(fragment.notice.is_some());
    let table = &fragment.tables[0];
    assert_eq!(
        table.headers,
        vec!["Broker Id", "Name", "License Number", "Contact Email", "Registration Date"]
    );
    for row in &table.rows {
        assert_eq!(row[2], PROTECTED_RENDERING);
        assert_eq!(row[3], PROTECTED_RENDERING);
        assert!(row.iter().all(|cell| !cell.contains(SENTINEL_MARKER)));
    }
    // Dates match before anything else in this column set.
    assert_eq!(
        fragment.suggestions,
        vec!["Show the most recent records", "Show records from the last 30 days"]
    );
}

#[tokio::test]
async fn test_entity_tables_follow_data() {
    let (session, _) = session_with(MockBackend::new().with_chat(chat(json!({
        "response": "I found 2 matching records.",
        "entity_data": [
            {"table_name": "traders", "rows": [{"trader_id": 1, "account_balance": 50.5}]},
            {"table_name": "brokers", "rows": [{"broker_id": 9}]}
        ]
    }))));
    let SubmitOutcome::Answered(id) = session.submit("traders and brokers").await.unwrap() else {
        panic!("expected an answer");
    };
    let fragment = session.fragment(id).unwrap();
    let titles: Vec<_> = fragment.tables.iter().map(|t| t.title.clone()).collect();
    assert_eq!(titles, vec![Some("traders".to_string()), Some("brokers".to_string())]);
    // Suggestions come from the last table with rows.
    assert_eq!(fragment.suggestions, vec!["Show all traders", "List all brokers"]);
}

#[tokio::test]
async fn test_upstream_error_shows_literal_text() {
    let (session, _) = session_with(MockBackend::new().with_chat(chat(json!({
        "response": "There was an error processing your request: table missing",
        "error": true
    }))));
    let outcome = session.submit("break it").await.unwrap();
    let SubmitOutcome::UpstreamError(id) = outcome else {
        panic!("expected an upstream error, got {:?}", outcome);
    };
    let fragment = session.fragment(id).unwrap();
    assert_eq!(
        fragment.error.as_deref(),
        Some("There was an error processing your request: table missing")
    );
    assert!(fragment.suggestions.is_empty());
}

#[tokio::test]
async fn test_transport_failure_is_not_fatal() {
    let (session, backend) = session_with(MockBackend::new().unreachable("connection refused"));
    let outcome = session.submit("hello").await.unwrap();
    assert!(matches!(outcome, SubmitOutcome::Apologized(_)));
    assert_eq!(session.messages().unwrap().last().unwrap().text, APOLOGY);

    // The session keeps working and never retried on its own.
    session.submit("again").await.unwrap();
    assert_eq!(backend.call_count(), 2);
    assert_eq!(session.message_count().unwrap(), 5);
}

#[tokio::test]
async fn test_blank_input_produces_nothing() {
    let (session, backend) = session_with(MockBackend::new());
    for text in ["", "   ", "\t\n"] {
        assert_eq!(
            session.submit(text).await.unwrap(),
            SubmitOutcome::Ignored(IgnoredReason::Empty)
        );
    }
    assert_eq!(backend.call_count(), 0);
    assert_eq!(session.message_count().unwrap(), 1);
}

// =============================================================================
// Raw-query mode
// =============================================================================

#[tokio::test]
async fn test_raw_select_renders_exportable_table() {
    let rows: Vec<Value> = (1..=5).map(|i| json!({"trader_id": i, "name": "x"})).collect();
    let (session, backend) = session_with(MockBackend::new().with_raw(raw(json!({
        "success": true,
        "results": rows,
        "row_count": 5
    }))));

    let notice = session.set_mode(Mode::RawQuery).unwrap();
    assert!(notice.is_some());
    assert_eq!(session.messages().unwrap()[1].text, RAW_QUERY_NOTICE);

    let outcome = session.submit("SELECT * FROM traders LIMIT 5").await.unwrap();
    let SubmitOutcome::Answered(id) = outcome else {
        panic!("expected an answer, got {:?}", outcome);
    };
    assert_eq!(backend.requests(), vec!["SELECT * FROM traders LIMIT 5"]);

    let fragment = session.fragment(id).unwrap();
    let table = &fragment.tables[0];
    assert!(table.rows.len() <= 5);
    assert!(table.exportable);
    assert!(table.controls.is_none());

    let dir = tempfile::tempdir().unwrap();
    let path = session.export(id, 0, dir.path()).unwrap();
    let text = std::fs::read_to_string(path).unwrap();
    assert_eq!(text.lines().count(), 6);
    assert_eq!(text.lines().next(), Some("trader_id,name"));
}

#[tokio::test]
async fn test_raw_rejection_is_error_block() {
    let (session, _) = session_with(MockBackend::new().with_raw(raw(json!({
        "error": "Only SELECT queries are allowed for security reasons"
    }))));
    session.set_mode(Mode::RawQuery).unwrap();
    let outcome = session.submit("DELETE FROM traders").await.unwrap();
    let SubmitOutcome::UpstreamError(id) = outcome else {
        panic!("expected an upstream error, got {:?}", outcome);
    };
    let fragment = session.fragment(id).unwrap();
    assert_eq!(
        fragment.error.as_deref(),
        Some("Only SELECT queries are allowed for security reasons")
    );
    assert!(fragment.tables.is_empty());
}

// =============================================================================
// Paging
// =============================================================================

#[tokio::test]
async fn test_paging_the_latest_table() {
    let (session, _) = session_with(MockBackend::new().with_chat(chat(json!({
        "data": brokers(23)
    }))));
    session.submit("all brokers").await.unwrap();

    let (id, changed) = session.page_latest(PageAction::Prev).unwrap();
    assert!(!changed);
    let fragment = session.fragment(id).unwrap();
    assert_eq!(fragment.tables[0].caption, "Showing 1-10 of 23 records");

    let (_, changed) = session.page_latest(PageAction::Last).unwrap();
    assert!(changed);
    let table = session.fragment(id).unwrap().tables.remove(0);
    assert_eq!(table.rows.len(), 3);
    assert_eq!(table.caption, "Showing 21-23 of 23 records");
    let controls = table.controls.unwrap();
    assert!(!controls.next && !controls.last);

    assert!(!session.page(id, 0, PageAction::Goto(99)).unwrap());
    assert!(session.page(id, 0, PageAction::Goto(2)).unwrap());
}

// =============================================================================
// Single flight and clearing
// =============================================================================

#[tokio::test]
async fn test_second_submit_while_awaiting_is_ignored() {
    let (session, backend) = session_with(
        MockBackend::new()
            .with_chat(chat(json!({"response": "done"})))
            .with_delay(Duration::from_millis(100)),
    );

    let (first, second) = tokio::join!(session.submit("first"), async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(session.phase().unwrap(), Phase::AwaitingResponse);
        session.submit("second").await
    });

    assert!(matches!(first.unwrap(), SubmitOutcome::Answered(_)));
    assert_eq!(second.unwrap(), SubmitOutcome::Ignored(IgnoredReason::Busy));
    assert_eq!(backend.requests(), vec!["first"]);
    assert_eq!(session.message_count().unwrap(), 3);
}

#[tokio::test]
async fn test_mode_toggle_does_not_cancel_in_flight_request() {
    let (session, backend) = session_with(
        MockBackend::new()
            .with_chat(chat(json!({"response": "conversational answer"})))
            .with_delay(Duration::from_millis(60)),
    );

    let (outcome, _) = tokio::join!(session.submit("question"), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        session.set_mode(Mode::RawQuery).unwrap();
    });

    assert!(matches!(outcome.unwrap(), SubmitOutcome::Answered(_)));
    assert_eq!(backend.call_count(), 1);
    let texts: Vec<String> = session.messages().unwrap().into_iter().map(|m| m.text).collect();
    assert_eq!(
        texts,
        vec![GREETING, "question", RAW_QUERY_NOTICE, "conversational answer"]
    );
    assert_eq!(session.mode().unwrap(), Mode::RawQuery);
}

#[tokio::test]
async fn test_clear_leaves_only_greeting() {
    let (session, _) = session_with(MockBackend::new().with_chat(chat(json!({"response": "ok"}))));
    let greeting_id = session.messages().unwrap()[0].id;
    for i in 0..4 {
        session.submit(&format!("question {}", i)).await.unwrap();
    }
    session.set_mode(Mode::RawQuery).unwrap();
    assert_eq!(session.message_count().unwrap(), 10);

    session.clear().unwrap();
    let messages = session.messages().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].id, greeting_id);
    assert_eq!(messages[0].text, GREETING);
}

#[tokio::test]
async fn test_clear_drops_late_response() {
    let (session, _) = session_with(
        MockBackend::new()
            .with_chat(chat(json!({"response": "late"})))
            .with_delay(Duration::from_millis(80)),
    );

    let (outcome, _) = tokio::join!(session.submit("slow question"), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        session.clear().unwrap();
    });

    assert_eq!(outcome.unwrap(), SubmitOutcome::Discarded);
    assert_eq!(session.message_count().unwrap(), 1);
    assert_eq!(session.phase().unwrap(), Phase::Idle);
}

#[tokio::test]
async fn test_clear_keeps_session_busy_until_response_lands() {
    let (session, backend) = session_with(
        MockBackend::new()
            .with_chat(chat(json!({"response": "late"})))
            .with_delay(Duration::from_millis(200)),
    );

    let (first, second) = tokio::join!(session.submit("first"), async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        session.clear().unwrap();
        assert_eq!(session.phase().unwrap(), Phase::AwaitingResponse);
        session.submit("second").await
    });

    assert_eq!(first.unwrap(), SubmitOutcome::Discarded);
    assert_eq!(second.unwrap(), SubmitOutcome::Ignored(IgnoredReason::Busy));
    assert_eq!(backend.call_count(), 1);
    assert_eq!(session.message_count().unwrap(), 1);
    assert_eq!(session.phase().unwrap(), Phase::Idle);
}
