use super::AuditEventRepository;
use crate::domain::audit::{AuditEvent, AuditEventType};
use chrono::{Duration, TimeZone, Utc};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

fn setup_test_db() -> Arc<Mutex<Connection>> {
    let conn = crate::db::open_in_memory().unwrap();
    conn.execute(
        "INSERT INTO job (job_id, order_no, customer, part_count, state, opti_mode, created_at, updated_at)
         VALUES ('O1', 'SIP-1', 'ACME', 2, 'NEW', 'A', 'x', 'x'),
                ('O2', 'SIP-2', 'ACME', 1, 'NEW', 'A', 'x', 'x')",
        [],
    )
    .unwrap();
    Arc::new(Mutex::new(conn))
}

fn make_event(job_id: &str, event_type: AuditEventType, minute: i64) -> AuditEvent {
    let base = Utc.with_ymd_and_hms(2025, 1, 15, 8, 0, 0).unwrap();
    AuditEvent::new(
        job_id,
        event_type,
        format!("{} at +{}m", event_type.as_str(), minute),
        base + Duration::minutes(minute),
    )
}

#[test]
fn test_insert_and_find_by_id() {
    let repo = AuditEventRepository::new(setup_test_db());

    let event = make_event("O1", AuditEventType::JobCreated, 0)
        .with_details(&serde_json::json!({ "orderNo": "SIP-1" }));
    let id = repo.insert(&event).unwrap();

    let found = repo.find_by_id(&id).unwrap().unwrap();
    assert_eq!(found, event);
    assert!(repo.find_by_id("missing").unwrap().is_none());
}

#[test]
fn test_find_by_job_id_is_oldest_first() {
    let repo = AuditEventRepository::new(setup_test_db());

    repo.insert(&make_event("O1", AuditEventType::StateChanged, 5)).unwrap();
    repo.insert(&make_event("O1", AuditEventType::JobCreated, 0)).unwrap();
    repo.insert(&make_event("O2", AuditEventType::JobCreated, 1)).unwrap();

    let events = repo.find_by_job_id("O1").unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].event_type, "JOB_CREATED");
    assert_eq!(events[1].event_type, "STATE_CHANGED");
    assert_eq!(repo.count_by_job("O1").unwrap(), 2);
}

#[test]
fn test_same_timestamp_keeps_insertion_order() {
    let repo = AuditEventRepository::new(setup_test_db());

    let first = make_event("O1", AuditEventType::ScanAccepted, 3);
    let second = make_event("O1", AuditEventType::StateChanged, 3);
    repo.insert(&first).unwrap();
    repo.insert(&second).unwrap();

    let events = repo.find_by_job_id("O1").unwrap();
    assert_eq!(events[0].id, first.id);
    assert_eq!(events[1].id, second.id);
}

#[test]
fn test_find_by_job_and_type() {
    let repo = AuditEventRepository::new(setup_test_db());

    repo.insert(&make_event("O1", AuditEventType::OperatorRetry, 1)).unwrap();
    repo.insert(&make_event("O1", AuditEventType::JobFailed, 2)).unwrap();
    repo.insert(&make_event("O1", AuditEventType::OperatorRetry, 3)).unwrap();

    let retries = repo.find_by_job_and_type("O1", "OPERATOR_RETRY").unwrap();
    assert_eq!(retries.len(), 2);
}

#[test]
fn test_find_recent_is_newest_first() {
    let repo = AuditEventRepository::new(setup_test_db());

    for minute in 0..5 {
        repo.insert(&make_event("O1", AuditEventType::ScanAccepted, minute)).unwrap();
    }

    let recent = repo.find_recent(2).unwrap();
    assert_eq!(recent.len(), 2);
    assert!(recent[0].created_at > recent[1].created_at);
}

#[test]
fn test_insert_requires_existing_job() {
    let repo = AuditEventRepository::new(setup_test_db());
    let result = repo.insert(&make_event("NOPE", AuditEventType::JobCreated, 0));
    assert!(result.is_err());
}
