//! Tests for the Postgres `SessionStore` adapter.
//!
//! These need a reachable database: run with
//! `DATABASE_URL=postgres://... cargo test -p attendance_api -- --ignored`.
//! `sqlx::test` creates a fresh database per test and applies `./migrations`.

use api_lib::adapters::PgSessionStore;
use attendance_core::{
    AppendOutcome, AttendanceMark, GeoPoint, NewSession, PortError, SessionLedger, SessionStore,
};
use chrono::{Duration, Utc};
use futures::future::join_all;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

fn new_session(code: &str, owner_id: Uuid, class_name: &str) -> NewSession {
    NewSession {
        code: code.to_string(),
        owner_id,
        class_name: class_name.to_string(),
        created_at: Utc::now(),
    }
}

fn mark(student_id: &str, location: Option<GeoPoint>) -> AttendanceMark {
    AttendanceMark {
        student_id: student_id.to_string(),
        student_name: format!("Student {student_id}"),
        location,
        marked_at: Utc::now(),
    }
}

#[ignore = "requires DATABASE_URL"]
#[sqlx::test(migrations = "./migrations")]
async fn taken_code_is_a_conflict(pool: PgPool) {
    let store = PgSessionStore::new(pool);
    let owner = Uuid::new_v4();
    store.insert_session(new_session("ABC123", owner, "Math")).await.unwrap();

    let err = store
        .insert_session(new_session("ABC123", owner, "Physics"))
        .await
        .unwrap_err();
    assert!(matches!(err, PortError::Conflict(_)));
}

#[ignore = "requires DATABASE_URL"]
#[sqlx::test(migrations = "./migrations")]
async fn duplicate_append_is_already_present(pool: PgPool) {
    let store = PgSessionStore::new(pool);
    let session = store
        .insert_session(new_session("ABC123", Uuid::new_v4(), "Math"))
        .await
        .unwrap();
    let spot = GeoPoint { lat: 23.81, lng: 90.41 };

    let first = store.append_mark_if_absent(session.id, mark("r-1", Some(spot))).await.unwrap();
    let again = store.append_mark_if_absent(session.id, mark("r-1", None)).await.unwrap();
    let other = store.append_mark_if_absent(session.id, mark("r-2", None)).await.unwrap();
    assert_eq!(first, AppendOutcome::Appended);
    assert_eq!(again, AppendOutcome::AlreadyPresent);
    assert_eq!(other, AppendOutcome::Appended);

    let stored = store.find_session_by_code("ABC123").await.unwrap();
    let ids: Vec<_> = stored.attendance_records.iter().map(|m| m.student_id.as_str()).collect();
    assert_eq!(ids, ["r-1", "r-2"]);
    assert_eq!(stored.attendance_records[0].location, Some(spot));
}

#[ignore = "requires DATABASE_URL"]
#[sqlx::test(migrations = "./migrations")]
async fn append_to_missing_session_is_not_found(pool: PgPool) {
    let store = PgSessionStore::new(pool);
    let err = store
        .append_mark_if_absent(Uuid::new_v4(), mark("r-1", None))
        .await
        .unwrap_err();
    assert!(matches!(err, PortError::NotFound(_)));
}

#[ignore = "requires DATABASE_URL"]
#[sqlx::test(migrations = "./migrations")]
async fn concurrent_same_student_appends_land_once(pool: PgPool) {
    let store = Arc::new(PgSessionStore::new(pool));
    let session = store
        .insert_session(new_session("ABC123", Uuid::new_v4(), "Math"))
        .await
        .unwrap();

    let outcomes = join_all((0..16).map(|_| {
        let store = store.clone();
        async move { store.append_mark_if_absent(session.id, mark("r-9", None)).await.unwrap() }
    }))
    .await;

    let appended = outcomes.iter().filter(|o| **o == AppendOutcome::Appended).count();
    assert_eq!(appended, 1);
    let stored = store.find_session_by_code("ABC123").await.unwrap();
    assert_eq!(stored.attendance_records.len(), 1);
}

#[ignore = "requires DATABASE_URL"]
#[sqlx::test(migrations = "./migrations")]
async fn tally_counts_two_of_three(pool: PgPool) {
    let store = Arc::new(PgSessionStore::new(pool));
    let ledger = SessionLedger::new(store.clone());
    let teacher = Uuid::new_v4();

    let mut codes = Vec::new();
    for _ in 0..3 {
        codes.push(ledger.create_session(teacher, "Biology101").await.unwrap().code);
    }
    let other = ledger.create_session(teacher, "Chemistry").await.unwrap();
    ledger.mark_attendance(&other.code, "s-1", "Nadia", None).await.unwrap();
    ledger.mark_attendance(&codes[0], "s-1", "Nadia", None).await.unwrap();
    ledger.mark_attendance(&codes[2], "s-1", "Nadia", None).await.unwrap();

    let tally = store.class_tally("Biology101", "s-1").await.unwrap();
    assert_eq!((tally.total, tally.attended), (3, 2));
    assert_eq!(ledger.attendance_rate("s-1", "Biology101").await.unwrap(), 67);
    assert_eq!(ledger.attendance_rate("s-1", "Astronomy").await.unwrap(), 0);
}

#[ignore = "requires DATABASE_URL"]
#[sqlx::test(migrations = "./migrations")]
async fn owner_listing_is_newest_first(pool: PgPool) {
    let store = PgSessionStore::new(pool);
    let owner = Uuid::new_v4();
    let now = Utc::now();
    for (code, age) in [("AAAAAA", 3), ("BBBBBB", 1), ("CCCCCC", 2)] {
        let mut s = new_session(code, owner, "Math");
        s.created_at = now - Duration::minutes(age);
        store.insert_session(s).await.unwrap();
    }
    store
        .insert_session(new_session("DDDDDD", Uuid::new_v4(), "Math"))
        .await
        .unwrap();

    let codes: Vec<_> = store
        .list_sessions_by_owner(owner)
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.code)
        .collect();
    assert_eq!(codes, ["BBBBBB", "CCCCCC", "AAAAAA"]);
}
