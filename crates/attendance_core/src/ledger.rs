//! crates/attendance_core/src/ledger.rs
//!
//! The session ledger: mints session codes, records check-ins and answers
//! roster and attendance-rate queries. All state lives behind the injected
//! `SessionStore`.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::code::{
    is_well_formed, normalize_code, CodeSource, RandomCodeSource, CODE_LEN, FALLBACK_CODE_LEN,
};
use crate::domain::{AppendOutcome, AttendanceMark, GeoPoint, NewSession, Session};
use crate::ports::{PortError, SessionStore};

/// Attempts made at each code length before giving up on it.
pub const CODE_ATTEMPTS: usize = 5;

/// Errors surfaced by ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Missing or malformed input. Nothing was persisted.
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("No session matches code {0}")]
    SessionNotFound(String),

    /// The student is already on the roster. Not worth retrying.
    #[error("{student_id} has already been marked present for session {code}")]
    DuplicateAttendance { code: String, student_id: String },

    /// Storage could not be reached, or the code retry budget ran out.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Internal ledger error: {0}")]
    Internal(String),
}

impl From<PortError> for LedgerError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound(what) => LedgerError::SessionNotFound(what),
            PortError::Unavailable(msg) => LedgerError::Unavailable(msg),
            PortError::Conflict(msg) | PortError::Unexpected(msg) => LedgerError::Internal(msg),
        }
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Coordinates session creation and attendance marking over a `SessionStore`.
#[derive(Clone)]
pub struct SessionLedger {
    store: Arc<dyn SessionStore>,
    codes: Arc<dyn CodeSource>,
}

impl SessionLedger {
    /// Creates a ledger that draws codes from the thread-local RNG.
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self::with_code_source(store, Arc::new(RandomCodeSource))
    }

    pub fn with_code_source(store: Arc<dyn SessionStore>, codes: Arc<dyn CodeSource>) -> Self {
        Self { store, codes }
    }

    /// Opens a new attendance session for `class_name` and returns it with its code.
    ///
    /// Codes are checked for uniqueness by the store at write time. A collision
    /// is retried with a fresh draw, first at [`CODE_LEN`] and then at
    /// [`FALLBACK_CODE_LEN`], [`CODE_ATTEMPTS`] times each.
    pub async fn create_session(&self, owner_id: Uuid, class_name: &str) -> LedgerResult<Session> {
        let class_name = class_name.trim();
        if class_name.is_empty() {
            return Err(LedgerError::Validation("class name must not be empty".to_string()));
        }

        for len in [CODE_LEN, FALLBACK_CODE_LEN] {
            for attempt in 1..=CODE_ATTEMPTS {
                let code = self.codes.draw(len);
                let candidate = NewSession {
                    code,
                    owner_id,
                    class_name: class_name.to_string(),
                    created_at: Utc::now(),
                };

                match self.store.insert_session(candidate).await {
                    Ok(session) => {
                        info!(
                            session_id = %session.id,
                            owner_id = %owner_id,
                            class_name = %session.class_name,
                            "Attendance session created"
                        );
                        return Ok(session);
                    }
                    Err(PortError::Conflict(reason)) => {
                        debug!(attempt, len, %reason, "Session code collided, drawing again");
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            warn!(len, attempts = CODE_ATTEMPTS, "Exhausted session code attempts at this length");
        }

        Err(LedgerError::Unavailable(
            "could not allocate a unique session code".to_string(),
        ))
    }

    /// Records that `student_id` is present in the session identified by `code`.
    ///
    /// The duplicate check and the append happen in a single store call, so
    /// concurrent redemptions by the same student yield exactly one success.
    pub async fn mark_attendance(
        &self,
        code: &str,
        student_id: &str,
        student_name: &str,
        location: Option<GeoPoint>,
    ) -> LedgerResult<()> {
        let code = normalize_code(code);
        let student_id = student_id.trim();
        let student_name = student_name.trim();
        if code.is_empty() {
            return Err(LedgerError::Validation("session code must not be empty".to_string()));
        }
        if student_id.is_empty() || student_name.is_empty() {
            return Err(LedgerError::Validation(
                "student id and name must not be empty".to_string(),
            ));
        }
        if let Some(point) = location {
            if !point.is_valid() {
                return Err(LedgerError::Validation("location is out of range".to_string()));
            }
        }

        let session = self.resolve(&code).await?;
        let mark = AttendanceMark {
            student_id: student_id.to_string(),
            student_name: student_name.to_string(),
            location,
            marked_at: Utc::now(),
        };

        match self.store.append_mark_if_absent(session.id, mark).await? {
            AppendOutcome::Appended => {
                info!(session_id = %session.id, student_id, "Attendance marked");
                Ok(())
            }
            AppendOutcome::AlreadyPresent => {
                debug!(session_id = %session.id, student_id, "Duplicate check-in rejected");
                Err(LedgerError::DuplicateAttendance {
                    code,
                    student_id: student_id.to_string(),
                })
            }
        }
    }

    /// Percentage (0-100) of `class_name` sessions that `student_id` attended.
    pub async fn attendance_rate(&self, student_id: &str, class_name: &str) -> LedgerResult<u8> {
        let tally = self
            .store
            .class_tally(class_name.trim(), student_id.trim())
            .await?;
        Ok(tally.percentage())
    }

    /// Every session `owner_id` has created, newest first.
    pub async fn sessions_for_owner(&self, owner_id: Uuid) -> LedgerResult<Vec<Session>> {
        Ok(self.store.list_sessions_by_owner(owner_id).await?)
    }

    /// The session behind `code` with its full, ordered roster.
    pub async fn session_roster(&self, code: &str) -> LedgerResult<Session> {
        let code = normalize_code(code);
        if code.is_empty() {
            return Err(LedgerError::Validation("session code must not be empty".to_string()));
        }
        self.resolve(&code).await
    }

    async fn resolve(&self, code: &str) -> LedgerResult<Session> {
        // The ledger never issues anything else, so skip the store round trip.
        if !is_well_formed(code) {
            return Err(LedgerError::SessionNotFound(code.to_string()));
        }
        self.store.find_session_by_code(code).await.map_err(|e| match e {
            PortError::NotFound(_) => LedgerError::SessionNotFound(code.to_string()),
            other => other.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemorySessionStore;
    use std::sync::Mutex;

    /// Hands out a scripted sequence of codes, then repeats the last one.
    struct ScriptedCodes(Mutex<Vec<String>>);

    impl ScriptedCodes {
        fn new(codes: &[&str]) -> Self {
            Self(Mutex::new(codes.iter().rev().map(|c| c.to_string()).collect()))
        }
    }

    impl CodeSource for ScriptedCodes {
        fn draw(&self, len: usize) -> String {
            let mut codes = self.0.lock().unwrap();
            let code = if codes.len() > 1 { codes.pop().unwrap() } else { codes[0].clone() };
            assert_eq!(code.len(), len, "scripted code has unexpected length");
            code
        }
    }

    /// Always hands out the same code, whatever length is asked for.
    struct ConstantCodes;

    impl CodeSource for ConstantCodes {
        fn draw(&self, len: usize) -> String {
            "A".repeat(len)
        }
    }

    /// Counts how many inserts the ledger attempted.
    struct CountingStore {
        inner: InMemorySessionStore,
        inserts: Mutex<usize>,
    }

    #[async_trait::async_trait]
    impl SessionStore for CountingStore {
        async fn insert_session(&self, session: NewSession) -> crate::ports::PortResult<Session> {
            *self.inserts.lock().unwrap() += 1;
            self.inner.insert_session(session).await
        }
        async fn find_session_by_code(&self, code: &str) -> crate::ports::PortResult<Session> {
            self.inner.find_session_by_code(code).await
        }
        async fn append_mark_if_absent(
            &self,
            session_id: Uuid,
            mark: AttendanceMark,
        ) -> crate::ports::PortResult<AppendOutcome> {
            self.inner.append_mark_if_absent(session_id, mark).await
        }
        async fn list_sessions_by_owner(&self, owner_id: Uuid) -> crate::ports::PortResult<Vec<Session>> {
            self.inner.list_sessions_by_owner(owner_id).await
        }
        async fn class_tally(
            &self,
            class_name: &str,
            student_id: &str,
        ) -> crate::ports::PortResult<crate::domain::ClassTally> {
            self.inner.class_tally(class_name, student_id).await
        }
    }

    fn ledger() -> SessionLedger {
        SessionLedger::new(Arc::new(InMemorySessionStore::new()))
    }

    #[tokio::test]
    async fn create_session_issues_well_formed_code() {
        let ledger = ledger();
        let owner = Uuid::new_v4();
        let session = ledger.create_session(owner, "  Biology101 ").await.unwrap();

        assert_eq!(session.code.len(), CODE_LEN);
        assert!(is_well_formed(&session.code));
        assert_eq!(session.owner_id, owner);
        assert_eq!(session.class_name, "Biology101");
        assert!(session.attendance_records.is_empty());
    }

    #[tokio::test]
    async fn create_session_rejects_blank_class_name() {
        let err = ledger().create_session(Uuid::new_v4(), "   ").await.unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[tokio::test]
    async fn collisions_retry_with_a_fresh_code() {
        let store = Arc::new(InMemorySessionStore::new());
        let codes = Arc::new(ScriptedCodes::new(&["AAAAAA", "AAAAAA", "BBBBBB"]));
        let ledger = SessionLedger::with_code_source(store.clone(), codes);

        let first = ledger.create_session(Uuid::new_v4(), "Math").await.unwrap();
        let second = ledger.create_session(Uuid::new_v4(), "Math").await.unwrap();

        assert_eq!(first.code, "AAAAAA");
        assert_eq!(second.code, "BBBBBB");
        assert_eq!(store.session_count().await, 2);
    }

    #[tokio::test]
    async fn exhausted_short_codes_fall_back_to_longer_ones() {
        let store = Arc::new(InMemorySessionStore::new());
        let mut script = vec!["AAAAAA"; CODE_ATTEMPTS + 1];
        script.push("0123ABCD");
        let ledger =
            SessionLedger::with_code_source(store.clone(), Arc::new(ScriptedCodes::new(&script)));

        ledger.create_session(Uuid::new_v4(), "Math").await.unwrap();
        let fallback = ledger.create_session(Uuid::new_v4(), "Math").await.unwrap();

        assert_eq!(fallback.code, "0123ABCD");
        assert_eq!(fallback.code.len(), FALLBACK_CODE_LEN);
    }

    #[tokio::test]
    async fn every_length_exhausted_is_unavailable() {
        let store = Arc::new(CountingStore {
            inner: InMemorySessionStore::new(),
            inserts: Mutex::new(0),
        });
        let ledger = SessionLedger::with_code_source(store.clone(), Arc::new(ConstantCodes));

        let short = ledger.create_session(Uuid::new_v4(), "Math").await.unwrap();
        let long = ledger.create_session(Uuid::new_v4(), "Math").await.unwrap();
        assert_eq!(short.code, "AAAAAA");
        assert_eq!(long.code, "AAAAAAAA");
        *store.inserts.lock().unwrap() = 0;

        let err = ledger.create_session(Uuid::new_v4(), "Math").await.unwrap_err();
        assert!(matches!(err, LedgerError::Unavailable(_)));
        assert_eq!(*store.inserts.lock().unwrap(), 2 * CODE_ATTEMPTS);
        assert_eq!(store.inner.session_count().await, 2);
    }

    #[tokio::test]
    async fn malformed_code_is_not_found_without_lookup() {
        let ledger = ledger();
        let err = ledger.session_roster("not-a-code").await.unwrap_err();
        assert!(matches!(err, LedgerError::SessionNotFound(ref code) if code == "NOT-A-CODE"));
    }

    #[tokio::test]
    async fn mark_attendance_normalizes_code_and_rejects_duplicates() {
        let ledger = ledger();
        let session = ledger.create_session(Uuid::new_v4(), "Math").await.unwrap();
        let typed = format!(" {} ", session.code.to_lowercase());

        ledger.mark_attendance(&typed, "r-17", "Asha", None).await.unwrap();
        let err = ledger
            .mark_attendance(&session.code, "r-17", "Asha", None)
            .await
            .unwrap_err();

        assert!(matches!(err, LedgerError::DuplicateAttendance { ref student_id, .. } if student_id == "r-17"));
        let roster = ledger.session_roster(&session.code).await.unwrap();
        assert_eq!(roster.attendee_count(), 1);
    }

    #[tokio::test]
    async fn mark_attendance_validates_input() {
        let ledger = ledger();
        let session = ledger.create_session(Uuid::new_v4(), "Math").await.unwrap();

        for (code, id, name) in [("", "r-1", "A"), (session.code.as_str(), " ", "A"), (session.code.as_str(), "r-1", "")] {
            let err = ledger.mark_attendance(code, id, name, None).await.unwrap_err();
            assert!(matches!(err, LedgerError::Validation(_)), "{code:?} {id:?} {name:?}");
        }

        let far_away = GeoPoint { lat: 120.0, lng: 0.0 };
        let err = ledger
            .mark_attendance(&session.code, "r-1", "A", Some(far_away))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
        assert_eq!(ledger.session_roster(&session.code).await.unwrap().attendee_count(), 0);
    }

    #[tokio::test]
    async fn unknown_code_is_session_not_found() {
        let err = ledger()
            .mark_attendance("ZZZZZZ", "r-1", "Asha", None)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::SessionNotFound(ref code) if code == "ZZZZZZ"));
    }

    #[tokio::test]
    async fn roster_keeps_check_in_order_and_location() {
        let ledger = ledger();
        let session = ledger.create_session(Uuid::new_v4(), "Math").await.unwrap();
        let spot = GeoPoint { lat: 23.81, lng: 90.41 };

        ledger.mark_attendance(&session.code, "r-2", "Bo", Some(spot)).await.unwrap();
        ledger.mark_attendance(&session.code, "r-1", "Asha", None).await.unwrap();

        let roster = ledger.session_roster(&session.code).await.unwrap();
        let names: Vec<_> = roster.attendance_records.iter().map(|m| m.student_name.as_str()).collect();
        assert_eq!(names, ["Bo", "Asha"]);
        assert_eq!(roster.attendance_records[0].location, Some(spot));
    }
}
