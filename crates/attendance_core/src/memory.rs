//! crates/attendance_core/src/memory.rs
//!
//! An in-process implementation of the `SessionStore` port.
//!
//! Every session lives behind a single `RwLock`. The guarded append holds the
//! write lock across its duplicate check and its push, which is what makes it
//! atomic with respect to other appends.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{AppendOutcome, AttendanceMark, ClassTally, NewSession, Session};
use crate::ports::{PortError, PortResult, SessionStore};

#[derive(Default)]
struct Inner {
    /// Sessions in insertion order.
    sessions: Vec<Session>,
    by_code: HashMap<String, usize>,
    by_id: HashMap<Uuid, usize>,
}

/// A `SessionStore` that keeps everything in memory. Used by tests and by the
/// API when it runs without a database.
#[derive(Default)]
pub struct InMemorySessionStore {
    inner: RwLock<Inner>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions held.
    pub async fn session_count(&self) -> usize {
        self.inner.read().await.sessions.len()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn insert_session(&self, session: NewSession) -> PortResult<Session> {
        let mut inner = self.inner.write().await;
        if inner.by_code.contains_key(&session.code) {
            return Err(PortError::Conflict(format!(
                "Session code {} already in use",
                session.code
            )));
        }

        let stored = Session {
            id: Uuid::new_v4(),
            code: session.code,
            owner_id: session.owner_id,
            class_name: session.class_name,
            created_at: session.created_at,
            attendance_records: Vec::new(),
        };
        let index = inner.sessions.len();
        inner.by_code.insert(stored.code.clone(), index);
        inner.by_id.insert(stored.id, index);
        inner.sessions.push(stored.clone());
        Ok(stored)
    }

    async fn find_session_by_code(&self, code: &str) -> PortResult<Session> {
        let inner = self.inner.read().await;
        inner
            .by_code
            .get(code)
            .map(|&index| inner.sessions[index].clone())
            .ok_or_else(|| PortError::NotFound(format!("Session {} not found", code)))
    }

    async fn append_mark_if_absent(
        &self,
        session_id: Uuid,
        mark: AttendanceMark,
    ) -> PortResult<AppendOutcome> {
        let mut inner = self.inner.write().await;
        let index = *inner
            .by_id
            .get(&session_id)
            .ok_or_else(|| PortError::NotFound(format!("Session {} not found", session_id)))?;

        let session = &mut inner.sessions[index];
        if session.has_attended(&mark.student_id) {
            return Ok(AppendOutcome::AlreadyPresent);
        }
        session.attendance_records.push(mark);
        Ok(AppendOutcome::Appended)
    }

    async fn list_sessions_by_owner(&self, owner_id: Uuid) -> PortResult<Vec<Session>> {
        let inner = self.inner.read().await;
        // Walk newest-inserted first so the stable sort keeps that order on ties.
        let mut sessions: Vec<Session> = inner
            .sessions
            .iter()
            .rev()
            .filter(|s| s.owner_id == owner_id)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }

    async fn class_tally(&self, class_name: &str, student_id: &str) -> PortResult<ClassTally> {
        let inner = self.inner.read().await;
        let tally = inner
            .sessions
            .iter()
            .filter(|s| s.class_name == class_name)
            .fold(ClassTally::default(), |mut tally, s| {
                tally.total += 1;
                if s.has_attended(student_id) {
                    tally.attended += 1;
                }
                tally
            });
        Ok(tally)
    }
}
