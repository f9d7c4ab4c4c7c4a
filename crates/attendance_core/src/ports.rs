//! crates/attendance_core/src/ports.rs
//!
//! Defines the storage contract for the attendance ledger.
//! This trait forms the boundary of the hexagonal architecture, allowing the core
//! to be independent of the concrete persistence layer.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{AppendOutcome, AttendanceMark, ClassTally, NewSession, Session};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from the storage backend.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Uniqueness conflict: {0}")]
    Conflict(String),
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persists a new session with an empty roster.
    ///
    /// Must fail with [`PortError::Conflict`] when `code` is already taken. The
    /// check happens at write time, so concurrent inserts of one code cannot
    /// both succeed.
    async fn insert_session(&self, session: NewSession) -> PortResult<Session>;

    /// Resolves an (already normalized) code to its session, roster included.
    async fn find_session_by_code(&self, code: &str) -> PortResult<Session>;

    /// Appends `mark` unless the session already holds a mark for the same
    /// student. The check and the append are one atomic step.
    async fn append_mark_if_absent(
        &self,
        session_id: Uuid,
        mark: AttendanceMark,
    ) -> PortResult<AppendOutcome>;

    /// All sessions created by `owner_id`, newest first.
    async fn list_sessions_by_owner(&self, owner_id: Uuid) -> PortResult<Vec<Session>>;

    /// Counts sessions for `class_name` and how many of them `student_id` attended.
    async fn class_tally(&self, class_name: &str, student_id: &str) -> PortResult<ClassTally>;
}
