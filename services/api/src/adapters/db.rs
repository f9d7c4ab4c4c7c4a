//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `SessionStore` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use attendance_core::domain::{
    AppendOutcome, AttendanceMark, ClassTally, GeoPoint, NewSession, Session,
};
use attendance_core::ports::{PortError, PortResult, SessionStore};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `SessionStore` port.
#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    /// Creates a new `PgSessionStore`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    async fn marks_for_sessions(
        &self,
        session_ids: &[Uuid],
    ) -> PortResult<HashMap<Uuid, Vec<AttendanceMark>>> {
        if session_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let records = sqlx::query_as::<_, MarkRecord>(
            "SELECT session_id, student_id, student_name, latitude, longitude, marked_at \
             FROM attendance_marks WHERE session_id = ANY($1) ORDER BY seq ASC",
        )
        .bind(session_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error(e, "attendance marks"))?;

        let mut grouped: HashMap<Uuid, Vec<AttendanceMark>> = HashMap::new();
        for record in records {
            grouped
                .entry(record.session_id)
                .or_default()
                .push(record.to_domain());
        }
        Ok(grouped)
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct SessionRecord {
    id: Uuid,
    code: String,
    owner_id: Uuid,
    class_name: String,
    created_at: DateTime<Utc>,
}
impl SessionRecord {
    fn to_domain(self, attendance_records: Vec<AttendanceMark>) -> Session {
        Session {
            id: self.id,
            code: self.code,
            owner_id: self.owner_id,
            class_name: self.class_name,
            created_at: self.created_at,
            attendance_records,
        }
    }
}

#[derive(FromRow)]
struct MarkRecord {
    session_id: Uuid,
    student_id: String,
    student_name: String,
    latitude: Option<f64>,
    longitude: Option<f64>,
    marked_at: DateTime<Utc>,
}
impl MarkRecord {
    fn to_domain(self) -> AttendanceMark {
        let location = match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => Some(GeoPoint { lat, lng }),
            _ => None,
        };
        AttendanceMark {
            student_id: self.student_id,
            student_name: self.student_name,
            location,
            marked_at: self.marked_at,
        }
    }
}

#[derive(FromRow)]
struct TallyRecord {
    total: i64,
    attended: i64,
}

/// Translates a `sqlx` failure into the port's error vocabulary.
fn map_sqlx_error(e: sqlx::Error, what: &str) -> PortError {
    match e {
        sqlx::Error::RowNotFound => PortError::NotFound(format!("{} not found", what)),
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            PortError::Conflict(format!("{}: {}", what, db.message()))
        }
        sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => {
            PortError::NotFound(format!("{} references a missing row", what))
        }
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            PortError::Unavailable(e.to_string())
        }
        _ => PortError::Unexpected(e.to_string()),
    }
}

//=========================================================================================
// `SessionStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn insert_session(&self, session: NewSession) -> PortResult<Session> {
        // The UNIQUE constraint on `code` is the collision check.
        let record = sqlx::query_as::<_, SessionRecord>(
            "INSERT INTO attendance_sessions (id, code, owner_id, class_name, created_at) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, code, owner_id, class_name, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(&session.code)
        .bind(session.owner_id)
        .bind(&session.class_name)
        .bind(session.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error(e, &format!("Session code {}", session.code)))?;

        Ok(record.to_domain(Vec::new()))
    }

    async fn find_session_by_code(&self, code: &str) -> PortResult<Session> {
        let record = sqlx::query_as::<_, SessionRecord>(
            "SELECT id, code, owner_id, class_name, created_at \
             FROM attendance_sessions WHERE code = $1",
        )
        .bind(code)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error(e, &format!("Session {}", code)))?;

        let mut marks = self.marks_for_sessions(&[record.id]).await?;
        let roster = marks.remove(&record.id).unwrap_or_default();
        Ok(record.to_domain(roster))
    }

    async fn append_mark_if_absent(
        &self,
        session_id: Uuid,
        mark: AttendanceMark,
    ) -> PortResult<AppendOutcome> {
        // A single conditional insert: the (session_id, student_id) constraint
        // turns a second check-in into a no-op instead of a second row.
        let result = sqlx::query(
            "INSERT INTO attendance_marks \
             (session_id, student_id, student_name, latitude, longitude, marked_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT ON CONSTRAINT attendance_marks_one_per_student DO NOTHING",
        )
        .bind(session_id)
        .bind(&mark.student_id)
        .bind(&mark.student_name)
        .bind(mark.location.map(|p| p.lat))
        .bind(mark.location.map(|p| p.lng))
        .bind(mark.marked_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error(e, &format!("Session {}", session_id)))?;

        if result.rows_affected() == 0 {
            debug!(%session_id, student_id = %mark.student_id, "Mark already present");
            Ok(AppendOutcome::AlreadyPresent)
        } else {
            Ok(AppendOutcome::Appended)
        }
    }

    async fn list_sessions_by_owner(&self, owner_id: Uuid) -> PortResult<Vec<Session>> {
        let records = sqlx::query_as::<_, SessionRecord>(
            "SELECT id, code, owner_id, class_name, created_at \
             FROM attendance_sessions WHERE owner_id = $1 \
             ORDER BY created_at DESC, seq DESC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error(e, "Sessions"))?;

        let ids: Vec<Uuid> = records.iter().map(|r| r.id).collect();
        let mut marks = self.marks_for_sessions(&ids).await?;

        let sessions = records
            .into_iter()
            .map(|r| {
                let roster = marks.remove(&r.id).unwrap_or_default();
                r.to_domain(roster)
            })
            .collect();
        Ok(sessions)
    }

    async fn class_tally(&self, class_name: &str, student_id: &str) -> PortResult<ClassTally> {
        let record = sqlx::query_as::<_, TallyRecord>(
            "SELECT COUNT(*) AS total, \
                    COUNT(*) FILTER (WHERE EXISTS ( \
                        SELECT 1 FROM attendance_marks m \
                        WHERE m.session_id = s.id AND m.student_id = $2)) AS attended \
             FROM attendance_sessions s WHERE s.class_name = $1",
        )
        .bind(class_name)
        .bind(student_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error(e, "Class tally"))?;

        Ok(ClassTally {
            total: record.total.max(0) as u64,
            attended: record.attended.max(0) as u64,
        })
    }
}
