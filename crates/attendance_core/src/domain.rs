//! crates/attendance_core/src/domain.rs
//!
//! Defines the pure, core data structures for the attendance ledger.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// One teacher-initiated attendance window for a named class.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: Uuid,
    /// The one-time code shown to students. Always uppercase.
    pub code: String,
    pub owner_id: Uuid,
    pub class_name: String,
    pub created_at: DateTime<Utc>,
    /// Check-ins in the order they were recorded.
    pub attendance_records: Vec<AttendanceMark>,
}

impl Session {
    pub fn has_attended(&self, student_id: &str) -> bool {
        self.attendance_records
            .iter()
            .any(|mark| mark.student_id == student_id)
    }

    pub fn attendee_count(&self) -> usize {
        self.attendance_records.len()
    }
}

/// The fields a store needs to persist a brand new session.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub code: String,
    pub owner_id: Uuid,
    pub class_name: String,
    pub created_at: DateTime<Utc>,
}

/// One student's check-in against a session.
#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceMark {
    pub student_id: String,
    /// Display name captured at check-in time, never re-read from a user record.
    pub student_name: String,
    pub location: Option<GeoPoint>,
    pub marked_at: DateTime<Utc>,
}

/// Where the student reported being when they checked in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

// Result of a guarded append
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended,
    AlreadyPresent,
}

/// Session counts for one class, as seen by one student.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassTally {
    pub total: u64,
    pub attended: u64,
}

impl ClassTally {
    /// Whole-number percentage, rounding halves up. Zero when no sessions exist.
    pub fn percentage(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        let attended = self.attended.min(self.total);
        ((200 * attended + self.total) / (2 * self.total)) as u8
    }
}
