//! services/api/src/web/attendance.rs
//!
//! Student-facing endpoints: redeeming a session code and reading attendance rates.

use crate::error::{ApiError, ErrorBody};
use crate::web::middleware::{Principal, Role};
use crate::web::state::AppState;
use attendance_core::GeoPoint;
use crate::web::extract::{ApiJson, ApiQuery};
use axum::{extract::State, response::Json, Extension};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, Serialize, ToSchema, Clone, Copy, Debug, PartialEq)]
pub struct LocationPayload {
    pub lat: f64,
    pub lng: f64,
}

impl From<GeoPoint> for LocationPayload {
    fn from(point: GeoPoint) -> Self {
        Self { lat: point.lat, lng: point.lng }
    }
}

impl From<LocationPayload> for GeoPoint {
    fn from(payload: LocationPayload) -> Self {
        Self { lat: payload.lat, lng: payload.lng }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct MarkAttendanceRequest {
    /// The code the teacher shared. Case and surrounding whitespace are ignored.
    pub code: String,
    pub student_name: String,
    #[serde(default)]
    pub location: Option<LocationPayload>,
}

#[derive(Serialize, ToSchema)]
pub struct MarkAttendanceResponse {
    pub message: String,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AttendanceRateQuery {
    pub class_name: String,
    /// Required for teachers; ignored for students, who always see their own rate.
    pub student_id: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct AttendanceRateResponse {
    pub student_id: String,
    pub class_name: String,
    /// Whole-number percentage from 0 to 100.
    pub percentage: u8,
}

/// Mark the calling student present using a session code.
#[utoipa::path(
    post,
    path = "/attendance",
    request_body = MarkAttendanceRequest,
    responses(
        (status = 200, description = "Attendance marked", body = MarkAttendanceResponse),
        (status = 400, description = "Missing code or name", body = ErrorBody),
        (status = 404, description = "No session has this code", body = ErrorBody),
        (status = 409, description = "Already marked present for this session", body = ErrorBody)
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user."),
        ("x-user-role" = String, Header, description = "Must be `student`.")
    )
)]
pub async fn mark_attendance_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    ApiJson(req): ApiJson<MarkAttendanceRequest>,
) -> Result<Json<MarkAttendanceResponse>, ApiError> {
    principal.require(Role::Student)?;

    app_state
        .ledger
        .mark_attendance(
            &req.code,
            &principal.user_id.to_string(),
            &req.student_name,
            req.location.map(GeoPoint::from),
        )
        .await?;

    Ok(Json(MarkAttendanceResponse {
        message: "Attendance marked".to_string(),
    }))
}

/// Percentage of a class's sessions a student attended.
#[utoipa::path(
    get,
    path = "/attendance/rate",
    params(
        AttendanceRateQuery,
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user."),
        ("x-user-role" = String, Header, description = "`student` or `teacher`.")
    ),
    responses(
        (status = 200, description = "Attendance rate", body = AttendanceRateResponse),
        (status = 400, description = "Missing class name, or a teacher did not name a student", body = ErrorBody)
    )
)]
pub async fn attendance_rate_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    ApiQuery(query): ApiQuery<AttendanceRateQuery>,
) -> Result<Json<AttendanceRateResponse>, ApiError> {
    let student_id = match principal.role {
        Role::Student => principal.user_id.to_string(),
        Role::Teacher => query
            .student_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| ApiError::BadRequest("student_id is required".to_string()))?,
    };

    let percentage = app_state
        .ledger
        .attendance_rate(&student_id, &query.class_name)
        .await?;

    Ok(Json(AttendanceRateResponse {
        student_id,
        class_name: query.class_name.trim().to_string(),
        percentage,
    }))
}
