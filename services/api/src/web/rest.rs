//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the teacher-facing session endpoints and the
//! master definition for the OpenAPI specification.

use crate::error::{ApiError, ErrorBody};
use crate::web::attendance::{
    AttendanceRateResponse, LocationPayload, MarkAttendanceRequest, MarkAttendanceResponse,
};
use crate::web::extract::ApiJson;
use crate::web::middleware::{Principal, Role};
use crate::web::state::AppState;
use attendance_core::{AttendanceMark, Session};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        create_session_handler,
        list_sessions_handler,
        session_roster_handler,
        crate::web::attendance::mark_attendance_handler,
        crate::web::attendance::attendance_rate_handler,
    ),
    components(
        schemas(
            CreateSessionRequest,
            CreateSessionResponse,
            SessionSummary,
            RosterResponse,
            AttendeeView,
            LocationPayload,
            MarkAttendanceRequest,
            MarkAttendanceResponse,
            AttendanceRateResponse,
            ErrorBody,
        )
    ),
    tags(
        (name = "Attendance API", description = "OTP-based classroom attendance sessions.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct CreateSessionRequest {
    pub class_name: String,
}

/// The response payload sent after successfully creating a session.
#[derive(Serialize, ToSchema)]
pub struct CreateSessionResponse {
    pub session_id: Uuid,
    /// The code students type in to mark themselves present.
    pub code: String,
    pub class_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, ToSchema)]
pub struct SessionSummary {
    pub id: Uuid,
    pub code: String,
    pub class_name: String,
    pub created_at: DateTime<Utc>,
    pub attendee_count: usize,
}

impl From<Session> for SessionSummary {
    fn from(session: Session) -> Self {
        Self {
            attendee_count: session.attendee_count(),
            id: session.id,
            code: session.code,
            class_name: session.class_name,
            created_at: session.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct AttendeeView {
    pub student_id: String,
    pub student_name: String,
    pub marked_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<LocationPayload>,
}

impl From<AttendanceMark> for AttendeeView {
    fn from(mark: AttendanceMark) -> Self {
        Self {
            student_id: mark.student_id,
            student_name: mark.student_name,
            marked_at: mark.marked_at,
            location: mark.location.map(LocationPayload::from),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct RosterResponse {
    pub session_id: Uuid,
    pub code: String,
    pub class_name: String,
    pub created_at: DateTime<Utc>,
    /// Students in check-in order.
    pub attendees: Vec<AttendeeView>,
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Open a new attendance session for a class.
#[utoipa::path(
    post,
    path = "/sessions",
    request_body = CreateSessionRequest,
    responses(
        (status = 201, description = "Session created successfully", body = CreateSessionResponse),
        (status = 400, description = "Class name missing", body = ErrorBody),
        (status = 403, description = "Caller is not a teacher", body = ErrorBody),
        (status = 503, description = "Storage unavailable", body = ErrorBody)
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user."),
        ("x-user-role" = String, Header, description = "Must be `teacher`.")
    )
)]
pub async fn create_session_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    ApiJson(req): ApiJson<CreateSessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    principal.require(Role::Teacher)?;

    let session = app_state
        .ledger
        .create_session(principal.user_id, &req.class_name)
        .await?;

    let response = CreateSessionResponse {
        session_id: session.id,
        code: session.code,
        class_name: session.class_name,
        created_at: session.created_at,
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// List the caller's sessions, newest first.
#[utoipa::path(
    get,
    path = "/sessions",
    responses(
        (status = 200, description = "Sessions owned by the caller", body = [SessionSummary]),
        (status = 403, description = "Caller is not a teacher", body = ErrorBody)
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user."),
        ("x-user-role" = String, Header, description = "Must be `teacher`.")
    )
)]
pub async fn list_sessions_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Vec<SessionSummary>>, ApiError> {
    principal.require(Role::Teacher)?;

    let sessions = app_state.ledger.sessions_for_owner(principal.user_id).await?;
    Ok(Json(sessions.into_iter().map(SessionSummary::from).collect()))
}

/// Show who has checked in to one of the caller's sessions.
#[utoipa::path(
    get,
    path = "/sessions/{code}",
    responses(
        (status = 200, description = "Session roster", body = RosterResponse),
        (status = 403, description = "Caller does not own the session", body = ErrorBody),
        (status = 404, description = "No session has this code", body = ErrorBody)
    ),
    params(
        ("code" = String, Path, description = "The session code."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user."),
        ("x-user-role" = String, Header, description = "Must be `teacher`.")
    )
)]
pub async fn session_roster_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(code): Path<String>,
) -> Result<Json<RosterResponse>, ApiError> {
    principal.require(Role::Teacher)?;

    let session = app_state.ledger.session_roster(&code).await?;
    if session.owner_id != principal.user_id {
        return Err(ApiError::Forbidden(
            "only the teacher who opened a session can view its roster".to_string(),
        ));
    }

    Ok(Json(RosterResponse {
        session_id: session.id,
        code: session.code,
        class_name: session.class_name,
        created_at: session.created_at,
        attendees: session
            .attendance_records
            .into_iter()
            .map(AttendeeView::from)
            .collect(),
    }))
}
