pub mod attendance;
pub mod extract;
pub mod middleware;
pub mod rest;
pub mod state;

pub use attendance::{attendance_rate_handler, mark_attendance_handler};
pub use middleware::require_principal;
pub use rest::{create_session_handler, list_sessions_handler, session_roster_handler};

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::web::state::AppState;

/// Builds the attendance API routes. Every route requires principal headers.
pub fn api_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/sessions",
            post(create_session_handler).get(list_sessions_handler),
        )
        .route("/sessions/{code}", get(session_roster_handler))
        .route("/attendance", post(mark_attendance_handler))
        .route("/attendance/rate", get(attendance_rate_handler))
        .layer(axum_middleware::from_fn(require_principal))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
