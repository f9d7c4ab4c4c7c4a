//! services/api/src/web/middleware.rs
//!
//! Principal extraction for protected routes.
//!
//! Authentication happens upstream. The gateway forwards the caller's identity
//! in `x-user-id` and `x-user-role`; this layer only parses and checks them.

use axum::{extract::Request, middleware::Next, response::Response};
use uuid::Uuid;

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Student,
    Teacher,
}

impl Role {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "student" => Some(Role::Student),
            "teacher" => Some(Role::Teacher),
            _ => None,
        }
    }
}

/// The authenticated caller of a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    pub role: Role,
}

impl Principal {
    /// Fails with `Forbidden` unless the caller has `role`.
    pub fn require(&self, role: Role) -> Result<(), ApiError> {
        if self.role == role {
            Ok(())
        } else {
            Err(ApiError::Forbidden(format!("{:?} role required", role)))
        }
    }
}

/// Middleware that reads the principal headers.
///
/// If valid, inserts the `Principal` into request extensions for handlers to use.
/// If missing or malformed, returns 401 Unauthorized.
pub async fn require_principal(mut req: Request, next: Next) -> Result<Response, ApiError> {
    let (user_id, role) = {
        let header = |name: &str| {
            req.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
        };

        let user_id = header(USER_ID_HEADER)
            .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
            .ok_or_else(|| ApiError::Unauthorized(format!("a valid {} header is required", USER_ID_HEADER)))?;
        let role = header(USER_ROLE_HEADER)
            .as_deref()
            .and_then(Role::parse)
            .ok_or_else(|| {
                ApiError::Unauthorized(format!("{} must be student or teacher", USER_ROLE_HEADER))
            })?;
        (user_id, role)
    };

    req.extensions_mut().insert(Principal { user_id, role });
    Ok(next.run(req).await)
}
