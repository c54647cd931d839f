//! Wire types for the HTTP API.
//!
//! Responses use the `{success, data | error}` envelope the dashboard
//! expects. [`ApiError`] carries a [`CoreError`] into an HTTP response with
//! a stable code; storage details are logged here and never serialized.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::roles::Role;

/// Success envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}

/// Error envelope body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

/// Error half of a handler result; turns into the error envelope.
#[derive(Debug)]
pub enum ApiError {
    Core(CoreError),
    /// Unexpected non-domain failure (e.g. token signing). Logged; clients
    /// see a generic message.
    Internal(anyhow::Error),
}

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        Self::Core(e)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        Self::Internal(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            Self::Core(core) => {
                let status = match core {
                    CoreError::Validation(_) => StatusCode::BAD_REQUEST,
                    CoreError::Forbidden(_) => StatusCode::FORBIDDEN,
                    CoreError::NotFound(_) => StatusCode::NOT_FOUND,
                    CoreError::Conflict => StatusCode::CONFLICT,
                    CoreError::InvalidTransition { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                    CoreError::Storage(source) => {
                        tracing::error!(error = %source, "storage failure");
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                (status, core.code(), core.public_message())
            }
            Self::Internal(e) => {
                tracing::error!(error = %e, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal server error".to_string(),
                )
            }
        };
        let body = serde_json::json!({
            "success": false,
            "error": ErrorBody { code, message },
        });
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

// ─────────────────────────────────────────────────────────────────────────
// Auth
// ─────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    /// Defaults to `member`; elevated roles are normally granted later.
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    /// Expiration unix seconds.
    pub exp: i64,
    pub user: PublicUser,
}

/// User shape safe to return to clients.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<crate::store::User> for PublicUser {
    fn from(u: crate::store::User) -> Self {
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
            role: u.role,
            created_at: u.created_at,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────
// Tasks and points
// ─────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListTasksQuery {
    pub status: Option<String>,
    pub assignee_id: Option<i64>,
    pub created_by: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    pub scope: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AdjustPointsRequest {
    pub user_id: i64,
    pub delta: i64,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CorrectEntryRequest {
    pub entry_id: i64,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}
