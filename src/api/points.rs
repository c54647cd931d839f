//! Points, stats and leaderboard endpoints.

use std::sync::Arc;

use axum::extract::{Extension, Path, Query, State};
use axum::Json;

use super::auth::AuthUser;
use super::routes::AppState;
use super::types::{
    AdjustPointsRequest, ApiResponse, ApiResult, CorrectEntryRequest, HistoryQuery,
    LeaderboardQuery,
};
use crate::error::CoreError;
use crate::leaderboard::LeaderboardRow;
use crate::ledger::{LedgerEntry, Scope};
use crate::roles::Capability;
use crate::workflow::UserStats;

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;

pub async fn history(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Vec<LedgerEntry>> {
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = query.offset.unwrap_or(0).max(0);
    let entries = state.workflow.points_history(user.id, limit, offset).await?;
    Ok(ApiResponse::ok(entries))
}

pub async fn leaderboard(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LeaderboardQuery>,
) -> ApiResult<Vec<LeaderboardRow>> {
    let scope = match query.scope.as_deref() {
        Some(s) => Scope::parse(s)
            .ok_or_else(|| CoreError::Validation(format!("unknown leaderboard scope '{s}'")))?,
        None => Scope::All,
    };
    let rows = state.workflow.leaderboard(scope).await?;
    Ok(ApiResponse::ok(rows))
}

/// The caller's own stats.
pub async fn my_stats(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<UserStats> {
    let stats = state.workflow.user_stats(user.id).await?;
    Ok(ApiResponse::ok(stats))
}

/// Another user's stats; gated unless asking about yourself.
pub async fn user_stats(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(user_id): Path<i64>,
) -> ApiResult<UserStats> {
    if user_id != user.id && !user.role.can(Capability::ViewAllStats) {
        return Err(CoreError::Forbidden(
            "you may only view your own stats".to_string(),
        )
        .into());
    }
    let stats = state.workflow.user_stats(user_id).await?;
    Ok(ApiResponse::ok(stats))
}

pub async fn adjust(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<AdjustPointsRequest>,
) -> ApiResult<LedgerEntry> {
    let entry = state
        .workflow
        .adjust_points(user.actor(), req.user_id, req.delta, req.note)
        .await?;
    Ok(ApiResponse::ok(entry))
}

pub async fn correct(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CorrectEntryRequest>,
) -> ApiResult<LedgerEntry> {
    let entry = state
        .workflow
        .correct_entry(user.actor(), req.entry_id)
        .await?;
    Ok(ApiResponse::ok(entry))
}
