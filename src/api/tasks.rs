//! Task endpoints - thin wrappers over the workflow core.

use std::sync::Arc;

use axum::extract::{Extension, Path, Query, State};
use axum::Json;

use super::auth::AuthUser;
use super::routes::AppState;
use super::types::{ApiResponse, ApiResult, ListTasksQuery};
use crate::error::CoreError;
use crate::task::registry::TaskFilter;
use crate::task::{NewTask, Task, TaskAction, TaskStatus};

pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListTasksQuery>,
) -> ApiResult<Vec<Task>> {
    let status = match query.status.as_deref() {
        Some(s) => Some(TaskStatus::parse(s).ok_or_else(|| {
            CoreError::Validation(format!("unknown task status '{s}'"))
        })?),
        None => None,
    };
    let filter = TaskFilter {
        status,
        assignee_id: query.assignee_id,
        created_by: query.created_by,
    };
    let tasks = state.workflow.list_tasks(filter).await?;
    Ok(ApiResponse::ok(tasks))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(new): Json<NewTask>,
) -> ApiResult<Task> {
    let task = state.workflow.create_task(new, user.actor()).await?;
    Ok(ApiResponse::ok(task))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Task> {
    let task = state.workflow.get_task(id).await?;
    Ok(ApiResponse::ok(task))
}

/// Single handler for all lifecycle actions
/// (`POST /api/tasks/:id/{claim,start,submit,approve,reject,reassign,cancel}`).
pub async fn act(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path((id, action)): Path<(i64, String)>,
) -> ApiResult<Task> {
    let action = TaskAction::parse(&action)
        .ok_or_else(|| CoreError::Validation(format!("unknown task action '{action}'")))?;
    let task = state
        .workflow
        .request_transition(id, action, user.actor())
        .await?;
    Ok(ApiResponse::ok(task))
}
