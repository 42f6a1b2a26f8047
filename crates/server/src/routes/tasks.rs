use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::{get, patch},
};
use chrono::Utc;
use db::models::task::{Task, TaskStatus, UpdateTask};
use deployment::Deployment;
use serde::Deserialize;
use services::services::events::Table;
use ts_rs::TS;
use utils::{
    filter::{ListFilter, Page},
    response::ApiResponse,
};
use uuid::Uuid;

use super::StatusChange;
use crate::{DeploymentImpl, error::ApiError};

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct TaskScope {
    #[serde(default)]
    pub assignee_id: Option<Uuid>,
    #[serde(default)]
    pub overdue: bool,
}

pub async fn list_tasks(
    State(deployment): State<DeploymentImpl>,
    Query(scope): Query<TaskScope>,
    Query(filter): Query<ListFilter>,
) -> Result<ResponseJson<ApiResponse<Page<Task>>>, ApiError> {
    let pool = &deployment.db().pool;
    let mut tasks = match scope.assignee_id {
        _ if scope.overdue => Task::find_overdue(pool, Utc::now().date_naive()).await?,
        Some(assignee_id) => Task::find_by_assignee(pool, assignee_id).await?,
        None => Task::find_all(pool).await?,
    };
    if let (true, Some(assignee_id)) = (scope.overdue, scope.assignee_id) {
        tasks.retain(|t| t.assignee_id == Some(assignee_id));
    }
    Ok(ResponseJson(ApiResponse::success(filter.apply_paged(tasks))))
}

pub async fn get_task(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    let task = Task::find_by_id(&deployment.db().pool, id)
        .await?
        .ok_or(ApiError::NotFound("Task"))?;
    Ok(ResponseJson(ApiResponse::success(task)))
}

pub async fn update_task(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
    axum::Json(payload): axum::Json<UpdateTask>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    let task = Task::update(&deployment.db().pool, id, &payload).await?;
    deployment.publish_update(Table::Tasks, task.id, &task);
    Ok(ResponseJson(ApiResponse::success(task)))
}

pub async fn update_task_status(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
    axum::Json(payload): axum::Json<StatusChange<TaskStatus>>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    let task = Task::update_status(&deployment.db().pool, id, payload.status).await?;
    deployment.publish_update(Table::Tasks, task.id, &task);
    Ok(ResponseJson(ApiResponse::success(task)))
}

pub async fn delete_task(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    if Task::delete(&deployment.db().pool, id).await? == 0 {
        return Err(ApiError::NotFound("Task"));
    }
    deployment.publish_delete(Table::Tasks, id);
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().nest(
        "/tasks",
        Router::new()
            .route("/", get(list_tasks))
            .route("/{id}", get(get_task).put(update_task).delete(delete_task))
            .route("/{id}/status", patch(update_task_status)),
    )
}
