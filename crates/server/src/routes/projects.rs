use axum::{
    Extension, Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::{get, patch},
};
use chrono::NaiveDate;
use db::models::{
    client_meeting::ClientMeeting,
    ledger::LedgerEntry,
    project::{
        CreateProject, Project, ProjectRemoval, ProjectStatus, ProjectWithManager, UpdateProject,
    },
    quote::Quote,
    survey::Survey,
    task::{CreateTask, Task, TaskPriority, TaskStatus},
};
use deployment::Deployment;
use serde::{Deserialize, Serialize};
use services::services::{auth::AuthUser, events::Table};
use tracing::{info, warn};
use ts_rs::TS;
use utils::{
    filter::{ListFilter, Page},
    response::ApiResponse,
};
use uuid::Uuid;

use super::StatusChange;
use crate::{DeploymentImpl, error::ApiError};

pub async fn list_projects(
    State(deployment): State<DeploymentImpl>,
    Query(filter): Query<ListFilter>,
) -> Result<ResponseJson<ApiResponse<Page<ProjectWithManager>>>, ApiError> {
    let projects = Project::find_with_manager(&deployment.db().pool).await?;
    Ok(ResponseJson(ApiResponse::success(filter.apply_paged(projects))))
}

pub async fn get_project(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Project>>, ApiError> {
    let project = Project::find_by_id(&deployment.db().pool, id)
        .await?
        .ok_or(ApiError::NotFound("Project"))?;
    Ok(ResponseJson(ApiResponse::success(project)))
}

pub async fn create_project(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    axum::Json(payload): axum::Json<CreateProject>,
) -> Result<ResponseJson<ApiResponse<Project>>, ApiError> {
    if payload.name.trim().is_empty() {
        return Err(ApiError::BadRequest("Project name is required".into()));
    }
    let project = Project::create(&deployment.db().pool, &payload, Uuid::new_v4()).await?;
    info!(project_id = %project.id, user_id = %user.id(), "Project created");
    deployment.publish_insert(Table::Projects, project.id, &project);
    Ok(ResponseJson(ApiResponse::success(project)))
}

pub async fn update_project(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
    axum::Json(payload): axum::Json<UpdateProject>,
) -> Result<ResponseJson<ApiResponse<Project>>, ApiError> {
    let project = Project::update(&deployment.db().pool, id, &payload).await?;
    deployment.publish_update(Table::Projects, project.id, &project);
    Ok(ResponseJson(ApiResponse::success(project)))
}

pub async fn update_project_status(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
    axum::Json(payload): axum::Json<StatusChange<ProjectStatus>>,
) -> Result<ResponseJson<ApiResponse<Project>>, ApiError> {
    let project = Project::update_status(&deployment.db().pool, id, payload.status).await?;
    info!(project_id = %id, status = %project.status, "Project status changed");
    deployment.publish_update(Table::Projects, project.id, &project);
    Ok(ResponseJson(ApiResponse::success(project)))
}

pub async fn delete_project(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let removal = Project::delete(&deployment.db().pool, id)
        .await?
        .ok_or(ApiError::NotFound("Project"))?;
    info!(
        project_id = %id,
        tasks = removal.tasks.len(),
        expenses = removal.expenses.len(),
        reports = removal.reports.len(),
        "Project deleted"
    );
    deployment.publish_delete(Table::Projects, id);
    publish_removal(&deployment, &removal).await;
    Ok(ResponseJson(ApiResponse::success(())))
}

/// Mirrors the schema's cascade: deletes for removed children, updates for
/// rows whose `project_id` was cleared.
async fn publish_removal(deployment: &DeploymentImpl, removal: &ProjectRemoval) {
    for (table, ids) in [
        (Table::Tasks, &removal.tasks),
        (Table::Expenses, &removal.expenses),
        (Table::Incidents, &removal.incidents),
        (Table::Reports, &removal.reports),
        (Table::Minutes, &removal.minutes),
    ] {
        for id in ids {
            deployment.publish_delete(table, *id);
        }
    }

    let pool = &deployment.db().pool;
    republish(deployment, Table::Surveys, &removal.surveys, |id| {
        Survey::find_by_id(pool, id)
    })
    .await;
    republish(deployment, Table::Quotes, &removal.quotes, |id| {
        Quote::find_with_items(pool, id)
    })
    .await;
    republish(deployment, Table::ClientMeetings, &removal.client_meetings, |id| {
        ClientMeeting::find_by_id(pool, id)
    })
    .await;
    republish(deployment, Table::LedgerEntries, &removal.ledger_entries, |id| {
        LedgerEntry::find_by_id(pool, id)
    })
    .await;
}

async fn republish<T, F, Fut>(deployment: &DeploymentImpl, table: Table, ids: &[Uuid], fetch: F)
where
    T: Serialize,
    F: Fn(Uuid) -> Fut,
    Fut: Future<Output = Result<Option<T>, sqlx::Error>>,
{
    for &id in ids {
        match fetch(id).await {
            Ok(Some(record)) => deployment.publish_update(table, id, &record),
            Ok(None) => {}
            Err(e) => warn!(%table, %id, error = %e, "Failed to reload detached row"),
        }
    }
}

pub async fn list_project_tasks(
    State(deployment): State<DeploymentImpl>,
    Path(project_id): Path<Uuid>,
    Query(filter): Query<ListFilter>,
) -> Result<ResponseJson<ApiResponse<Page<Task>>>, ApiError> {
    let tasks = Task::find_by_project_id(&deployment.db().pool, project_id).await?;
    Ok(ResponseJson(ApiResponse::success(filter.apply_paged(tasks))))
}

/// Task payload without the project id, which comes from the path.
#[derive(Debug, Clone, Deserialize, TS)]
pub struct NewProjectTask {
    pub title: String,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub assignee_id: Option<Uuid>,
    pub due_date: Option<NaiveDate>,
}

pub async fn create_project_task(
    State(deployment): State<DeploymentImpl>,
    Path(project_id): Path<Uuid>,
    axum::Json(payload): axum::Json<NewProjectTask>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    if payload.title.trim().is_empty() {
        return Err(ApiError::BadRequest("Task title is required".into()));
    }
    let data = CreateTask {
        project_id,
        title: payload.title,
        description: payload.description,
        status: payload.status,
        priority: payload.priority,
        assignee_id: payload.assignee_id,
        due_date: payload.due_date,
    };
    let task = Task::create(&deployment.db().pool, &data, Uuid::new_v4()).await?;
    deployment.publish_insert(Table::Tasks, task.id, &task);
    Ok(ResponseJson(ApiResponse::success(task)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().nest(
        "/projects",
        Router::new()
            .route("/", get(list_projects).post(create_project))
            .route(
                "/{id}",
                get(get_project).put(update_project).delete(delete_project),
            )
            .route("/{id}/status", patch(update_project_status))
            .route(
                "/{id}/tasks",
                get(list_project_tasks).post(create_project_task),
            ),
    )
}
