use axum::{
    Extension, Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::get,
};
use db::models::minute::{CreateMinute, Minute, UpdateMinute};
use deployment::Deployment;
use services::services::{auth::AuthUser, events::Table};
use utils::{
    filter::{ListFilter, Page},
    response::ApiResponse,
};
use uuid::Uuid;

use super::ProjectScope;
use crate::{DeploymentImpl, error::ApiError};

pub async fn list_minutes(
    State(deployment): State<DeploymentImpl>,
    Query(scope): Query<ProjectScope>,
    Query(filter): Query<ListFilter>,
) -> Result<ResponseJson<ApiResponse<Page<Minute>>>, ApiError> {
    let pool = &deployment.db().pool;
    let minutes = match scope.project_id {
        Some(project_id) => Minute::find_by_project_id(pool, project_id).await?,
        None => Minute::find_all(pool).await?,
    };
    Ok(ResponseJson(ApiResponse::success(filter.apply_paged(minutes))))
}

pub async fn get_minute(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Minute>>, ApiError> {
    let minute = Minute::find_by_id(&deployment.db().pool, id)
        .await?
        .ok_or(ApiError::NotFound("Minute"))?;
    Ok(ResponseJson(ApiResponse::success(minute)))
}

pub async fn create_minute(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    axum::Json(payload): axum::Json<CreateMinute>,
) -> Result<ResponseJson<ApiResponse<Minute>>, ApiError> {
    if payload.title.trim().is_empty() {
        return Err(ApiError::BadRequest("Minute title is required".into()));
    }
    let minute =
        Minute::create(&deployment.db().pool, &payload, Some(user.id()), Uuid::new_v4()).await?;
    deployment.publish_insert(Table::Minutes, minute.id, &minute);
    Ok(ResponseJson(ApiResponse::success(minute)))
}

pub async fn update_minute(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
    axum::Json(payload): axum::Json<UpdateMinute>,
) -> Result<ResponseJson<ApiResponse<Minute>>, ApiError> {
    let minute = Minute::update(&deployment.db().pool, id, &payload).await?;
    deployment.publish_update(Table::Minutes, minute.id, &minute);
    Ok(ResponseJson(ApiResponse::success(minute)))
}

pub async fn delete_minute(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    if Minute::delete(&deployment.db().pool, id).await? == 0 {
        return Err(ApiError::NotFound("Minute"));
    }
    deployment.publish_delete(Table::Minutes, id);
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().nest(
        "/minutes",
        Router::new()
            .route("/", get(list_minutes).post(create_minute))
            .route(
                "/{id}",
                get(get_minute).put(update_minute).delete(delete_minute),
            ),
    )
}
