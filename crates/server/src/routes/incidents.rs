use axum::{
    Extension, Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::incident::{CreateIncident, Incident, UpdateIncident};
use deployment::Deployment;
use serde::Deserialize;
use services::services::{auth::AuthUser, events::Table};
use tracing::info;
use ts_rs::TS;
use utils::{
    filter::{ListFilter, Page},
    response::ApiResponse,
};
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError};

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct IncidentScope {
    #[serde(default)]
    pub project_id: Option<Uuid>,
    #[serde(default)]
    pub open: bool,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct ResolveIncident {
    pub resolution: String,
}

pub async fn list_incidents(
    State(deployment): State<DeploymentImpl>,
    Query(scope): Query<IncidentScope>,
    Query(filter): Query<ListFilter>,
) -> Result<ResponseJson<ApiResponse<Page<Incident>>>, ApiError> {
    let pool = &deployment.db().pool;
    let mut incidents = match scope.project_id {
        Some(project_id) => Incident::find_by_project_id(pool, project_id).await?,
        None if scope.open => Incident::find_open(pool).await?,
        None => Incident::find_all(pool).await?,
    };
    if scope.open {
        incidents.retain(|i| i.status.is_open());
    }
    Ok(ResponseJson(ApiResponse::success(filter.apply_paged(incidents))))
}

pub async fn get_incident(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Incident>>, ApiError> {
    let incident = Incident::find_by_id(&deployment.db().pool, id)
        .await?
        .ok_or(ApiError::NotFound("Incident"))?;
    Ok(ResponseJson(ApiResponse::success(incident)))
}

pub async fn create_incident(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    axum::Json(payload): axum::Json<CreateIncident>,
) -> Result<ResponseJson<ApiResponse<Incident>>, ApiError> {
    if payload.title.trim().is_empty() {
        return Err(ApiError::BadRequest("Incident title is required".into()));
    }
    let incident =
        Incident::create(&deployment.db().pool, &payload, Some(user.id()), Uuid::new_v4()).await?;
    info!(
        incident_id = %incident.id,
        project_id = %incident.project_id,
        severity = %incident.severity,
        "Incident reported"
    );
    deployment.publish_insert(Table::Incidents, incident.id, &incident);
    Ok(ResponseJson(ApiResponse::success(incident)))
}

pub async fn update_incident(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
    axum::Json(payload): axum::Json<UpdateIncident>,
) -> Result<ResponseJson<ApiResponse<Incident>>, ApiError> {
    let incident = Incident::update(&deployment.db().pool, id, &payload).await?;
    deployment.publish_update(Table::Incidents, incident.id, &incident);
    Ok(ResponseJson(ApiResponse::success(incident)))
}

pub async fn resolve_incident(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
    axum::Json(payload): axum::Json<ResolveIncident>,
) -> Result<ResponseJson<ApiResponse<Incident>>, ApiError> {
    let resolution = payload.resolution.trim();
    if resolution.is_empty() {
        return Err(ApiError::BadRequest("A resolution note is required".into()));
    }
    let incident = Incident::resolve(&deployment.db().pool, id, resolution).await?;
    info!(incident_id = %id, "Incident resolved");
    deployment.publish_update(Table::Incidents, incident.id, &incident);
    Ok(ResponseJson(ApiResponse::success(incident)))
}

pub async fn delete_incident(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    if Incident::delete(&deployment.db().pool, id).await? == 0 {
        return Err(ApiError::NotFound("Incident"));
    }
    deployment.publish_delete(Table::Incidents, id);
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().nest(
        "/incidents",
        Router::new()
            .route("/", get(list_incidents).post(create_incident))
            .route(
                "/{id}",
                get(get_incident)
                    .put(update_incident)
                    .delete(delete_incident),
            )
            .route("/{id}/resolve", post(resolve_incident)),
    )
}
