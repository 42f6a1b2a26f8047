use axum::{
    Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::get,
};
use chrono::Utc;
use deployment::Deployment;
use services::services::dashboard::{Dashboard, DashboardService, ProjectSummary};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError};

pub async fn get_dashboard(
    State(deployment): State<DeploymentImpl>,
) -> ResponseJson<ApiResponse<Dashboard>> {
    let dashboard = DashboardService::load(
        &deployment.db().pool,
        Utc::now(),
        &deployment.config().currency,
    )
    .await;
    ResponseJson(ApiResponse::success(dashboard))
}

pub async fn get_project_summary(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<ProjectSummary>>, ApiError> {
    let summary =
        DashboardService::project_summary(&deployment.db().pool, id, Utc::now().date_naive())
            .await?
            .ok_or(ApiError::NotFound("Project"))?;
    Ok(ResponseJson(ApiResponse::success(summary)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new()
        .route("/dashboard", get(get_dashboard))
        .route("/dashboard/projects/{id}", get(get_project_summary))
}
