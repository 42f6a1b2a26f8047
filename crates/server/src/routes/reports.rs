use axum::{
    Extension, Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::report::{
    CreateReport, CreateReportPhoto, Report, ReportPhoto, ReportWithPhotos, UpdateReport,
};
use deployment::Deployment;
use serde::Serialize;
use services::services::{
    auth::AuthUser,
    events::Table,
    storage::{StorageService, validate_path},
};
use ts_rs::TS;
use utils::{
    filter::{ListFilter, Page},
    response::ApiResponse,
};
use uuid::Uuid;

use super::{ProjectScope, expenses::link};
use crate::{DeploymentImpl, error::ApiError};

#[derive(Debug, Clone, Serialize, TS)]
pub struct PhotoLink {
    #[serde(flatten)]
    #[ts(flatten)]
    pub photo: ReportPhoto,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct ReportDetail {
    #[serde(flatten)]
    #[ts(flatten)]
    pub report: Report,
    pub photos: Vec<PhotoLink>,
}

fn with_links(storage: &StorageService, data: ReportWithPhotos) -> ReportDetail {
    ReportDetail {
        report: data.report,
        photos: data
            .photos
            .into_iter()
            .map(|photo| PhotoLink {
                url: link(storage, Some(&photo.storage_path)),
                photo,
            })
            .collect(),
    }
}

pub async fn list_reports(
    State(deployment): State<DeploymentImpl>,
    Query(scope): Query<ProjectScope>,
    Query(filter): Query<ListFilter>,
) -> Result<ResponseJson<ApiResponse<Page<Report>>>, ApiError> {
    let pool = &deployment.db().pool;
    let reports = match scope.project_id {
        Some(project_id) => Report::find_by_project_id(pool, project_id).await?,
        None => Report::find_all(pool).await?,
    };
    Ok(ResponseJson(ApiResponse::success(filter.apply_paged(reports))))
}

pub async fn get_report(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<ReportDetail>>, ApiError> {
    let report = Report::find_with_photos(&deployment.db().pool, id)
        .await?
        .ok_or(ApiError::NotFound("Report"))?;
    Ok(ResponseJson(ApiResponse::success(with_links(
        deployment.storage(),
        report,
    ))))
}

pub async fn create_report(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    axum::Json(payload): axum::Json<CreateReport>,
) -> Result<ResponseJson<ApiResponse<ReportDetail>>, ApiError> {
    if payload.title.trim().is_empty() {
        return Err(ApiError::BadRequest("Report title is required".into()));
    }
    for photo in &payload.photos {
        validate_path(&photo.storage_path)?;
    }
    let report =
        Report::create(&deployment.db().pool, &payload, Some(user.id()), Uuid::new_v4()).await?;
    deployment.publish_insert(Table::Reports, report.report.id, &report);
    Ok(ResponseJson(ApiResponse::success(with_links(
        deployment.storage(),
        report,
    ))))
}

pub async fn update_report(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
    axum::Json(payload): axum::Json<UpdateReport>,
) -> Result<ResponseJson<ApiResponse<Report>>, ApiError> {
    let report = Report::update(&deployment.db().pool, id, &payload).await?;
    deployment.publish_update(Table::Reports, report.id, &report);
    Ok(ResponseJson(ApiResponse::success(report)))
}

pub async fn add_report_photo(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
    axum::Json(payload): axum::Json<CreateReportPhoto>,
) -> Result<ResponseJson<ApiResponse<PhotoLink>>, ApiError> {
    validate_path(&payload.storage_path)?;
    let pool = &deployment.db().pool;
    if Report::find_by_id(pool, id).await?.is_none() {
        return Err(ApiError::NotFound("Report"));
    }
    let photo = Report::add_photo(pool, id, &payload).await?;
    if let Some(report) = Report::find_with_photos(pool, id).await? {
        deployment.publish_update(Table::Reports, id, &report);
    }
    let url = link(deployment.storage(), Some(&photo.storage_path));
    Ok(ResponseJson(ApiResponse::success(PhotoLink { photo, url })))
}

pub async fn delete_report(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    if Report::delete(&deployment.db().pool, id).await? == 0 {
        return Err(ApiError::NotFound("Report"));
    }
    deployment.publish_delete(Table::Reports, id);
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().nest(
        "/reports",
        Router::new()
            .route("/", get(list_reports).post(create_report))
            .route(
                "/{id}",
                get(get_report).put(update_report).delete(delete_report),
            )
            .route("/{id}/photos", post(add_report_photo)),
    )
}
