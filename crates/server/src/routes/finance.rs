use axum::{
    Extension, Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::get,
};
use chrono::{Datelike, NaiveDate, Utc};
use db::models::ledger::{CreateLedgerEntry, LedgerEntry, UpdateLedgerEntry};
use deployment::Deployment;
use serde::Deserialize;
use services::services::{
    auth::AuthUser,
    events::Table,
    finance::{FinanceService, FinanceSummary},
};
use ts_rs::TS;
use utils::{
    filter::{ListFilter, Page},
    format::parse_date,
    response::ApiResponse,
};
use uuid::Uuid;

use super::ProjectScope;
use crate::{DeploymentImpl, error::ApiError};

/// Bounds accept `YYYY-MM-DD` or `DD/MM/YYYY`.
#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct SummaryRange {
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
}

fn bound(raw: Option<&str>) -> Result<Option<NaiveDate>, ApiError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => parse_date(s)
            .map(Some)
            .ok_or_else(|| ApiError::BadRequest(format!("Invalid date: {s}"))),
    }
}

impl SummaryRange {
    /// Missing bounds default to the current calendar year.
    fn resolve(&self, today: NaiveDate) -> Result<(NaiveDate, NaiveDate), ApiError> {
        let from = bound(self.from.as_deref())?
            .or_else(|| NaiveDate::from_ymd_opt(today.year(), 1, 1))
            .unwrap_or(today);
        let to = bound(self.to.as_deref())?.unwrap_or(today);
        Ok((from, to))
    }
}

pub async fn list_entries(
    State(deployment): State<DeploymentImpl>,
    Query(scope): Query<ProjectScope>,
    Query(filter): Query<ListFilter>,
) -> Result<ResponseJson<ApiResponse<Page<LedgerEntry>>>, ApiError> {
    let pool = &deployment.db().pool;
    let entries = match scope.project_id {
        Some(project_id) => LedgerEntry::find_by_project_id(pool, project_id).await?,
        None => LedgerEntry::find_all(pool).await?,
    };
    Ok(ResponseJson(ApiResponse::success(filter.apply_paged(entries))))
}

pub async fn get_entry(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<LedgerEntry>>, ApiError> {
    let entry = LedgerEntry::find_by_id(&deployment.db().pool, id)
        .await?
        .ok_or(ApiError::NotFound("Ledger entry"))?;
    Ok(ResponseJson(ApiResponse::success(entry)))
}

pub async fn create_entry(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    axum::Json(payload): axum::Json<CreateLedgerEntry>,
) -> Result<ResponseJson<ApiResponse<LedgerEntry>>, ApiError> {
    if payload.amount_cents <= 0 {
        return Err(ApiError::BadRequest("Amount must be greater than zero".into()));
    }
    let entry =
        LedgerEntry::create(&deployment.db().pool, &payload, Some(user.id()), Uuid::new_v4())
            .await?;
    deployment.publish_insert(Table::LedgerEntries, entry.id, &entry);
    Ok(ResponseJson(ApiResponse::success(entry)))
}

pub async fn update_entry(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
    axum::Json(payload): axum::Json<UpdateLedgerEntry>,
) -> Result<ResponseJson<ApiResponse<LedgerEntry>>, ApiError> {
    let entry = LedgerEntry::update(&deployment.db().pool, id, &payload).await?;
    deployment.publish_update(Table::LedgerEntries, entry.id, &entry);
    Ok(ResponseJson(ApiResponse::success(entry)))
}

pub async fn delete_entry(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    if LedgerEntry::delete(&deployment.db().pool, id).await? == 0 {
        return Err(ApiError::NotFound("Ledger entry"));
    }
    deployment.publish_delete(Table::LedgerEntries, id);
    Ok(ResponseJson(ApiResponse::success(())))
}

pub async fn get_summary(
    State(deployment): State<DeploymentImpl>,
    Query(range): Query<SummaryRange>,
) -> Result<ResponseJson<ApiResponse<FinanceSummary>>, ApiError> {
    let (from, to) = range.resolve(Utc::now().date_naive())?;
    let summary =
        FinanceService::summary(&deployment.db().pool, from, to, &deployment.config().currency)
            .await?;
    Ok(ResponseJson(ApiResponse::success(summary)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().nest(
        "/finance",
        Router::new()
            .route("/summary", get(get_summary))
            .route("/entries", get(list_entries).post(create_entry))
            .route(
                "/entries/{id}",
                get(get_entry).put(update_entry).delete(delete_entry),
            ),
    )
}
