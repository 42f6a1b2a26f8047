use axum::{
    Extension, Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::get,
};
use db::models::expense::{CreateExpense, Expense, UpdateExpense};
use deployment::Deployment;
use serde::Serialize;
use services::services::{auth::AuthUser, events::Table, storage::StorageService};
use tracing::warn;
use ts_rs::TS;
use utils::{
    filter::{ListFilter, Page},
    response::ApiResponse,
};
use uuid::Uuid;

use super::ProjectScope;
use crate::{DeploymentImpl, error::ApiError};

#[derive(Debug, Clone, Serialize, TS)]
pub struct ExpenseDetail {
    #[serde(flatten)]
    #[ts(flatten)]
    pub expense: Expense,
    pub receipt_url: Option<String>,
}

pub(crate) fn link(storage: &StorageService, path: Option<&str>) -> Option<String> {
    let path = path?;
    match storage.public_url(path) {
        Ok(url) => Some(url),
        Err(e) => {
            warn!(path, error = %e, "Could not build object url");
            None
        }
    }
}

pub async fn list_expenses(
    State(deployment): State<DeploymentImpl>,
    Query(scope): Query<ProjectScope>,
    Query(filter): Query<ListFilter>,
) -> Result<ResponseJson<ApiResponse<Page<Expense>>>, ApiError> {
    let pool = &deployment.db().pool;
    let expenses = match scope.project_id {
        Some(project_id) => Expense::find_by_project_id(pool, project_id).await?,
        None => Expense::find_all(pool).await?,
    };
    Ok(ResponseJson(ApiResponse::success(filter.apply_paged(expenses))))
}

pub async fn get_expense(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<ExpenseDetail>>, ApiError> {
    let expense = Expense::find_by_id(&deployment.db().pool, id)
        .await?
        .ok_or(ApiError::NotFound("Expense"))?;
    let receipt_url = link(deployment.storage(), expense.receipt_path.as_deref());
    Ok(ResponseJson(ApiResponse::success(ExpenseDetail {
        expense,
        receipt_url,
    })))
}

pub async fn create_expense(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    axum::Json(payload): axum::Json<CreateExpense>,
) -> Result<ResponseJson<ApiResponse<Expense>>, ApiError> {
    if payload.amount_cents <= 0 {
        return Err(ApiError::BadRequest("Amount must be greater than zero".into()));
    }
    let expense =
        Expense::create(&deployment.db().pool, &payload, Some(user.id()), Uuid::new_v4()).await?;
    deployment.publish_insert(Table::Expenses, expense.id, &expense);
    Ok(ResponseJson(ApiResponse::success(expense)))
}

pub async fn update_expense(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
    axum::Json(payload): axum::Json<UpdateExpense>,
) -> Result<ResponseJson<ApiResponse<Expense>>, ApiError> {
    let expense = Expense::update(&deployment.db().pool, id, &payload).await?;
    deployment.publish_update(Table::Expenses, expense.id, &expense);
    Ok(ResponseJson(ApiResponse::success(expense)))
}

pub async fn delete_expense(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    if Expense::delete(&deployment.db().pool, id).await? == 0 {
        return Err(ApiError::NotFound("Expense"));
    }
    deployment.publish_delete(Table::Expenses, id);
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().nest(
        "/expenses",
        Router::new()
            .route("/", get(list_expenses).post(create_expense))
            .route(
                "/{id}",
                get(get_expense).put(update_expense).delete(delete_expense),
            ),
    )
}
