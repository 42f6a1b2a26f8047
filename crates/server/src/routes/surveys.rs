use axum::{
    Extension, Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::{get, patch, post},
};
use chrono::Utc;
use db::models::{
    quote::{CreateQuoteItem, Quote, QuoteWithItems},
    survey::{CreateSurvey, Survey, SurveyStatus, UpdateSurvey},
};
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

use super::StatusChange;
use crate::{DeploymentImpl, error::ApiError};

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct SurveyScope {
    #[serde(default)]
    pub upcoming: bool,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct QuoteFromSurvey {
    pub title: Option<String>,
    #[serde(default)]
    pub items: Vec<CreateQuoteItem>,
}

pub async fn list_surveys(
    State(deployment): State<DeploymentImpl>,
    Query(scope): Query<SurveyScope>,
    Query(filter): Query<ListFilter>,
) -> Result<ResponseJson<ApiResponse<Page<Survey>>>, ApiError> {
    let pool = &deployment.db().pool;
    let surveys = if scope.upcoming {
        Survey::find_upcoming(pool, Utc::now().date_naive()).await?
    } else {
        Survey::find_all(pool).await?
    };
    Ok(ResponseJson(ApiResponse::success(filter.apply_paged(surveys))))
}

pub async fn get_survey(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Survey>>, ApiError> {
    let survey = Survey::find_by_id(&deployment.db().pool, id)
        .await?
        .ok_or(ApiError::NotFound("Survey"))?;
    Ok(ResponseJson(ApiResponse::success(survey)))
}

pub async fn create_survey(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    axum::Json(payload): axum::Json<CreateSurvey>,
) -> Result<ResponseJson<ApiResponse<Survey>>, ApiError> {
    if payload.client.trim().is_empty() || payload.site_address.trim().is_empty() {
        return Err(ApiError::BadRequest("Client and site address are required".into()));
    }
    let survey =
        Survey::create(&deployment.db().pool, &payload, Some(user.id()), Uuid::new_v4()).await?;
    deployment.publish_insert(Table::Surveys, survey.id, &survey);
    Ok(ResponseJson(ApiResponse::success(survey)))
}

pub async fn update_survey(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
    axum::Json(payload): axum::Json<UpdateSurvey>,
) -> Result<ResponseJson<ApiResponse<Survey>>, ApiError> {
    let survey = Survey::update(&deployment.db().pool, id, &payload).await?;
    deployment.publish_update(Table::Surveys, survey.id, &survey);
    Ok(ResponseJson(ApiResponse::success(survey)))
}

pub async fn update_survey_status(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
    axum::Json(payload): axum::Json<StatusChange<SurveyStatus>>,
) -> Result<ResponseJson<ApiResponse<Survey>>, ApiError> {
    let survey = Survey::update_status(&deployment.db().pool, id, payload.status).await?;
    deployment.publish_update(Table::Surveys, survey.id, &survey);
    Ok(ResponseJson(ApiResponse::success(survey)))
}

/// Drafts a quote from the survey and marks the survey as quoted.
pub async fn quote_survey(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    payload: Option<axum::Json<QuoteFromSurvey>>,
) -> Result<ResponseJson<ApiResponse<QuoteWithItems>>, ApiError> {
    let QuoteFromSurvey { title, items } = payload.map(|p| p.0).unwrap_or_default();
    let (quote, survey) = Quote::create_from_survey(
        &deployment.db().pool,
        id,
        title,
        items,
        Some(user.id()),
        Uuid::new_v4(),
    )
    .await?;
    info!(survey_id = %id, folio = %quote.quote.folio, "Quote drafted from survey");
    deployment.publish_insert(Table::Quotes, quote.quote.id, &quote);
    deployment.publish_update(Table::Surveys, survey.id, &survey);
    Ok(ResponseJson(ApiResponse::success(quote)))
}

pub async fn delete_survey(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    if Survey::delete(&deployment.db().pool, id).await? == 0 {
        return Err(ApiError::NotFound("Survey"));
    }
    deployment.publish_delete(Table::Surveys, id);
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().nest(
        "/surveys",
        Router::new()
            .route("/", get(list_surveys).post(create_survey))
            .route(
                "/{id}",
                get(get_survey).put(update_survey).delete(delete_survey),
            )
            .route("/{id}/status", patch(update_survey_status))
            .route("/{id}/quote", post(quote_survey)),
    )
}
