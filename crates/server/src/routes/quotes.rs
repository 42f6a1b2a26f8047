use axum::{
    Extension, Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::{get, patch, put},
};
use chrono::{NaiveDate, Utc};
use db::models::quote::{
    CreateQuote, CreateQuoteItem, Quote, QuoteStatus, QuoteWithItems, UpdateQuote,
};
use deployment::Deployment;
use services::services::{auth::AuthUser, events::Table};
use tracing::info;
use utils::{
    filter::{ListFilter, Page},
    format::format_date,
    response::ApiResponse,
};
use uuid::Uuid;

use super::StatusChange;
use crate::{DeploymentImpl, error::ApiError};

fn validate_items(items: &[CreateQuoteItem]) -> Result<(), ApiError> {
    for (i, item) in items.iter().enumerate() {
        if item.description.trim().is_empty() {
            return Err(ApiError::BadRequest(format!("Item {} has no description", i + 1)));
        }
        if !item.quantity.is_finite() || item.quantity <= 0.0 {
            return Err(ApiError::BadRequest(format!("Item {} needs a positive quantity", i + 1)));
        }
        if item.unit_price_cents < 0 {
            return Err(ApiError::BadRequest(format!("Item {} has a negative price", i + 1)));
        }
    }
    Ok(())
}

async fn load(deployment: &DeploymentImpl, id: Uuid) -> Result<QuoteWithItems, ApiError> {
    Quote::find_with_items(&deployment.db().pool, id)
        .await?
        .ok_or(ApiError::NotFound("Quote"))
}

pub async fn list_quotes(
    State(deployment): State<DeploymentImpl>,
    Query(filter): Query<ListFilter>,
) -> Result<ResponseJson<ApiResponse<Page<Quote>>>, ApiError> {
    let quotes = Quote::find_all(&deployment.db().pool).await?;
    Ok(ResponseJson(ApiResponse::success(filter.apply_paged(quotes))))
}

pub async fn get_quote(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<QuoteWithItems>>, ApiError> {
    Ok(ResponseJson(ApiResponse::success(load(&deployment, id).await?)))
}

pub async fn create_quote(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    axum::Json(payload): axum::Json<CreateQuote>,
) -> Result<ResponseJson<ApiResponse<QuoteWithItems>>, ApiError> {
    if payload.client.trim().is_empty() || payload.title.trim().is_empty() {
        return Err(ApiError::BadRequest("Client and title are required".into()));
    }
    validate_items(&payload.items)?;
    let quote =
        Quote::create(&deployment.db().pool, &payload, Some(user.id()), Uuid::new_v4()).await?;
    info!(
        quote_id = %quote.quote.id,
        folio = %quote.quote.folio,
        total_cents = quote.quote.total_cents,
        "Quote created"
    );
    deployment.publish_insert(Table::Quotes, quote.quote.id, &quote);
    Ok(ResponseJson(ApiResponse::success(quote)))
}

pub async fn update_quote(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
    axum::Json(payload): axum::Json<UpdateQuote>,
) -> Result<ResponseJson<ApiResponse<QuoteWithItems>>, ApiError> {
    Quote::update(&deployment.db().pool, id, &payload).await?;
    let quote = load(&deployment, id).await?;
    deployment.publish_update(Table::Quotes, id, &quote);
    Ok(ResponseJson(ApiResponse::success(quote)))
}

pub async fn replace_quote_items(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
    axum::Json(items): axum::Json<Vec<CreateQuoteItem>>,
) -> Result<ResponseJson<ApiResponse<QuoteWithItems>>, ApiError> {
    validate_items(&items)?;
    let quote = Quote::replace_items(&deployment.db().pool, id, &items).await?;
    deployment.publish_update(Table::Quotes, id, &quote);
    Ok(ResponseJson(ApiResponse::success(quote)))
}

/// An expired quote can still be rejected or marked expired, but not sent or approved.
fn ensure_open(quote: &Quote, status: QuoteStatus, today: NaiveDate) -> Result<(), ApiError> {
    if !matches!(status, QuoteStatus::Sent | QuoteStatus::Approved) || !quote.is_expired(today) {
        return Ok(());
    }
    let until = quote.valid_until.map(format_date).unwrap_or_default();
    Err(ApiError::Conflict(format!(
        "Quote {} expired on {}",
        quote.folio, until
    )))
}

pub async fn update_quote_status(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
    axum::Json(payload): axum::Json<StatusChange<QuoteStatus>>,
) -> Result<ResponseJson<ApiResponse<QuoteWithItems>>, ApiError> {
    let current = Quote::find_by_id(&deployment.db().pool, id)
        .await?
        .ok_or(ApiError::NotFound("Quote"))?;
    ensure_open(&current, payload.status, Utc::now().date_naive())?;
    Quote::update_status(&deployment.db().pool, id, payload.status).await?;
    let quote = load(&deployment, id).await?;
    info!(quote_id = %id, status = %quote.quote.status, "Quote status changed");
    deployment.publish_update(Table::Quotes, id, &quote);
    Ok(ResponseJson(ApiResponse::success(quote)))
}

pub async fn delete_quote(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    if Quote::delete(&deployment.db().pool, id).await? == 0 {
        return Err(ApiError::NotFound("Quote"));
    }
    deployment.publish_delete(Table::Quotes, id);
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().nest(
        "/quotes",
        Router::new()
            .route("/", get(list_quotes).post(create_quote))
            .route("/{id}", get(get_quote).put(update_quote).delete(delete_quote))
            .route("/{id}/items", put(replace_quote_items))
            .route("/{id}/status", patch(update_quote_status)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(description: &str, quantity: f64, price: i64) -> CreateQuoteItem {
        CreateQuoteItem {
            description: description.into(),
            unit: None,
            quantity,
            unit_price_cents: price,
        }
    }

    #[test]
    fn item_validation() {
        assert!(validate_items(&[item("Muro", 2.5, 10_000)]).is_ok());
        assert!(validate_items(&[]).is_ok());
        assert!(validate_items(&[item(" ", 1.0, 1)]).is_err());
        assert!(validate_items(&[item("Muro", 0.0, 1)]).is_err());
        assert!(validate_items(&[item("Muro", f64::NAN, 1)]).is_err());
        assert!(validate_items(&[item("Muro", 1.0, -1)]).is_err());
    }
}
