use axum::{
    Router,
    extract::{Query, State},
    response::Json as ResponseJson,
    routing::get,
};
use deployment::Deployment;
use serde::Deserialize;
use services::services::weather::Forecast;
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError};

/// Coordinates default to the company site from the configuration.
#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct WeatherQuery {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

pub async fn get_weather(
    State(deployment): State<DeploymentImpl>,
    Query(query): Query<WeatherQuery>,
) -> Result<ResponseJson<ApiResponse<Forecast>>, ApiError> {
    let config = deployment.config();
    let lat = query.lat.unwrap_or(config.default_latitude);
    let lon = query.lon.unwrap_or(config.default_longitude);
    let forecast = deployment.weather().forecast(lat, lon).await?;
    Ok(ResponseJson(ApiResponse::success(forecast)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().route("/weather", get(get_weather))
}
