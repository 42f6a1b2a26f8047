use axum::{Router, extract::State, response::Json as ResponseJson, routing::get};
use deployment::Deployment;
use serde::Serialize;
use tracing::warn;
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::DeploymentImpl;

#[derive(Debug, Clone, Serialize, TS)]
pub struct Health {
    pub database: bool,
    pub auth_configured: bool,
    pub realtime_subscribers: usize,
    pub version: String,
}

pub async fn health(State(deployment): State<DeploymentImpl>) -> ResponseJson<ApiResponse<Health>> {
    let database = match deployment.db().health_check().await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Database health check failed");
            false
        }
    };
    ResponseJson(ApiResponse::success(Health {
        database,
        auth_configured: deployment.auth().is_configured(),
        realtime_subscribers: deployment.events().subscriber_count(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().route("/health", get(health))
}
