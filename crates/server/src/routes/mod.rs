use axum::{Router, middleware::from_fn_with_state};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use ts_rs::TS;
use uuid::Uuid;

use crate::{DeploymentImpl, middleware::session};

pub mod client_meetings;
pub mod dashboard;
pub mod events;
pub mod expenses;
pub mod finance;
pub mod health;
pub mod incidents;
pub mod login;
pub mod minutes;
pub mod projects;
pub mod quotes;
pub mod reports;
pub mod surveys;
pub mod tasks;
pub mod users;
pub mod weather;

/// Body of every `PATCH …/status` endpoint.
#[derive(Debug, Clone, Deserialize, TS)]
pub struct StatusChange<S> {
    pub status: S,
}

/// Optional `?project_id=` narrowing accepted next to [`utils::filter::ListFilter`].
#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct ProjectScope {
    #[serde(default)]
    pub project_id: Option<Uuid>,
}

pub fn router(deployment: DeploymentImpl) -> Router {
    let api = Router::new()
        .merge(health::router(&deployment))
        .merge(dashboard::router(&deployment))
        .merge(projects::router(&deployment))
        .merge(tasks::router(&deployment))
        .merge(expenses::router(&deployment))
        .merge(incidents::router(&deployment))
        .merge(surveys::router(&deployment))
        .merge(quotes::router(&deployment))
        .merge(reports::router(&deployment))
        .merge(minutes::router(&deployment))
        .merge(client_meetings::router(&deployment))
        .merge(finance::router(&deployment))
        .merge(users::router(&deployment))
        .merge(weather::router(&deployment))
        .merge(events::router(&deployment));

    Router::new()
        .nest("/api", api)
        .merge(login::router(&deployment))
        .fallback(session::page_not_found)
        .layer(from_fn_with_state(deployment.clone(), session::require_session))
        .layer(TraceLayer::new_for_http())
        .with_state(deployment)
}
