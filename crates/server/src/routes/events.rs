use std::time::Duration;

use axum::{
    Router,
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
};
use deployment::Deployment;
use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use services::services::events::{EventFilter, LiveMessage};
use tracing::debug;

use crate::{DeploymentImpl, error::ApiError};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventsQuery {
    pub tables: Option<String>,
    pub kinds: Option<String>,
}

fn to_sse(message: LiveMessage) -> Result<Event, axum::Error> {
    let name = match &message {
        LiveMessage::Change(_) => "change",
        LiveMessage::Resync => "resync",
    };
    Event::default().event(name).json_data(&message)
}

/// `GET /api/events?tables=projects,tasks&kinds=insert`
pub async fn stream_events(
    State(deployment): State<DeploymentImpl>,
    Query(query): Query<EventsQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    let filter = EventFilter::parse(query.tables.as_deref(), query.kinds.as_deref())?;
    debug!(?filter, "Realtime subscriber connected");
    let stream = deployment.events().subscribe(filter).map(to_sse);
    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().route("/events", get(stream_events))
}
