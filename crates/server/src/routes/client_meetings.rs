use axum::{
    Extension, Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::{get, patch},
};
use chrono::Utc;
use db::models::client_meeting::{
    ClientMeeting, CreateClientMeeting, MeetingStatus, UpdateClientMeeting,
};
use deployment::Deployment;
use serde::Deserialize;
use services::services::{auth::AuthUser, events::Table};
use ts_rs::TS;
use utils::{
    filter::{ListFilter, Page},
    response::ApiResponse,
};
use uuid::Uuid;

use super::StatusChange;
use crate::{DeploymentImpl, error::ApiError};

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct MeetingScope {
    #[serde(default)]
    pub upcoming: bool,
}

pub async fn list_meetings(
    State(deployment): State<DeploymentImpl>,
    Query(scope): Query<MeetingScope>,
    Query(filter): Query<ListFilter>,
) -> Result<ResponseJson<ApiResponse<Page<ClientMeeting>>>, ApiError> {
    let pool = &deployment.db().pool;
    let meetings = if scope.upcoming {
        ClientMeeting::find_upcoming(pool, Utc::now()).await?
    } else {
        ClientMeeting::find_all(pool).await?
    };
    Ok(ResponseJson(ApiResponse::success(filter.apply_paged(meetings))))
}

pub async fn get_meeting(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<ClientMeeting>>, ApiError> {
    let meeting = ClientMeeting::find_by_id(&deployment.db().pool, id)
        .await?
        .ok_or(ApiError::NotFound("Client meeting"))?;
    Ok(ResponseJson(ApiResponse::success(meeting)))
}

pub async fn create_meeting(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    axum::Json(payload): axum::Json<CreateClientMeeting>,
) -> Result<ResponseJson<ApiResponse<ClientMeeting>>, ApiError> {
    if payload.client.trim().is_empty() || payload.purpose.trim().is_empty() {
        return Err(ApiError::BadRequest("Client and purpose are required".into()));
    }
    let meeting = ClientMeeting::create(
        &deployment.db().pool,
        &payload,
        Some(user.id()),
        Uuid::new_v4(),
    )
    .await?;
    deployment.publish_insert(Table::ClientMeetings, meeting.id, &meeting);
    Ok(ResponseJson(ApiResponse::success(meeting)))
}

pub async fn update_meeting(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
    axum::Json(payload): axum::Json<UpdateClientMeeting>,
) -> Result<ResponseJson<ApiResponse<ClientMeeting>>, ApiError> {
    let meeting = ClientMeeting::update(&deployment.db().pool, id, &payload).await?;
    deployment.publish_update(Table::ClientMeetings, meeting.id, &meeting);
    Ok(ResponseJson(ApiResponse::success(meeting)))
}

pub async fn update_meeting_status(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
    axum::Json(payload): axum::Json<StatusChange<MeetingStatus>>,
) -> Result<ResponseJson<ApiResponse<ClientMeeting>>, ApiError> {
    let meeting = ClientMeeting::update_status(&deployment.db().pool, id, payload.status).await?;
    deployment.publish_update(Table::ClientMeetings, meeting.id, &meeting);
    Ok(ResponseJson(ApiResponse::success(meeting)))
}

pub async fn delete_meeting(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    if ClientMeeting::delete(&deployment.db().pool, id).await? == 0 {
        return Err(ApiError::NotFound("Client meeting"));
    }
    deployment.publish_delete(Table::ClientMeetings, id);
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().nest(
        "/client-meetings",
        Router::new()
            .route("/", get(list_meetings).post(create_meeting))
            .route(
                "/{id}",
                get(get_meeting).put(update_meeting).delete(delete_meeting),
            )
            .route("/{id}/status", patch(update_meeting_status)),
    )
}
