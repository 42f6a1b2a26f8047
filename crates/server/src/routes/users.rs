//! User administration. Mutations are limited to admins by the session gate.

use axum::{
    Extension, Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::{get, patch, put},
};
use db::models::profile::{Profile, Role, RoleCount, UpdateProfile};
use deployment::Deployment;
use serde::{Deserialize, Serialize};
use services::services::{auth::AuthUser, events::Table};
use tracing::info;
use ts_rs::TS;
use utils::{
    filter::{ListFilter, Page},
    response::ApiResponse,
};
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError};

#[derive(Debug, Clone, Deserialize, TS)]
pub struct RoleChange {
    pub role: Role,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct ActiveChange {
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct UserDirectory {
    pub users: Page<Profile>,
    pub by_role: Vec<RoleCount>,
}

/// Refuses changes that would leave the installation without an active admin.
async fn ensure_admin_remains(
    deployment: &DeploymentImpl,
    target: &Profile,
) -> Result<(), ApiError> {
    if target.role.is_admin() && target.active {
        let admins = Profile::count_active_admins(&deployment.db().pool).await?;
        if admins <= 1 {
            return Err(ApiError::Conflict(
                "At least one active administrator is required".into(),
            ));
        }
    }
    Ok(())
}

async fn find(deployment: &DeploymentImpl, id: Uuid) -> Result<Profile, ApiError> {
    Profile::find_by_id(&deployment.db().pool, id)
        .await?
        .ok_or(ApiError::NotFound("User"))
}

pub async fn list_users(
    State(deployment): State<DeploymentImpl>,
    Query(filter): Query<ListFilter>,
) -> Result<ResponseJson<ApiResponse<UserDirectory>>, ApiError> {
    let pool = &deployment.db().pool;
    let users = filter.apply_paged(Profile::find_all(pool).await?);
    let by_role = Profile::count_by_role(pool).await?;
    Ok(ResponseJson(ApiResponse::success(UserDirectory {
        users,
        by_role,
    })))
}

pub async fn me(Extension(user): Extension<AuthUser>) -> ResponseJson<ApiResponse<AuthUser>> {
    ResponseJson(ApiResponse::success(user))
}

pub async fn update_user(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<Uuid>,
    axum::Json(payload): axum::Json<UpdateProfile>,
) -> Result<ResponseJson<ApiResponse<Profile>>, ApiError> {
    let profile = Profile::update(&deployment.db().pool, id, &payload).await?;
    deployment.publish_update(Table::Profiles, profile.id, &profile);
    Ok(ResponseJson(ApiResponse::success(profile)))
}

pub async fn set_user_role(
    State(deployment): State<DeploymentImpl>,
    Extension(admin): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    axum::Json(payload): axum::Json<RoleChange>,
) -> Result<ResponseJson<ApiResponse<Profile>>, ApiError> {
    let target = find(&deployment, id).await?;
    if !payload.role.is_admin() {
        ensure_admin_remains(&deployment, &target).await?;
    }
    let profile = Profile::set_role(&deployment.db().pool, id, payload.role).await?;
    info!(user_id = %id, role = %profile.role, by = %admin.id(), "Role changed");
    deployment.publish_update(Table::Profiles, profile.id, &profile);
    Ok(ResponseJson(ApiResponse::success(profile)))
}

pub async fn set_user_active(
    State(deployment): State<DeploymentImpl>,
    Extension(admin): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    axum::Json(payload): axum::Json<ActiveChange>,
) -> Result<ResponseJson<ApiResponse<Profile>>, ApiError> {
    let target = find(&deployment, id).await?;
    if !payload.active {
        if target.id == admin.id() {
            return Err(ApiError::Conflict("You cannot disable your own account".into()));
        }
        ensure_admin_remains(&deployment, &target).await?;
    }
    let profile = Profile::set_active(&deployment.db().pool, id, payload.active).await?;
    info!(user_id = %id, active = profile.active, by = %admin.id(), "Account status changed");
    deployment.publish_update(Table::Profiles, profile.id, &profile);
    Ok(ResponseJson(ApiResponse::success(profile)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new()
        .route("/me", get(me))
        .nest(
            "/users",
            Router::new()
                .route("/", get(list_users))
                .route("/{id}", put(update_user))
                .route("/{id}/role", patch(set_user_role))
                .route("/{id}/active", patch(set_user_active)),
        )
}
