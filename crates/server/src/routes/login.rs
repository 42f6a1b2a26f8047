//! Sign-in landing for browsers bounced by the session gate.
//!
//! The hosted auth provider issues the access token; this route only checks it
//! and stores it in the session cookie.

use axum::{
    Form, Router,
    extract::{Query, State},
    response::{Json as ResponseJson, Redirect},
    routing::get,
};
use axum_extra::extract::{
    CookieJar,
    cookie::{Cookie, SameSite},
};
use deployment::Deployment;
use serde::{Deserialize, Serialize};
use tracing::info;
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError, middleware::session::SESSION_COOKIE};

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct LoginQuery {
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct LoginPage {
    pub next: String,
    pub auth_configured: bool,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct LoginForm {
    pub access_token: String,
    #[serde(default)]
    pub next: Option<String>,
}

/// Only same-site absolute paths are followed; anything else lands on `/`.
fn safe_next(next: Option<&str>) -> String {
    match next.map(str::trim) {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => {
            path.to_string()
        }
        _ => "/".to_string(),
    }
}

pub async fn login_page(
    State(deployment): State<DeploymentImpl>,
    Query(query): Query<LoginQuery>,
) -> ResponseJson<ApiResponse<LoginPage>> {
    ResponseJson(ApiResponse::success(LoginPage {
        next: safe_next(query.next.as_deref()),
        auth_configured: deployment.auth().is_configured(),
    }))
}

pub async fn login(
    State(deployment): State<DeploymentImpl>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<(CookieJar, Redirect), ApiError> {
    let token = form.access_token.trim().to_string();
    let user = deployment
        .auth()
        .authenticate(&deployment.db().pool, &token)
        .await?;
    info!(user_id = %user.id(), "Signed in");

    let cookie = Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax);
    let next = safe_next(form.next.as_deref());
    Ok((jar.add(cookie), Redirect::to(&next)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().route("/login", get(login_page).post(login))
}
