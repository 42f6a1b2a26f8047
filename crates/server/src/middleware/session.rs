//! Session gate in front of every route except health and login.

use axum::{
    extract::{Request, State},
    http::{Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::{
    TypedHeader,
    extract::CookieJar,
    headers::{Authorization, authorization::Bearer},
};
use deployment::Deployment;
use services::services::auth::{AuthError, AuthUser};
use tracing::debug;

use crate::{DeploymentImpl, error::ApiError};

pub const SESSION_COOKIE: &str = "obra-access-token";

const UNGATED: [&str; 2] = ["/api/health", "/login"];

fn is_api(path: &str) -> bool {
    path == "/api" || path.starts_with("/api/")
}

fn is_read(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// Role check for an authenticated request.
pub fn authorize(user: &AuthUser, method: &Method, path: &str) -> Result<(), ApiError> {
    if is_read(method) {
        return Ok(());
    }
    if path.starts_with("/api/users") && !user.is_admin() {
        return Err(ApiError::Forbidden("Only administrators can manage users".into()));
    }
    if !user.can_write() {
        return Err(ApiError::Forbidden(format!(
            "The {} role is read-only",
            user.role()
        )));
    }
    Ok(())
}

fn login_redirect(req: &Request) -> Response {
    let next = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    Redirect::to(&format!("/login?next={}", urlencoding::encode(next))).into_response()
}

pub async fn require_session(
    State(deployment): State<DeploymentImpl>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    let path = req.uri().path().to_string();
    if UNGATED.contains(&path.as_str()) {
        return next.run(req).await;
    }

    let token = bearer
        .map(|TypedHeader(Authorization(b))| b.token().to_string())
        .or_else(|| jar.get(SESSION_COOKIE).map(|c| c.value().to_string()));

    let result = match token {
        Some(token) => {
            deployment
                .auth()
                .authenticate(&deployment.db().pool, &token)
                .await
        }
        None => Err(AuthError::MissingToken),
    };

    let user = match result {
        Ok(user) => user,
        Err(e) if !is_api(&path) => {
            debug!(path = %path, error = %e, "Redirecting to login");
            return login_redirect(&req);
        }
        Err(e) => return ApiError::from(e).into_response(),
    };

    if let Err(e) = authorize(&user, req.method(), &path) {
        return e.into_response();
    }

    req.extensions_mut().insert(user);
    next.run(req).await
}

/// Fallback for authenticated page requests; pages are rendered elsewhere.
pub async fn page_not_found() -> impl IntoResponse {
    StatusCode::NOT_FOUND
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use db::models::profile::{Profile, Role};
    use uuid::Uuid;

    use super::*;

    fn user(role: Role) -> AuthUser {
        AuthUser {
            profile: Profile {
                id: Uuid::new_v4(),
                email: "a@obra.mx".into(),
                full_name: "Ana".into(),
                role,
                active: true,
                phone: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
        }
    }

    #[test]
    fn viewers_only_read() {
        let viewer = user(Role::Viewer);
        assert!(authorize(&viewer, &Method::GET, "/api/projects").is_ok());
        assert!(matches!(
            authorize(&viewer, &Method::POST, "/api/projects"),
            Err(ApiError::Forbidden(_))
        ));
    }

    #[test]
    fn user_admin_needs_admin() {
        let manager = user(Role::Manager);
        assert!(authorize(&manager, &Method::POST, "/api/tasks").is_ok());
        assert!(authorize(&manager, &Method::GET, "/api/users").is_ok());
        assert!(authorize(&manager, &Method::PATCH, "/api/users/x/role").is_err());
        assert!(authorize(&user(Role::Admin), &Method::PATCH, "/api/users/x/role").is_ok());
    }

    #[test]
    fn api_prefix_detection() {
        assert!(is_api("/api/projects"));
        assert!(is_api("/api"));
        assert!(!is_api("/apiary"));
        assert!(!is_api("/projects"));
    }
}
