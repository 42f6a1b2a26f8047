use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use services::services::{
    auth::AuthError, dashboard::DashboardError, events::EventError, finance::FinanceError,
    storage::StorageError, weather::WeatherError,
};
use thiserror::Error;
use utils::response::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Dashboard(#[from] DashboardError),
    #[error(transparent)]
    Finance(#[from] FinanceError),
    #[error(transparent)]
    Events(#[from] EventError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Weather(#[from] WeatherError),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Conflict(String),
}

fn database_status(e: &sqlx::Error) -> StatusCode {
    match e {
        sqlx::Error::RowNotFound => StatusCode::NOT_FOUND,
        sqlx::Error::Database(db) => match db.kind() {
            sqlx::error::ErrorKind::UniqueViolation
            | sqlx::error::ErrorKind::ForeignKeyViolation
            | sqlx::error::ErrorKind::CheckViolation
            | sqlx::error::ErrorKind::NotNullViolation => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        },
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Database(e) => database_status(e),
            ApiError::Auth(e) => match e {
                AuthError::Inactive | AuthError::EmailInUse(_) => StatusCode::FORBIDDEN,
                AuthError::Database(e) => database_status(e),
                _ => StatusCode::UNAUTHORIZED,
            },
            ApiError::Dashboard(DashboardError::Database(e)) => database_status(e),
            ApiError::Finance(e) => match e {
                FinanceError::InvalidRange { .. } => StatusCode::BAD_REQUEST,
                FinanceError::Database(e) => database_status(e),
            },
            ApiError::Events(_) => StatusCode::BAD_REQUEST,
            ApiError::Storage(StorageError::InvalidPath(_)) => StatusCode::BAD_REQUEST,
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Weather(e) => match e {
                WeatherError::InvalidCoordinates { .. } => StatusCode::BAD_REQUEST,
                WeatherError::Timeout => StatusCode::GATEWAY_TIMEOUT,
                _ => StatusCode::BAD_GATEWAY,
            },
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
        }
    }

    /// Text shown to the client. Database and upstream failures are reported
    /// generically; the details only go to the log.
    fn client_message(&self, status: StatusCode) -> String {
        match self {
            ApiError::Database(sqlx::Error::RowNotFound) => "Record not found".to_string(),
            ApiError::Database(_) if status == StatusCode::CONFLICT => {
                "The change conflicts with existing data".to_string()
            }
            ApiError::Weather(WeatherError::Timeout) => "Weather service timed out".to_string(),
            ApiError::Weather(_) if status.is_server_error() => {
                "Weather service unavailable".to_string()
            }
            _ if status.is_server_error() => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "Request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }
        let message = self.client_message(status);
        (status, Json(ApiResponse::<()>::error(&message))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_statuses() {
        assert_eq!(
            ApiError::Database(sqlx::Error::RowNotFound).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Auth(AuthError::Expired).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::Auth(AuthError::Inactive).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::Weather(WeatherError::InvalidCoordinates { lat: 99.0, lon: 0.0 }).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Database(sqlx::Error::PoolTimedOut).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn hides_internal_details() {
        let err = ApiError::Database(sqlx::Error::PoolTimedOut);
        assert_eq!(err.client_message(err.status_code()), "Internal server error");

        let err = ApiError::BadRequest("amount must be positive".into());
        assert_eq!(err.client_message(err.status_code()), "amount must be positive");
    }

    #[test]
    fn upstream_weather_body_stays_in_the_log() {
        let err = ApiError::Weather(WeatherError::Http {
            status: 500,
            body: "stack trace from upstream".into(),
        });
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.client_message(err.status_code()), "Weather service unavailable");

        let err = ApiError::Weather(WeatherError::Timeout);
        assert_eq!(err.status_code(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(err.client_message(err.status_code()), "Weather service timed out");

        let err = ApiError::Weather(WeatherError::InvalidCoordinates { lat: 99.0, lon: 0.0 });
        assert!(err.client_message(err.status_code()).starts_with("invalid coordinates"));
    }

    #[test]
    fn email_conflicts_on_sign_in_are_forbidden() {
        let err = ApiError::Auth(AuthError::EmailInUse("ana@obra.mx".into()));
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }
}
