use axum::{
    http::{
        header::{LOCATION, SET_COOKIE},
        HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt::Display;

use crate::domain::DomainError;

pub type AppResult<T> = Result<T, AppError>;

pub const LOGIN_PATH: &str = "/login";

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    location: Option<&'static str>,
    set_cookie: Option<HeaderValue>,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            location: None,
            set_cookie: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "invalid credentials")
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "resource not found")
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }

    pub fn internal<E: Display>(error: E) -> Self {
        tracing::error!(error = %error, "request failed");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "action failed")
    }

    /// `303 See Other` to the login page, optionally replacing the session cookie.
    pub fn redirect_to_login(set_cookie: Option<HeaderValue>) -> Self {
        Self {
            status: StatusCode::SEE_OTHER,
            message: String::new(),
            location: Some(LOGIN_PATH),
            set_cookie,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut response = if let Some(location) = self.location {
            let mut response = self.status.into_response();
            response
                .headers_mut()
                .insert(LOCATION, HeaderValue::from_static(location));
            response
        } else {
            let body = Json(ErrorResponse {
                error: self.message,
            });
            (self.status, body).into_response()
        };

        if let Some(cookie) = self.set_cookie {
            response.headers_mut().insert(SET_COOKIE, cookie);
        }
        response
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl From<DomainError> for AppError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::NotFound(message) => AppError::new(StatusCode::NOT_FOUND, message),
            DomainError::Conflict(message) => AppError::conflict(message),
            DomainError::Forbidden(message) => AppError::forbidden(message),
            DomainError::InvalidInput(message) => AppError::bad_request(message),
            DomainError::InvalidState(message) => {
                AppError::new(StatusCode::UNPROCESSABLE_ENTITY, message)
            }
            DomainError::Database(err) => AppError::from(err),
        }
    }
}

impl From<diesel::result::Error> for AppError {
    fn from(value: diesel::result::Error) -> Self {
        match value {
            diesel::result::Error::NotFound => AppError::not_found(),
            diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::UniqueViolation,
                _,
            ) => AppError::conflict("record already exists"),
            _ => AppError::internal(value),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(value: validator::ValidationErrors) -> Self {
        AppError::bad_request(value.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        AppError::internal(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        AppError::internal(value)
    }
}
