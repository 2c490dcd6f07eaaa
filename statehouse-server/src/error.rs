//! Error types for the HTTP layer

use axum::http::StatusCode;
use axum::http::header::WWW_AUTHENTICATE;
use axum::response::{IntoResponse, Response};
use log::error;
use statehouse_state::BackendError;
use thiserror::Error;

use crate::auth::AuthError;
use crate::config::ConfigError;

/// Errors that end a request before it reaches the protocol outcome
///
/// Lock conflicts are not errors; handlers answer them with 423 directly.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("missing project name")]
    MissingProject,

    #[error("invalid project name: {0:?}")]
    InvalidProject(String),

    #[error("authentication required")]
    Unauthorized,

    /// The identity layer produced nothing; a deployment problem
    #[error("no principal could be resolved for this request; check the server's auth settings")]
    MissingPrincipal,

    #[error("resolved principal is not usable as a storage key: {0:?}")]
    InvalidPrincipal(String),

    #[error("invalid lock body: {0}")]
    InvalidLockBody(String),

    #[error("missing lock ID")]
    MissingLockId,

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingProject
            | Self::InvalidProject(_)
            | Self::InvalidLockBody(_)
            | Self::MissingLockId => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::MissingPrincipal | Self::InvalidPrincipal(_) | Self::Backend(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Unauthorized => Self::Unauthorized,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("request failed: {}", self);
        }

        let body = format!("{}\n", self);
        match self {
            Self::Unauthorized => (
                status,
                [(WWW_AUTHENTICATE, r#"Basic realm="statehouse""#)],
                body,
            )
                .into_response(),
            _ => (status, body).into_response(),
        }
    }
}

/// Errors that stop the server from starting or keep it from running
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
