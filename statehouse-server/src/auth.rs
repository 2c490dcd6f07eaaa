//! Principal resolution
//!
//! Every state and lock is scoped to the principal that owns it. Resolvers
//! turn request headers into that principal. An empty principal is a
//! deployment problem and is reported as such by the handlers.

use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, HeaderName};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use statehouse_state::ResourceKey;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    /// Credentials are missing, malformed, or wrong
    #[error("authentication required")]
    Unauthorized,
}

/// Resolve the calling principal from request headers
pub trait PrincipalResolver: Send + Sync {
    fn resolve(&self, headers: &HeaderMap) -> Result<String, AuthError>;
}

/// HTTP Basic authentication; the username is the principal
///
/// Terraform sends these credentials from the backend's `username` and
/// `password` settings.
pub struct BasicAuth {
    /// Shared password every user must present, if set
    password: Option<String>,
}

impl BasicAuth {
    pub fn new(password: Option<String>) -> Self {
        Self { password }
    }
}

impl PrincipalResolver for BasicAuth {
    fn resolve(&self, headers: &HeaderMap) -> Result<String, AuthError> {
        let value = headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::Unauthorized)?
            .to_str()
            .map_err(|_| AuthError::Unauthorized)?;

        let (scheme, encoded) = value.split_once(' ').ok_or(AuthError::Unauthorized)?;
        if !scheme.eq_ignore_ascii_case("basic") {
            return Err(AuthError::Unauthorized);
        }

        let decoded = STANDARD
            .decode(encoded.trim())
            .map_err(|_| AuthError::Unauthorized)?;
        let decoded = String::from_utf8(decoded).map_err(|_| AuthError::Unauthorized)?;
        let (username, password) = decoded.split_once(':').ok_or(AuthError::Unauthorized)?;

        if let Some(expected) = &self.password
            && password != expected
        {
            return Err(AuthError::Unauthorized);
        }

        // The username is client-chosen; an unusable one is a bad credential.
        // Empty is left for the handler's missing-principal check.
        if !username.is_empty() && !ResourceKey::is_valid_component(username) {
            return Err(AuthError::Unauthorized);
        }

        Ok(username.to_string())
    }
}

/// Principal set by a trusted upstream proxy
pub struct TrustedHeader {
    header: HeaderName,
}

impl TrustedHeader {
    pub fn new(header: HeaderName) -> Self {
        Self { header }
    }
}

impl PrincipalResolver for TrustedHeader {
    fn resolve(&self, headers: &HeaderMap) -> Result<String, AuthError> {
        // A missing header means the proxy is not doing its job; the
        // empty principal lets the handler report that
        Ok(headers
            .get(&self.header)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_string())
            .unwrap_or_default())
    }
}

/// One fixed principal for single-tenant deployments
pub struct StaticPrincipal {
    principal: String,
}

impl StaticPrincipal {
    pub fn new(principal: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
        }
    }
}

impl PrincipalResolver for StaticPrincipal {
    fn resolve(&self, _headers: &HeaderMap) -> Result<String, AuthError> {
        Ok(self.principal.clone())
    }
}
