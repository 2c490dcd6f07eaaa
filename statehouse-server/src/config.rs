//! Command line and environment configuration

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::http::HeaderName;
use clap::{ArgAction, Parser, ValueEnum};
use statehouse_state::BackendConfig;
use thiserror::Error;

use crate::auth::{BasicAuth, PrincipalResolver, StaticPrincipal, TrustedHeader};
use crate::route::RouteLayout;

/// Default request body limit: Terraform state files can be large
pub const DEFAULT_MAX_STATE_BYTES: usize = 64 * 1024 * 1024;

#[derive(Debug, Parser)]
#[command(name = "statehouse")]
#[command(about = "Terraform HTTP remote-state backend with per-project locking", long_about = None)]
pub struct Cli {
    /// Address to listen on
    #[arg(long, env = "STATEHOUSE_BIND", default_value = "127.0.0.1:8080")]
    pub bind: SocketAddr,

    /// URL shape to serve
    #[arg(long, env = "STATEHOUSE_ROUTE_LAYOUT", value_enum, default_value_t = RouteLayout::States)]
    pub route_layout: RouteLayout,

    /// Where state files and locks are stored
    #[arg(long, env = "STATEHOUSE_BACKEND", value_enum, default_value_t = BackendKind::Local)]
    pub backend: BackendKind,

    /// Data directory for the local backend
    #[arg(long, env = "STATEHOUSE_DATA_DIR", default_value = "statehouse-data")]
    pub data_dir: PathBuf,

    /// Bucket for the s3 backend
    #[arg(long, env = "STATEHOUSE_S3_BUCKET")]
    pub s3_bucket: Option<String>,

    /// Region for the s3 backend (e.g. ap-northeast-1)
    #[arg(long, env = "STATEHOUSE_S3_REGION")]
    pub s3_region: Option<String>,

    /// Key prefix for the s3 backend
    #[arg(long, env = "STATEHOUSE_S3_PREFIX")]
    pub s3_prefix: Option<String>,

    /// Request server-side encryption for s3 objects
    #[arg(long, env = "STATEHOUSE_S3_ENCRYPT", default_value_t = true, action = ArgAction::Set)]
    pub s3_encrypt: bool,

    /// How the calling principal is determined
    #[arg(long, env = "STATEHOUSE_AUTH", value_enum, default_value_t = AuthMode::Basic)]
    pub auth: AuthMode,

    /// Shared password for basic auth
    #[arg(long, env = "STATEHOUSE_AUTH_PASSWORD", hide_env_values = true)]
    pub auth_password: Option<String>,

    /// Header carrying the principal when auth=header
    #[arg(long, env = "STATEHOUSE_PRINCIPAL_HEADER")]
    pub principal_header: Option<String>,

    /// Fixed principal when auth=static
    #[arg(long, env = "STATEHOUSE_STATIC_PRINCIPAL")]
    pub static_principal: Option<String>,

    /// Largest accepted request body in bytes
    #[arg(long, env = "STATEHOUSE_MAX_STATE_BYTES", default_value_t = DEFAULT_MAX_STATE_BYTES)]
    pub max_state_bytes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    Memory,
    Local,
    S3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AuthMode {
    Basic,
    Header,
    Static,
}

/// How principals are resolved, validated
#[derive(Debug, Clone)]
pub enum AuthConfig {
    Basic { password: Option<String> },
    Header(HeaderName),
    Static(String),
}

impl AuthConfig {
    pub fn resolver(&self) -> Arc<dyn PrincipalResolver> {
        match self {
            Self::Basic { password } => Arc::new(BasicAuth::new(password.clone())),
            Self::Header(header) => Arc::new(TrustedHeader::new(header.clone())),
            Self::Static(principal) => Arc::new(StaticPrincipal::new(principal.clone())),
        }
    }
}

/// Validated server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub layout: RouteLayout,
    pub backend: BackendConfig,
    pub auth: AuthConfig,
    pub max_state_bytes: usize,
}

impl ServerConfig {
    /// Check flag combinations and build the configuration
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        let backend = match cli.backend {
            BackendKind::Memory => BackendConfig::new("memory"),
            BackendKind::Local => BackendConfig::new("local")
                .with_attribute("path", cli.data_dir.to_string_lossy()),
            BackendKind::S3 => {
                let bucket = cli.s3_bucket.ok_or(ConfigError::Missing("--s3-bucket"))?;
                let region = cli.s3_region.ok_or(ConfigError::Missing("--s3-region"))?;
                let mut config = BackendConfig::new("s3")
                    .with_attribute("bucket", bucket)
                    .with_attribute("region", region)
                    .with_attribute("encrypt", cli.s3_encrypt.to_string());
                if let Some(prefix) = cli.s3_prefix {
                    config = config.with_attribute("prefix", prefix);
                }
                config
            }
        };

        let auth = match cli.auth {
            AuthMode::Basic => AuthConfig::Basic {
                password: cli.auth_password.filter(|p| !p.is_empty()),
            },
            AuthMode::Header => {
                let name = cli
                    .principal_header
                    .ok_or(ConfigError::Missing("--principal-header"))?;
                let header = HeaderName::try_from(name.as_str()).map_err(|_| {
                    ConfigError::Invalid("--principal-header", "must be a valid header name")
                })?;
                AuthConfig::Header(header)
            }
            AuthMode::Static => {
                let principal = cli
                    .static_principal
                    .ok_or(ConfigError::Missing("--static-principal"))?;
                if principal.trim().is_empty() {
                    return Err(ConfigError::Invalid(
                        "--static-principal",
                        "must not be empty",
                    ));
                }
                AuthConfig::Static(principal)
            }
        };

        if cli.max_state_bytes == 0 {
            return Err(ConfigError::Invalid(
                "--max-state-bytes",
                "must be a positive integer",
            ));
        }

        Ok(Self {
            bind: cli.bind,
            layout: cli.route_layout,
            backend,
            auth,
            max_state_bytes: cli.max_state_bytes,
        })
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required setting is missing.
    #[error("missing required setting: {0}")]
    Missing(&'static str),

    /// A setting has an invalid value.
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, &'static str),
}
