//! Statehouse server
//!
//! A Terraform `http` remote-state backend. Each principal gets its own
//! namespace of projects; each project has one state file and one lock.
//!
//! ```text
//! GET    /states/{project}             read state (200, or 204 if none)
//! POST   /states/{project}?ID={lock}   write state (423 if locked by someone else)
//! DELETE /states/{project}             delete state (423 if locked)
//! PUT    /states/{project}/lock        acquire lock (423 on conflict)
//! DELETE /states/{project}/lock        release lock (423 on mismatch)
//! GET    /states/{project}/lock        show current lock
//! PUT    /states/{project}/lock/purge  drop lock unconditionally
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod route;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use log::info;
use statehouse_state::{BlobStore, LockRegistry, Stores, create_stores};

use crate::auth::PrincipalResolver;
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::route::RouteLayout;

/// Shared state handed to every request
#[derive(Clone)]
pub struct AppState {
    pub layout: RouteLayout,
    pub blobs: Arc<dyn BlobStore>,
    pub locks: Arc<LockRegistry>,
    pub auth: Arc<dyn PrincipalResolver>,
    pub max_state_bytes: usize,
}

impl AppState {
    pub fn new(layout: RouteLayout, stores: Stores, auth: Arc<dyn PrincipalResolver>) -> Self {
        Self {
            layout,
            blobs: stores.blobs,
            locks: Arc::new(LockRegistry::new(stores.locks)),
            auth,
            max_state_bytes: config::DEFAULT_MAX_STATE_BYTES,
        }
    }

    pub fn with_max_state_bytes(mut self, max_state_bytes: usize) -> Self {
        self.max_state_bytes = max_state_bytes;
        self
    }
}

/// Build the router
///
/// All routing happens in `handlers::dispatch`, so the fallback is the
/// only handler.
pub fn app(state: AppState) -> Router {
    let limit = state.max_state_bytes;
    Router::new()
        .fallback(handlers::dispatch)
        .layer(DefaultBodyLimit::max(limit))
        .with_state(state)
}

/// Open the stores, bind, and serve until Ctrl-C
pub async fn run(config: ServerConfig) -> Result<(), ServerError> {
    let stores = create_stores(&config.backend).await?;
    info!(
        "using {} backend, {:?} route layout",
        config.backend.backend_type, config.layout
    );

    let state = AppState::new(config.layout, stores, config.auth.resolver())
        .with_max_state_bytes(config.max_state_bytes);

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // Without a signal handler the server runs until killed
        std::future::pending::<()>().await;
    }
}
