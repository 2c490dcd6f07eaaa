//! Terraform HTTP backend protocol handlers
//!
//! Status codes follow Terraform's `http` backend client: 200 for success,
//! 204 for "no state yet", 423 with the current lock as body on conflict.
//! Validation (project, principal, body) always finishes before any storage
//! or lock interaction.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use log::{debug, info, warn};
use statehouse_state::{AcquireOutcome, LockInfo, ReleaseOutcome, ResourceKey};

use crate::AppState;
use crate::error::ApiError;
use crate::route::Route;

/// Entry point for every request
pub async fn dispatch(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let Some(route) = Route::parse(state.layout, &method, uri.path()) else {
        debug!("no route for {} {}", method, uri.path());
        return Ok(not_found());
    };

    let key = resource_key(&state, &route, &headers)?;

    match route {
        Route::GetState { .. } => get_state(&state, &key).await,
        Route::PostState { .. } => post_state(&state, &key, query_lock_id(&uri), body).await,
        Route::DeleteState { .. } => delete_state(&state, &key).await,
        Route::Lock { .. } => lock(&state, &key, &body).await,
        Route::Unlock { .. } => unlock(&state, &key, &body).await,
        Route::InspectLock { .. } => inspect_lock(&state, &key).await,
        Route::PurgeLock { .. } => purge_lock(&state, &key).await,
    }
}

/// Validate the project and principal and derive the resource key
fn resource_key(
    state: &AppState,
    route: &Route,
    headers: &HeaderMap,
) -> Result<ResourceKey, ApiError> {
    let project = route.project();
    if project.is_empty() {
        return Err(ApiError::MissingProject);
    }
    if !ResourceKey::is_valid_component(project) {
        return Err(ApiError::InvalidProject(project.to_string()));
    }

    let principal = state.auth.resolve(headers)?;
    if principal.is_empty() {
        return Err(ApiError::MissingPrincipal);
    }
    if !ResourceKey::is_valid_component(&principal) {
        return Err(ApiError::InvalidPrincipal(principal));
    }

    Ok(ResourceKey::new(&principal, project))
}

async fn get_state(state: &AppState, key: &ResourceKey) -> Result<Response, ApiError> {
    match state.blobs.get(key.as_str()).await? {
        Some(body) => Ok((
            StatusCode::OK,
            [(CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

async fn post_state(
    state: &AppState,
    key: &ResourceKey,
    lock_id: Option<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    // Terraform passes the ID of the lock it believes it holds
    if let Some(current) = state.locks.actor(key).inspect().await?
        && lock_id.as_deref() != Some(current.id.as_str())
    {
        warn!(
            "state write to {} refused: lock {} held, request carried {:?}",
            key, current.id, lock_id
        );
        return Ok(locked(Some(current)));
    }

    state.blobs.put(key.as_str(), body).await?;
    info!("state written to {}", key);
    Ok(StatusCode::OK.into_response())
}

async fn delete_state(state: &AppState, key: &ResourceKey) -> Result<Response, ApiError> {
    // No lock override here: any held lock blocks deletion
    if let Some(current) = state.locks.actor(key).inspect().await? {
        warn!("state delete on {} refused: lock {} held", key, current.id);
        return Ok(locked(Some(current)));
    }

    state.blobs.delete(key.as_str()).await?;
    info!("state deleted at {}", key);
    Ok(StatusCode::OK.into_response())
}

async fn lock(state: &AppState, key: &ResourceKey, body: &Bytes) -> Result<Response, ApiError> {
    let candidate = parse_lock_body(body)?;
    if !candidate.has_id() {
        return Err(ApiError::MissingLockId);
    }

    match state.locks.actor(key).acquire(candidate).await? {
        AcquireOutcome::Acquired => Ok(StatusCode::OK.into_response()),
        AcquireOutcome::Conflict(existing) => Ok(locked(Some(existing))),
    }
}

async fn unlock(state: &AppState, key: &ResourceKey, body: &Bytes) -> Result<Response, ApiError> {
    let candidate = parse_lock_body(body)?;

    match state.locks.actor(key).release(&candidate.id).await? {
        ReleaseOutcome::Released => Ok(StatusCode::OK.into_response()),
        ReleaseOutcome::MissingId => Err(ApiError::MissingLockId),
        ReleaseOutcome::Conflict(current) => Ok(locked(current)),
    }
}

async fn inspect_lock(state: &AppState, key: &ResourceKey) -> Result<Response, ApiError> {
    let current = state.locks.actor(key).inspect().await?;
    Ok(lock_response(StatusCode::OK, current))
}

async fn purge_lock(state: &AppState, key: &ResourceKey) -> Result<Response, ApiError> {
    state.locks.actor(key).purge().await?;
    Ok(StatusCode::OK.into_response())
}

fn parse_lock_body(body: &Bytes) -> Result<LockInfo, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::InvalidLockBody(e.to_string()))
}

/// The `ID` query parameter of a state write, if present
fn query_lock_id(uri: &Uri) -> Option<String> {
    let query = uri.query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(name, _)| name == "ID")
        .map(|(_, value)| value.into_owned())
}

/// 423 with the current lock (or `{}` when nothing is locked)
fn locked(current: Option<LockInfo>) -> Response {
    lock_response(StatusCode::LOCKED, current)
}

fn lock_response(status: StatusCode, current: Option<LockInfo>) -> Response {
    match current {
        Some(lock) => (status, Json(lock)).into_response(),
        None => (status, Json(serde_json::json!({}))).into_response(),
    }
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Not found.\n").into_response()
}
