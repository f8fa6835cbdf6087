//! Bearer-session checks shared by the handlers.
//!
//! Every check re-reads the authoritative account record, so a ban takes
//! effect on the very next request.

use axum::http::HeaderMap;
use greenpoints_shared::types::{Profile, Role};
use greenpoints_store::Session;

use crate::api::AppState;
use crate::error::ServerError;

/// An authenticated request.
#[derive(Debug, Clone)]
pub struct Caller {
    pub session: Session,
    pub profile: Profile,
}

impl Caller {
    pub fn token(&self) -> &str {
        &self.session.token
    }
}

pub fn bearer_token(headers: &HeaderMap) -> Result<&str, ServerError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    match auth.strip_prefix("Bearer ").map(str::trim) {
        Some(token) if !token.is_empty() => Ok(token),
        _ => Err(ServerError::Unauthorized("Missing bearer token".into())),
    }
}

/// Any live session, locked out or not.
pub async fn session_caller(state: &AppState, headers: &HeaderMap) -> Result<Caller, ServerError> {
    let token = bearer_token(headers)?;
    let db = state.db.lock().await;
    let session = db.session(token)?;
    let profile = db.get_profile(&session.account_id)?;
    Ok(Caller { session, profile })
}

/// A live session whose account still has access.
pub async fn active_caller(state: &AppState, headers: &HeaderMap) -> Result<Caller, ServerError> {
    let caller = session_caller(state, headers).await?;
    if caller.profile.is_locked_out() {
        tracing::debug!(id = %caller.profile.id, "locked-out account refused");
        return Err(ServerError::Forbidden("Access revoked".into()));
    }
    Ok(caller)
}

pub async fn admin_caller(state: &AppState, headers: &HeaderMap) -> Result<Caller, ServerError> {
    let caller = active_caller(state, headers).await?;
    if caller.profile.role != Role::Admin {
        return Err(ServerError::Forbidden("Administrator access required".into()));
    }
    Ok(caller)
}
