//! Administrator endpoints and the startup admin seed.

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use greenpoints_shared::types::{Gender, NodeId, Profile, Role};
use greenpoints_store::snapshot::{GlobalSnapshot, ImportStats};
use greenpoints_store::{Database, NetworkMetadata, NetworkStats, NewAccount, StoreError};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::api::AppState;
use crate::auth::admin_caller;
use crate::config::ServerConfig;
use crate::error::ServerError;

/// Create the configured bootstrap admin if that identity is free.
/// Returns `true` when an account was created.
pub fn bootstrap_admin(db: &Database, config: &ServerConfig) -> Result<bool, ServerError> {
    let Some(seed) = &config.bootstrap_admin else {
        return Ok(false);
    };
    let id = NodeId::new(seed.id.as_str())?;

    match db.get_profile(&id) {
        Ok(existing) if existing.role == Role::Admin => Ok(false),
        Ok(existing) => {
            warn!(id = %id, role = %existing.role, "bootstrap admin id is taken by a non-admin account");
            Ok(false)
        }
        Err(StoreError::NotFound) => {
            db.register_account(&NewAccount {
                id: id.clone(),
                name: "Administrator".into(),
                role: Role::Admin,
                gender: Gender::default(),
                secret: seed.secret.clone(),
            })?;
            info!(id = %id, "bootstrap admin created");
            Ok(true)
        }
        Err(e) => Err(e.into()),
    }
}

fn parse_id(raw: &str) -> Result<NodeId, ServerError> {
    Ok(NodeId::new(raw)?)
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct UsersQuery {
    role: Option<String>,
    q: Option<String>,
}

pub async fn list_users(
    headers: HeaderMap,
    State(state): State<AppState>,
    Query(query): Query<UsersQuery>,
) -> Result<Json<Vec<Profile>>, ServerError> {
    admin_caller(&state, &headers).await?;
    let role = query
        .role
        .as_deref()
        .filter(|r| !r.is_empty())
        .map(str::parse::<Role>)
        .transpose()?;

    let db = state.db.lock().await;
    let profiles = match query.q.as_deref() {
        Some(term) => db.search_profiles(role, term)?,
        None => db.list_profiles(role)?,
    };
    Ok(Json(profiles))
}

pub async fn toggle_ban(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Profile>, ServerError> {
    let caller = admin_caller(&state, &headers).await?;
    let id = parse_id(&id)?;

    let profile = state.db.lock().await.toggle_ban(&id)?;
    info!(id = %id, banned = profile.is_banned, by = %caller.profile.id, "ban toggled");
    Ok(Json(profile))
}

#[derive(Deserialize)]
pub struct NoticeRequest {
    notice: String,
}

pub async fn set_notice(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<NoticeRequest>,
) -> Result<Json<Profile>, ServerError> {
    let caller = admin_caller(&state, &headers).await?;
    let id = parse_id(&id)?;

    let profile = state.db.lock().await.set_notice(&id, &req.notice)?;
    info!(id = %id, by = %caller.profile.id, "notice sent");
    Ok(Json(profile))
}

pub async fn delete_user(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let caller = admin_caller(&state, &headers).await?;
    let id = parse_id(&id)?;
    if id == caller.profile.id {
        return Err(ServerError::BadRequest("Cannot delete your own account".into()));
    }

    if !state.db.lock().await.delete_account(&id)? {
        return Err(ServerError::NotFound("Account not found".into()));
    }
    let unpaired = state.devices.unpair_owner(&id).await;
    info!(id = %id, unpaired, by = %caller.profile.id, "account deleted by admin");
    Ok(Json(serde_json::json!({ "deleted": true })))
}

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    #[serde(flatten)]
    stats: NetworkStats,
    network: NetworkMetadata,
    paired_devices: usize,
    uptime_secs: u64,
}

pub async fn stats(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<StatsResponse>, ServerError> {
    admin_caller(&state, &headers).await?;
    let (stats, network) = {
        let db = state.db.lock().await;
        (db.network_stats()?, db.metadata()?)
    };

    Ok(Json(StatsResponse {
        stats,
        network,
        paired_devices: state.devices.paired_count().await,
        uptime_secs: state.started_at.elapsed().as_secs(),
    }))
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasterKey {
    master_key: String,
}

pub async fn get_master_key(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<MasterKey>, ServerError> {
    admin_caller(&state, &headers).await?;
    let master_key = state.db.lock().await.master_key()?;
    Ok(Json(MasterKey { master_key }))
}

pub async fn put_master_key(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(req): Json<MasterKey>,
) -> Result<Json<MasterKey>, ServerError> {
    let caller = admin_caller(&state, &headers).await?;
    let db = state.db.lock().await;
    db.set_master_key(&req.master_key)?;
    info!(by = %caller.profile.id, "master key changed");
    Ok(Json(MasterKey {
        master_key: db.master_key()?,
    }))
}

pub async fn export_snapshot(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<GlobalSnapshot>, ServerError> {
    admin_caller(&state, &headers).await?;
    let snapshot = state.db.lock().await.export_snapshot()?;
    Ok(Json(snapshot))
}

pub async fn import_snapshot(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(snapshot): Json<GlobalSnapshot>,
) -> Result<Json<ImportStats>, ServerError> {
    let caller = admin_caller(&state, &headers).await?;
    let stats = state.db.lock().await.import_snapshot(&snapshot)?;
    info!(by = %caller.profile.id, imported = stats.imported, "snapshot merged");
    Ok(Json(stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BootstrapAdmin;

    fn config_with_seed(id: &str) -> ServerConfig {
        ServerConfig {
            bootstrap_admin: Some(BootstrapAdmin {
                id: id.into(),
                secret: "root-secret".into(),
            }),
            ..ServerConfig::default()
        }
    }

    #[test]
    fn bootstrap_creates_admin_once() {
        let db = Database::open_in_memory().unwrap();
        let config = config_with_seed("ROOT");

        assert!(bootstrap_admin(&db, &config).unwrap());
        assert!(!bootstrap_admin(&db, &config).unwrap());

        let id = NodeId::new("ROOT").unwrap();
        assert!(db.authenticate(Role::Admin, &id, "root-secret").is_ok());
    }

    #[test]
    fn bootstrap_skips_without_seed_or_when_taken() {
        let db = Database::open_in_memory().unwrap();
        assert!(!bootstrap_admin(&db, &ServerConfig::default()).unwrap());

        db.register_account(&NewAccount {
            id: NodeId::new("ROOT").unwrap(),
            name: "Someone".into(),
            role: Role::User,
            gender: Gender::Female,
            secret: "x".into(),
        })
        .unwrap();
        assert!(!bootstrap_admin(&db, &config_with_seed("ROOT")).unwrap());
    }

    #[test]
    fn bootstrap_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("greenpoints.db");
        {
            let db = Database::open_at(&path).unwrap();
            assert!(bootstrap_admin(&db, &config_with_seed("ROOT")).unwrap());
        }
        let db = Database::open_at(&path).unwrap();
        assert!(!bootstrap_admin(&db, &config_with_seed("ROOT")).unwrap());
    }
}
