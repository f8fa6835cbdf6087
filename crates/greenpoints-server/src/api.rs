use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{DefaultBodyLimit, Query, State},
    http::{HeaderMap, Method, StatusCode},
    middleware,
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use greenpoints_shared::constants::{
    BLE_SERVICE_UUID, BLE_XP_CHARACTERISTIC_UUID, DEVICE_NAME_PREFIX, MAX_UNITS_PER_CREDIT,
    SESSION_SYNC_SECS, XP_PER_UNIT,
};
use greenpoints_shared::types::{Gender, NodeId, Profile, RankTier, Role, Theme};
use greenpoints_store::{CreditReceipt, Database, LeaderboardEntry, NewAccount, StoreError};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::admin;
use crate::auth::{active_caller, bearer_token, session_caller};
use crate::config::ServerConfig;
use crate::device::{self, DeviceRegistry};
use crate::error::ServerError;
use crate::rate_limit::{rate_limit_middleware, RateLimiter};

/// Avatars (2 MiB decoded) and snapshots travel as JSON.
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

const DEFAULT_LEADERBOARD_LIMIT: usize = 50;
const MAX_LEADERBOARD_LIMIT: usize = 500;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Database>>,
    pub devices: DeviceRegistry,
    pub rate_limiter: RateLimiter,
    pub config: Arc<ServerConfig>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(db: Database, config: ServerConfig) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            devices: DeviceRegistry::new(config.device_debounce),
            rate_limiter: RateLimiter::from_config(&config),
            config: Arc::new(config),
            started_at: Instant::now(),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/info", get(server_info))
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/session/sync", get(sync_session))
        .route("/me", get(me).patch(update_me))
        .route("/me/avatar", put(set_avatar))
        .route("/me/verify", post(verify_secret))
        .route("/me/notice/ack", post(ack_notice))
        .route("/me/recycle", post(recycle))
        .route("/leaderboard", get(leaderboard))
        .route("/device/pair", post(device::pair_device))
        .route("/device/:name", delete(device::unpair_device))
        .route("/device/:name/signal", post(device::device_signal))
        .route("/admin/users", get(admin::list_users))
        .route("/admin/users/:id", delete(admin::delete_user))
        .route("/admin/users/:id/ban", post(admin::toggle_ban))
        .route("/admin/users/:id/notice", post(admin::set_notice))
        .route("/admin/stats", get(admin::stats))
        .route(
            "/admin/master-key",
            get(admin::get_master_key).put(admin::put_master_key),
        )
        .route(
            "/admin/snapshot",
            get(admin::export_snapshot).post(admin::import_snapshot),
        )
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit_middleware,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ServerInfoResponse {
    name: String,
    version: &'static str,
    network_id: String,
    registration_open: bool,
    admin_registration_open: bool,
    sync_interval_secs: u64,
    xp_per_unit: u64,
    max_units_per_credit: u64,
    device_prefix: &'static str,
    ble_service_uuid: &'static str,
    ble_characteristic_uuid: &'static str,
}

/// A profile plus the values derived from it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    #[serde(flatten)]
    profile: Profile,
    rank: RankTier,
    rank_title: &'static str,
    carbon_offset_kg: f64,
    locked_out: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_avatar_update: Option<DateTime<Utc>>,
}

impl From<Profile> for ProfileView {
    fn from(profile: Profile) -> Self {
        let rank = profile.rank();
        Self {
            rank,
            rank_title: rank.title(),
            carbon_offset_kg: profile.carbon_offset_kg(),
            locked_out: profile.is_locked_out(),
            next_avatar_update: profile.next_avatar_update(),
            profile,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthResponse {
    token: String,
    expires_at: DateTime<Utc>,
    profile: ProfileView,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SyncResponse {
    profile: ProfileView,
    changed: bool,
    locked_out: bool,
}

// ---------------------------------------------------------------------------
// Public
// ---------------------------------------------------------------------------

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn server_info(State(state): State<AppState>) -> Result<Json<ServerInfoResponse>, ServerError> {
    let network_id = state.db.lock().await.metadata()?.network_id;
    Ok(Json(ServerInfoResponse {
        name: state.config.instance_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
        network_id,
        registration_open: state.config.registration_open,
        admin_registration_open: state.config.admin_registration_open,
        sync_interval_secs: SESSION_SYNC_SECS,
        xp_per_unit: XP_PER_UNIT,
        max_units_per_credit: MAX_UNITS_PER_CREDIT,
        device_prefix: DEVICE_NAME_PREFIX,
        ble_service_uuid: BLE_SERVICE_UUID,
        ble_characteristic_uuid: BLE_XP_CHARACTERISTIC_UUID,
    }))
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct RegisterRequest {
    role: Role,
    id: String,
    name: String,
    #[serde(default)]
    gender: Gender,
    secret: String,
}

#[derive(Deserialize)]
struct LoginRequest {
    role: Role,
    id: String,
    secret: String,
}

async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ServerError> {
    match req.role {
        Role::Admin if !state.config.admin_registration_open => {
            return Err(ServerError::Forbidden("Administrator sign-up is closed".into()));
        }
        Role::User | Role::Employee if !state.config.registration_open => {
            return Err(ServerError::Forbidden("Registration is closed".into()));
        }
        _ => {}
    }

    let new = NewAccount {
        id: NodeId::new(req.id)?,
        name: req.name,
        role: req.role,
        gender: req.gender,
        secret: req.secret,
    };

    let db = state.db.lock().await;
    let profile = db.register_account(&new)?;
    let session = db.create_session(&profile.id, state.config.session_ttl)?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token: session.token,
            expires_at: session.expires_at,
            profile: profile.into(),
        }),
    ))
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ServerError> {
    // Malformed ids read as a failed login, not a validation error
    let id = NodeId::new(req.id).map_err(|_| ServerError::from(StoreError::InvalidCredentials))?;

    let db = state.db.lock().await;
    let profile = db.authenticate(req.role, &id, &req.secret)?;
    let session = db.create_session(&profile.id, state.config.session_ttl)?;
    info!(id = %profile.id, role = %profile.role, locked_out = profile.is_locked_out(), "login");

    Ok(Json(AuthResponse {
        token: session.token,
        expires_at: session.expires_at,
        profile: profile.into(),
    }))
}

async fn logout(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let caller = session_caller(&state, &headers).await?;
    let revoked = state.db.lock().await.revoke_session(caller.token())?;
    info!(id = %caller.profile.id, "logout");
    Ok(Json(serde_json::json!({ "revoked": revoked })))
}

async fn sync_session(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<SyncResponse>, ServerError> {
    let token = bearer_token(&headers)?;
    let sync = state.db.lock().await.sync_session(token)?;
    let locked_out = sync.profile.is_locked_out();
    Ok(Json(SyncResponse {
        profile: sync.profile.into(),
        changed: sync.changed,
        locked_out,
    }))
}

// ---------------------------------------------------------------------------
// Own profile
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct UpdateMeRequest {
    name: Option<String>,
    theme: Option<Theme>,
}

#[derive(Deserialize)]
struct AvatarRequest {
    image: String,
}

#[derive(Deserialize)]
struct VerifyRequest {
    secret: String,
}

#[derive(Deserialize)]
struct RecycleRequest {
    units: u64,
}

async fn me(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<ProfileView>, ServerError> {
    let caller = active_caller(&state, &headers).await?;
    Ok(Json(caller.profile.into()))
}

async fn update_me(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(req): Json<UpdateMeRequest>,
) -> Result<Json<ProfileView>, ServerError> {
    let caller = active_caller(&state, &headers).await?;
    if req.name.is_none() && req.theme.is_none() {
        return Err(ServerError::BadRequest("Nothing to update".into()));
    }

    let db = state.db.lock().await;
    let mut profile = caller.profile;
    if let Some(name) = req.name {
        profile = db.rename(&profile.id, &name)?;
    }
    if let Some(theme) = req.theme {
        profile = db.set_theme(&profile.id, theme)?;
    }
    Ok(Json(profile.into()))
}

async fn set_avatar(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(req): Json<AvatarRequest>,
) -> Result<Json<ProfileView>, ServerError> {
    let caller = active_caller(&state, &headers).await?;
    let profile = state
        .db
        .lock()
        .await
        .set_avatar(&caller.profile.id, &req.image, Utc::now())?;
    Ok(Json(profile.into()))
}

async fn verify_secret(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(req): Json<VerifyRequest>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let caller = active_caller(&state, &headers).await?;
    let valid = state
        .db
        .lock()
        .await
        .verify_credential(&caller.profile.id, &req.secret)?;
    if !valid {
        tracing::warn!(id = %caller.profile.id, "security key re-check failed");
    }
    Ok(Json(serde_json::json!({ "valid": valid })))
}

async fn ack_notice(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<ProfileView>, ServerError> {
    let caller = active_caller(&state, &headers).await?;
    let profile = state.db.lock().await.clear_notice(&caller.profile.id)?;
    Ok(Json(profile.into()))
}

async fn recycle(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(req): Json<RecycleRequest>,
) -> Result<Json<CreditReceipt>, ServerError> {
    let caller = active_caller(&state, &headers).await?;
    let receipt = state
        .db
        .lock()
        .await
        .credit_units(&caller.profile.id, req.units)?;
    Ok(Json(receipt))
}

#[derive(Deserialize)]
struct LeaderboardQuery {
    limit: Option<usize>,
}

async fn leaderboard(
    headers: HeaderMap,
    State(state): State<AppState>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<Vec<LeaderboardEntry>>, ServerError> {
    active_caller(&state, &headers).await?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LEADERBOARD_LIMIT)
        .clamp(1, MAX_LEADERBOARD_LIMIT);
    let entries = state.db.lock().await.leaderboard(limit)?;
    Ok(Json(entries))
}

pub async fn serve(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
