//! GP-Bin device bridge.
//!
//! A bin is paired with one account at a time. Pairing hands back a device
//! token that the bin must present on every signal. Each detection byte it
//! posts credits one unit to the paired account through the same path as a
//! manual credit. Signals that arrive inside the debounce window are
//! acknowledged without crediting.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use chrono::{DateTime, Utc};
use greenpoints_shared::constants::{DEVICE_TOKEN_SIZE, MAX_DEVICES_PER_OWNER};
use greenpoints_shared::signal::{decode_signal, DeviceName};
use greenpoints_shared::types::{NodeId, Role};
use greenpoints_store::CreditReceipt;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::api::AppState;
use crate::auth::active_caller;
use crate::error::ServerError;

/// Header carrying the pairing token on device signals.
pub const DEVICE_TOKEN_HEADER: &str = "x-device-token";

#[derive(Debug, Clone)]
struct Pairing {
    owner: NodeId,
    token: String,
    paired_at: DateTime<Utc>,
    last_accepted: Option<Instant>,
}

/// What to do with an incoming signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalVerdict {
    /// Credit the owner.
    Credit(NodeId),
    /// Inside the debounce window.
    Debounced(NodeId),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PairingInfo {
    pub device: DeviceName,
    pub owner: NodeId,
    /// Shown once; the bin sends it as `X-Device-Token`.
    pub device_token: String,
    pub paired_at: DateTime<Utc>,
}

/// In-memory map of device name to pairing.
#[derive(Clone)]
pub struct DeviceRegistry {
    pairings: Arc<Mutex<HashMap<DeviceName, Pairing>>>,
    debounce: Duration,
}

impl DeviceRegistry {
    pub fn new(debounce: Duration) -> Self {
        Self {
            pairings: Arc::new(Mutex::new(HashMap::new())),
            debounce,
        }
    }

    /// Pair `device` with `owner`, replacing any previous pairing and
    /// issuing a fresh token. An owner may hold at most
    /// `MAX_DEVICES_PER_OWNER` devices.
    pub async fn pair(
        &self,
        device: DeviceName,
        owner: NodeId,
    ) -> Result<PairingInfo, ServerError> {
        let mut pairings = self.pairings.lock().await;

        let held = pairings
            .iter()
            .filter(|(name, p)| p.owner == owner && *name != &device)
            .count();
        if held >= MAX_DEVICES_PER_OWNER {
            return Err(ServerError::Conflict(format!(
                "At most {MAX_DEVICES_PER_OWNER} devices may be paired per account"
            )));
        }

        let mut raw = [0u8; DEVICE_TOKEN_SIZE];
        OsRng.fill_bytes(&mut raw);
        let token = hex::encode(raw);
        let paired_at = Utc::now();

        let previous = pairings.insert(
            device.clone(),
            Pairing {
                owner: owner.clone(),
                token: token.clone(),
                paired_at,
                last_accepted: None,
            },
        );
        if let Some(prev) = previous.filter(|p| p.owner != owner) {
            info!(device = %device, from = %prev.owner, to = %owner, "device re-paired");
        } else {
            info!(device = %device, owner = %owner, "device paired");
        }
        Ok(PairingInfo {
            device,
            owner,
            device_token: token,
            paired_at,
        })
    }

    pub async fn owner_of(&self, device: &DeviceName) -> Option<NodeId> {
        self.pairings
            .lock()
            .await
            .get(device)
            .map(|p| p.owner.clone())
    }

    pub async fn unpair(&self, device: &DeviceName) -> bool {
        self.pairings.lock().await.remove(device).is_some()
    }

    /// Drop every pairing held by `owner`. Returns how many were removed.
    pub async fn unpair_owner(&self, owner: &NodeId) -> usize {
        let mut pairings = self.pairings.lock().await;
        let before = pairings.len();
        pairings.retain(|_, p| &p.owner != owner);
        before - pairings.len()
    }

    pub async fn paired_count(&self) -> usize {
        self.pairings.lock().await.len()
    }

    /// Decide whether a signal at `now` carrying `token` is credited.
    pub async fn accept_signal(
        &self,
        device: &DeviceName,
        token: &str,
        now: Instant,
    ) -> Result<SignalVerdict, ServerError> {
        let mut pairings = self.pairings.lock().await;
        let pairing = pairings
            .get_mut(device)
            .ok_or_else(|| ServerError::NotFound(format!("Device {device} is not paired")))?;

        if pairing.token.as_bytes().ct_eq(token.as_bytes()).unwrap_u8() != 1 {
            return Err(ServerError::Unauthorized("Invalid device token".into()));
        }

        let within_window = pairing
            .last_accepted
            .map(|last| now.saturating_duration_since(last) < self.debounce)
            .unwrap_or(false);
        if within_window {
            return Ok(SignalVerdict::Debounced(pairing.owner.clone()));
        }

        pairing.last_accepted = Some(now);
        Ok(SignalVerdict::Credit(pairing.owner.clone()))
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct PairRequest {
    device: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalResponse {
    device: DeviceName,
    owner: NodeId,
    credited: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    receipt: Option<CreditReceipt>,
}

pub async fn pair_device(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(req): Json<PairRequest>,
) -> Result<Json<PairingInfo>, ServerError> {
    let caller = active_caller(&state, &headers).await?;
    let device = DeviceName::new(req.device)?;
    Ok(Json(state.devices.pair(device, caller.profile.id).await?))
}

pub async fn unpair_device(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let caller = active_caller(&state, &headers).await?;
    let device = DeviceName::new(name)?;

    let owner = state
        .devices
        .owner_of(&device)
        .await
        .ok_or_else(|| ServerError::NotFound(format!("Device {device} is not paired")))?;
    if owner != caller.profile.id && caller.profile.role != Role::Admin {
        return Err(ServerError::Forbidden("Device is paired with another account".into()));
    }

    let removed = state.devices.unpair(&device).await;
    info!(device = %device, by = %caller.profile.id, "device unpaired");
    Ok(Json(serde_json::json!({ "unpaired": removed })))
}

pub async fn device_signal(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<Json<SignalResponse>, ServerError> {
    let device = DeviceName::new(name)?;
    let units = decode_signal(&body)?;
    let token = headers
        .get(DEVICE_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ServerError::Unauthorized("Missing device token".into()))?;

    let verdict = state
        .devices
        .accept_signal(&device, token, Instant::now())
        .await?;

    match verdict {
        SignalVerdict::Debounced(owner) => {
            debug!(device = %device, "signal debounced");
            Ok(Json(SignalResponse {
                device,
                owner,
                credited: false,
                receipt: None,
            }))
        }
        SignalVerdict::Credit(owner) => {
            let receipt = state.db.lock().await.credit_units(&owner, units)?;
            info!(device = %device, owner = %owner, units, "device detection credited");
            Ok(Json(SignalResponse {
                device,
                owner,
                credited: true,
                receipt: Some(receipt),
            }))
        }
    }
}
