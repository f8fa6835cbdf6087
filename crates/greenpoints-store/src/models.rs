//! Records returned by the store.
//!
//! Every struct derives `Serialize` so the server can hand it straight to
//! clients.

use chrono::{DateTime, SecondsFormat, Utc};
use greenpoints_shared::types::{Gender, NodeId, Profile, RankTier, Role};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

/// Input for [`Database::register_account`](crate::Database::register_account).
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub id: NodeId,
    pub name: String,
    pub role: Role,
    pub gender: Gender,
    pub secret: String,
}

// ---------------------------------------------------------------------------
// Points
// ---------------------------------------------------------------------------

/// Outcome of a successful credit.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditReceipt {
    pub profile: Profile,
    pub units: u64,
    pub xp_awarded: u64,
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

/// A session pointer: bearer token plus the profile snapshot as of the last
/// sync.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: String,
    pub account_id: NodeId,
    pub snapshot: Profile,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_synced_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Result of re-reading the authoritative record for a session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSync {
    pub profile: Profile,
    /// Whether the record drifted from the previous snapshot.
    pub changed: bool,
}

// ---------------------------------------------------------------------------
// Leaderboard / stats
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    /// 1-based position.
    pub position: usize,
    pub id: NodeId,
    pub name: String,
    pub points: u64,
    pub bottles: u64,
    pub carbon_offset_kg: f64,
    pub rank: RankTier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStats {
    pub admins: u64,
    pub users: u64,
    pub employees: u64,
    pub banned: u64,
    pub total_points: u64,
    pub total_bottles: u64,
    pub carbon_offset_kg: f64,
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkMetadata {
    pub network_id: String,
    pub last_sync: DateTime<Utc>,
    pub version: String,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Fixed-width RFC-3339 so stored timestamps compare correctly as text.
pub(crate) fn to_db_time(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_db_time(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

/// Wrap a domain parse failure as a column conversion error.
pub(crate) fn conversion_err<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
}
