use chrono::{DateTime, Utc};
use greenpoints_shared::error::ValidationError;
use thiserror::Error;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Failed to determine a platform data directory.
    #[error("Could not determine application data directory")]
    NoDataDir,

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A query expected exactly one row but found none.
    #[error("Record not found")]
    NotFound,

    /// The identity is already registered (in any role bucket).
    #[error("Identity {0} already registered")]
    Conflict(String),

    /// Unknown identity, wrong role, or wrong security key.
    #[error("Identity or security key is incorrect")]
    InvalidCredentials,

    /// The account is suspended and may not accrue points.
    #[error("Account {0} is suspended")]
    Suspended(String),

    /// Session token unknown or revoked.
    #[error("Session not found")]
    SessionNotFound,

    /// Session token past its expiry.
    #[error("Session expired")]
    SessionExpired,

    /// Session lifetime is non-positive or lands beyond the storable range.
    #[error("Session lifetime out of range")]
    InvalidSessionTtl,

    /// Credit units outside the accepted range.
    #[error("Invalid unit count {units} (expected 1..={max})")]
    InvalidUnits { units: u64, max: u64 },

    /// A counter would exceed its storable range.
    #[error("Counter overflow for {0}")]
    CounterOverflow(String),

    /// Avatar changed too recently.
    #[error("Avatar locked until {until}")]
    AvatarCooldown { until: DateTime<Utc> },

    /// Avatar payload over the size limit.
    #[error("Avatar too large: {size} bytes (max {max})")]
    AvatarTooLarge { size: usize, max: usize },

    /// Avatar payload is not valid base64.
    #[error("Avatar payload is not valid base64")]
    AvatarEncoding,

    /// Input rejected by a domain rule.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),

    /// JSON (de)serialization failure.
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Chrono parsing error.
    #[error("Timestamp parse error: {0}")]
    ChronoParse(#[from] chrono::ParseError),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Map `QueryReturnedNoRows` to [`StoreError::NotFound`].
pub(crate) fn not_found(e: rusqlite::Error) -> StoreError {
    match e {
        rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
        other => StoreError::Sqlite(other),
    }
}
