//! Session pointers.
//!
//! A session holds a bearer token and a snapshot of the profile as of the
//! last sync. The snapshot only reports drift; callers that need the truth
//! read the account record.

use chrono::{DateTime, Datelike, Duration, Utc};
use greenpoints_shared::constants::SESSION_TOKEN_SIZE;
use greenpoints_shared::types::{NodeId, Profile};
use rand::rngs::OsRng;
use rand::RngCore;
use rusqlite::{params, Connection, OptionalExtension};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{conversion_err, parse_db_time, to_db_time, Session, SessionSync};

/// Stored timestamps are RFC 3339 text, which only holds four-digit years.
const MAX_STORED_YEAR: i32 = 9999;

impl Database {
    /// Open a session for an existing account.
    pub fn create_session(&self, id: &NodeId, ttl: Duration) -> Result<Session> {
        let profile = self.get_profile(id)?;
        let now = Utc::now();
        let expires_at = now
            .checked_add_signed(ttl)
            .filter(|at| at.year() <= MAX_STORED_YEAR)
            .ok_or(StoreError::InvalidSessionTtl)?;

        let mut raw = [0u8; SESSION_TOKEN_SIZE];
        OsRng.fill_bytes(&mut raw);

        let session = Session {
            token: hex::encode(raw),
            account_id: id.clone(),
            snapshot: profile,
            created_at: now,
            expires_at,
            last_synced_at: now,
        };

        self.conn().execute(
            "INSERT INTO sessions (token, account_id, snapshot, created_at, expires_at, last_synced_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                session.token,
                session.account_id.as_str(),
                serde_json::to_string(&session.snapshot)?,
                to_db_time(&session.created_at),
                to_db_time(&session.expires_at),
                to_db_time(&session.last_synced_at),
            ],
        )?;

        tracing::debug!(id = %id, expires_at = %session.expires_at, "session opened");
        Ok(session)
    }

    /// Look up a live session.
    pub fn session(&self, token: &str) -> Result<Session> {
        let session = load_session(self.conn(), token)?.ok_or(StoreError::SessionNotFound)?;
        if session.is_expired(Utc::now()) {
            return Err(StoreError::SessionExpired);
        }
        Ok(session)
    }

    /// Re-read the authoritative record for a session and refresh its
    /// snapshot. `changed` reports whether anything drifted since the last
    /// sync (a ban, a notice, points credited from another device, ...).
    pub fn sync_session(&self, token: &str) -> Result<SessionSync> {
        let tx = self.conn().unchecked_transaction()?;
        let session = load_session(&tx, token)?.ok_or(StoreError::SessionNotFound)?;
        let now = Utc::now();
        if session.is_expired(now) {
            return Err(StoreError::SessionExpired);
        }

        let profile = self.get_profile(&session.account_id)?;
        let changed = profile != session.snapshot;

        tx.execute(
            "UPDATE sessions SET snapshot = ?1, last_synced_at = ?2 WHERE token = ?3",
            params![serde_json::to_string(&profile)?, to_db_time(&now), token],
        )?;
        tx.commit()?;

        if changed {
            tracing::debug!(id = %profile.id, "session snapshot refreshed");
        }
        Ok(SessionSync { profile, changed })
    }

    /// Revoke a session. Returns `true` if it existed.
    pub fn revoke_session(&self, token: &str) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
        Ok(affected > 0)
    }

    /// Drop sessions whose expiry is at or before `now`.
    pub fn purge_expired_sessions(&self, now: DateTime<Utc>) -> Result<usize> {
        let purged = self.conn().execute(
            "DELETE FROM sessions WHERE expires_at <= ?1",
            params![to_db_time(&now)],
        )?;
        if purged > 0 {
            tracing::info!(purged, "expired sessions purged");
        }
        Ok(purged)
    }
}

fn load_session(conn: &Connection, token: &str) -> Result<Option<Session>> {
    Ok(conn
        .query_row(
            "SELECT token, account_id, snapshot, created_at, expires_at, last_synced_at
             FROM sessions WHERE token = ?1",
            params![token],
            row_to_session,
        )
        .optional()?)
}

fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<Session> {
    let token: String = row.get(0)?;
    let account_id: String = row.get(1)?;
    let snapshot: String = row.get(2)?;
    let created_at: String = row.get(3)?;
    let expires_at: String = row.get(4)?;
    let last_synced_at: String = row.get(5)?;

    let snapshot: Profile = serde_json::from_str(&snapshot).map_err(|e| conversion_err(2, e))?;

    Ok(Session {
        token,
        account_id: NodeId::new(account_id).map_err(|e| conversion_err(1, e))?,
        snapshot,
        created_at: parse_db_time(3, &created_at)?,
        expires_at: parse_db_time(4, &expires_at)?,
        last_synced_at: parse_db_time(5, &last_synced_at)?,
    })
}

#[cfg(test)]
mod tests {
    use greenpoints_shared::types::Role;

    use super::*;
    use crate::test_support::new_account;

    #[test]
    fn session_round_trip() {
        let db = Database::open_in_memory().unwrap();
        let p = db.register_account(&new_account("ID-1", Role::User)).unwrap();

        let session = db.create_session(&p.id, Duration::hours(1)).unwrap();
        assert_eq!(session.token.len(), 64);

        let loaded = db.session(&session.token).unwrap();
        assert_eq!(loaded.account_id, p.id);
        assert_eq!(loaded.snapshot, p);
    }

    #[test]
    fn sync_detects_external_ban() {
        let db = Database::open_in_memory().unwrap();
        let p = db.register_account(&new_account("ID-1", Role::User)).unwrap();
        let session = db.create_session(&p.id, Duration::hours(1)).unwrap();

        let first = db.sync_session(&session.token).unwrap();
        assert!(!first.changed);

        db.toggle_ban(&p.id).unwrap();

        let second = db.sync_session(&session.token).unwrap();
        assert!(second.changed);
        assert!(second.profile.is_banned);
        assert!(db.session(&session.token).unwrap().snapshot.is_banned);

        let third = db.sync_session(&session.token).unwrap();
        assert!(!third.changed);
    }

    #[test]
    fn expired_sessions() {
        let db = Database::open_in_memory().unwrap();
        let p = db.register_account(&new_account("ID-1", Role::User)).unwrap();
        let session = db.create_session(&p.id, Duration::seconds(-1)).unwrap();

        assert!(matches!(
            db.session(&session.token),
            Err(StoreError::SessionExpired)
        ));
        assert!(matches!(
            db.sync_session(&session.token),
            Err(StoreError::SessionExpired)
        ));

        assert_eq!(db.purge_expired_sessions(Utc::now()).unwrap(), 1);
        assert!(matches!(
            db.session(&session.token),
            Err(StoreError::SessionNotFound)
        ));
    }

    #[test]
    fn lifetime_past_storable_range_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        let p = db.register_account(&new_account("ID-1", Role::User)).unwrap();

        for ttl in [Duration::hours(100_000_000), Duration::weeks(1_000_000_000)] {
            assert!(matches!(
                db.create_session(&p.id, ttl),
                Err(StoreError::InvalidSessionTtl)
            ));
        }

        let long = db.create_session(&p.id, Duration::days(3650)).unwrap();
        assert_eq!(db.purge_expired_sessions(Utc::now()).unwrap(), 0);
        assert_eq!(db.session(&long.token).unwrap().account_id, p.id);
    }

    #[test]
    fn revoke_and_cascade() {
        let db = Database::open_in_memory().unwrap();
        let p = db.register_account(&new_account("ID-1", Role::User)).unwrap();
        let a = db.create_session(&p.id, Duration::hours(1)).unwrap();
        let b = db.create_session(&p.id, Duration::hours(1)).unwrap();

        assert!(db.revoke_session(&a.token).unwrap());
        assert!(!db.revoke_session(&a.token).unwrap());

        db.delete_account(&p.id).unwrap();
        assert!(matches!(
            db.session(&b.token),
            Err(StoreError::SessionNotFound)
        ));
    }
}
