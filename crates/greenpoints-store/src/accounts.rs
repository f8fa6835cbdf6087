//! Account records: registration, authentication and profile edits.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use greenpoints_shared::constants::MAX_AVATAR_BYTES;
use greenpoints_shared::credential::Credential;
use greenpoints_shared::types::{validate_name, NodeId, Profile, Role, Theme};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, ToSql};

use crate::database::Database;
use crate::error::{not_found, Result, StoreError};
use crate::metadata::touch_last_sync;
use crate::models::{conversion_err, parse_db_time, to_db_time, NewAccount};

pub(crate) const PROFILE_COLUMNS: &str = "id, role, name, gender, points, bottles, joined_at, \
     profile_image, last_image_update, is_banned, notice, theme";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Register a new account. Identities are unique across every role
    /// bucket.
    pub fn register_account(&self, new: &NewAccount) -> Result<Profile> {
        let name = validate_name(&new.name)?;
        let credential = Credential::derive(&new.secret)?;
        let profile = Profile::new(new.id.clone(), name, new.role, new.gender);

        let tx = self.conn().unchecked_transaction()?;
        insert_account(&tx, &profile, &credential).map_err(|e| match e {
            StoreError::Sqlite(rusqlite::Error::SqliteFailure(f, _))
                if f.code == ErrorCode::ConstraintViolation =>
            {
                StoreError::Conflict(profile.id.to_string())
            }
            other => other,
        })?;
        touch_last_sync(&tx)?;
        tx.commit()?;

        tracing::info!(id = %profile.id, role = %profile.role, "account registered");
        // Re-read so timestamps carry the stored precision
        self.get_profile(&profile.id)
    }

    // ------------------------------------------------------------------
    // Credentials
    // ------------------------------------------------------------------

    /// Check a login attempt. Unknown identity, role mismatch and wrong key
    /// are indistinguishable to the caller.
    pub fn authenticate(&self, role: Role, id: &NodeId, secret: &str) -> Result<Profile> {
        let stored = self.load_credential(id)?;

        match stored {
            Some((stored_role, credential)) if stored_role == role && credential.verify(secret) => {
                self.get_profile(id)
            }
            _ => {
                tracing::debug!(id = %id, role = %role, "authentication rejected");
                Err(StoreError::InvalidCredentials)
            }
        }
    }

    /// Re-check the security key of an existing account.
    pub fn verify_credential(&self, id: &NodeId, secret: &str) -> Result<bool> {
        let (_, credential) = self.load_credential(id)?.ok_or(StoreError::NotFound)?;
        Ok(credential.verify(secret))
    }

    fn load_credential(&self, id: &NodeId) -> Result<Option<(Role, Credential)>> {
        let row = self
            .conn()
            .query_row(
                "SELECT role, credential FROM accounts WHERE id = ?1",
                params![id.as_str()],
                |row| {
                    let role: String = row.get(0)?;
                    let credential: String = row.get(1)?;
                    Ok((role, credential))
                },
            )
            .optional()?;

        row.map(|(role, credential)| -> Result<(Role, Credential)> {
            Ok((role.parse()?, Credential::from_encoded(&credential)?))
        })
        .transpose()
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn get_profile(&self, id: &NodeId) -> Result<Profile> {
        self.conn()
            .query_row(
                &format!("SELECT {PROFILE_COLUMNS} FROM accounts WHERE id = ?1"),
                params![id.as_str()],
                row_to_profile,
            )
            .map_err(not_found)
    }

    /// Fetch a profile only if it lives in the given role bucket.
    pub fn get_profile_in_role(&self, role: Role, id: &NodeId) -> Result<Profile> {
        self.conn()
            .query_row(
                &format!("SELECT {PROFILE_COLUMNS} FROM accounts WHERE id = ?1 AND role = ?2"),
                params![id.as_str(), role.as_str()],
                row_to_profile,
            )
            .map_err(not_found)
    }

    /// List profiles, optionally restricted to one role bucket, oldest first.
    pub fn list_profiles(&self, role: Option<Role>) -> Result<Vec<Profile>> {
        let order = "ORDER BY CASE role WHEN 'ADMIN' THEN 0 WHEN 'USER' THEN 1 ELSE 2 END, \
                     joined_at ASC, id ASC";

        let profiles = match role {
            Some(r) => {
                let mut stmt = self.conn().prepare(&format!(
                    "SELECT {PROFILE_COLUMNS} FROM accounts WHERE role = ?1 {order}"
                ))?;
                let rows = stmt.query_map(params![r.as_str()], row_to_profile)?;
                rows.collect::<std::result::Result<Vec<_>, _>>()?
            }
            None => {
                let mut stmt = self
                    .conn()
                    .prepare(&format!("SELECT {PROFILE_COLUMNS} FROM accounts {order}"))?;
                let rows = stmt.query_map([], row_to_profile)?;
                rows.collect::<std::result::Result<Vec<_>, _>>()?
            }
        };
        Ok(profiles)
    }

    /// Every profile across all buckets: admins, then users, then employees.
    pub fn all_profiles(&self) -> Result<Vec<Profile>> {
        self.list_profiles(None)
    }

    /// Case-insensitive substring match on display name or identity.
    pub fn search_profiles(&self, role: Option<Role>, term: &str) -> Result<Vec<Profile>> {
        let needle = term.trim().to_lowercase();
        let profiles = self.list_profiles(role)?;
        if needle.is_empty() {
            return Ok(profiles);
        }
        Ok(profiles
            .into_iter()
            .filter(|p| {
                p.name.to_lowercase().contains(&needle)
                    || p.id.as_str().to_lowercase().contains(&needle)
            })
            .collect())
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Overwrite the mutable fields of an existing profile, addressed by
    /// role and identity. Returns `false` when no such record exists.
    pub fn update_profile(&self, profile: &Profile) -> Result<bool> {
        let name = validate_name(&profile.name)?;
        let points = to_sql_counter("points", profile.points)?;
        let bottles = to_sql_counter("bottles", profile.bottles)?;

        let tx = self.conn().unchecked_transaction()?;
        let affected = tx.execute(
            "UPDATE accounts
             SET name = ?1, gender = ?2, points = ?3, bottles = ?4,
                 profile_image = ?5, last_image_update = ?6,
                 is_banned = ?7, notice = ?8, theme = ?9
             WHERE id = ?10 AND role = ?11",
            params![
                name,
                profile.gender.as_str(),
                points,
                bottles,
                profile.profile_image,
                profile.last_image_update.as_ref().map(to_db_time),
                profile.is_banned,
                profile.notice,
                profile.theme.as_str(),
                profile.id.as_str(),
                profile.role.as_str(),
            ],
        )?;
        if affected > 0 {
            touch_last_sync(&tx)?;
        }
        tx.commit()?;
        Ok(affected > 0)
    }

    pub fn rename(&self, id: &NodeId, name: &str) -> Result<Profile> {
        let name = validate_name(name)?;
        self.update_and_fetch(id, "UPDATE accounts SET name = ?1 WHERE id = ?2", &name)
    }

    pub fn set_theme(&self, id: &NodeId, theme: Theme) -> Result<Profile> {
        self.update_and_fetch(
            id,
            "UPDATE accounts SET theme = ?1 WHERE id = ?2",
            &theme.as_str(),
        )
    }

    /// Replace the avatar with a base64 payload (a `data:` URL prefix is
    /// accepted). Enforces the decoded size limit and the change cooldown.
    pub fn set_avatar(&self, id: &NodeId, payload: &str, now: DateTime<Utc>) -> Result<Profile> {
        let size = decoded_avatar_len(payload)?;
        if size > MAX_AVATAR_BYTES {
            return Err(StoreError::AvatarTooLarge {
                size,
                max: MAX_AVATAR_BYTES,
            });
        }

        let tx = self.conn().unchecked_transaction()?;
        let current = tx
            .query_row(
                &format!("SELECT {PROFILE_COLUMNS} FROM accounts WHERE id = ?1"),
                params![id.as_str()],
                row_to_profile,
            )
            .map_err(not_found)?;

        if !current.can_update_avatar(now) {
            if let Some(until) = current.next_avatar_update() {
                return Err(StoreError::AvatarCooldown { until });
            }
        }

        tx.execute(
            "UPDATE accounts SET profile_image = ?1, last_image_update = ?2 WHERE id = ?3",
            params![payload, to_db_time(&now), id.as_str()],
        )?;
        touch_last_sync(&tx)?;
        tx.commit()?;

        tracing::debug!(id = %id, size, "avatar updated");
        self.get_profile(id)
    }

    /// Run a single-column update and return the fresh profile.
    pub(crate) fn update_and_fetch(
        &self,
        id: &NodeId,
        sql: &str,
        value: &dyn ToSql,
    ) -> Result<Profile> {
        let tx = self.conn().unchecked_transaction()?;
        let affected = tx.execute(sql, params![value, id.as_str()])?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        touch_last_sync(&tx)?;
        tx.commit()?;
        self.get_profile(id)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Delete an account and its sessions. Returns `true` if a row was
    /// deleted.
    pub fn delete_account(&self, id: &NodeId) -> Result<bool> {
        let tx = self.conn().unchecked_transaction()?;
        // ON DELETE CASCADE: sessions go with it
        let affected = tx.execute("DELETE FROM accounts WHERE id = ?1", params![id.as_str()])?;
        if affected > 0 {
            touch_last_sync(&tx)?;
        }
        tx.commit()?;
        if affected > 0 {
            tracing::info!(id = %id, "account deleted");
        }
        Ok(affected > 0)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub(crate) fn insert_account(
    conn: &Connection,
    profile: &Profile,
    credential: &Credential,
) -> Result<()> {
    conn.execute(
        "INSERT INTO accounts (id, role, credential, name, gender, points, bottles, joined_at,
                               profile_image, last_image_update, is_banned, notice, theme)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            profile.id.as_str(),
            profile.role.as_str(),
            credential.to_encoded(),
            profile.name,
            profile.gender.as_str(),
            to_sql_counter("points", profile.points)?,
            to_sql_counter("bottles", profile.bottles)?,
            to_db_time(&profile.joined_at),
            profile.profile_image,
            profile.last_image_update.as_ref().map(to_db_time),
            profile.is_banned,
            profile.notice,
            profile.theme.as_str(),
        ],
    )?;
    Ok(())
}

pub(crate) fn to_sql_counter(field: &str, value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| StoreError::CounterOverflow(field.to_string()))
}

fn decoded_avatar_len(payload: &str) -> Result<usize> {
    let data = match payload.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => payload,
    };
    BASE64
        .decode(data.trim())
        .map(|bytes| bytes.len())
        .map_err(|_| StoreError::AvatarEncoding)
}

/// Map a row selected with [`PROFILE_COLUMNS`] to a [`Profile`].
pub(crate) fn row_to_profile(row: &rusqlite::Row<'_>) -> rusqlite::Result<Profile> {
    let id: String = row.get(0)?;
    let role: String = row.get(1)?;
    let name: String = row.get(2)?;
    let gender: String = row.get(3)?;
    let points: i64 = row.get(4)?;
    let bottles: i64 = row.get(5)?;
    let joined_at: String = row.get(6)?;
    let profile_image: Option<String> = row.get(7)?;
    let last_image_update: Option<String> = row.get(8)?;
    let is_banned: bool = row.get(9)?;
    let notice: Option<String> = row.get(10)?;
    let theme: String = row.get(11)?;

    Ok(Profile {
        id: NodeId::new(id).map_err(|e| conversion_err(0, e))?,
        role: role.parse().map_err(|e| conversion_err(1, e))?,
        name,
        gender: gender.parse().map_err(|e| conversion_err(3, e))?,
        points: u64::try_from(points).map_err(|e| conversion_err(4, e))?,
        bottles: u64::try_from(bottles).map_err(|e| conversion_err(5, e))?,
        joined_at: parse_db_time(6, &joined_at)?,
        profile_image,
        last_image_update: last_image_update
            .map(|s| parse_db_time(8, &s))
            .transpose()?,
        is_banned,
        notice,
        theme: theme.parse().map_err(|e| conversion_err(11, e))?,
    })
}
