//! Whole-database export and import.
//!
//! The payload keeps the legacy global-database layout: one map per role
//! bucket keyed by identity, plus the network metadata.

use std::collections::BTreeMap;

use greenpoints_shared::credential::Credential;
use greenpoints_shared::types::{Profile, Role};
use rusqlite::ErrorCode;
use serde::{Deserialize, Serialize};

use crate::accounts::insert_account;
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::metadata::touch_last_sync;
use crate::models::NetworkMetadata;

/// One account as it appears in a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotRecord {
    /// Encoded salted key, never the plaintext secret.
    pub credential: String,
    pub profile: Profile,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalSnapshot {
    #[serde(rename = "ADMIN", default)]
    pub admin: BTreeMap<String, SnapshotRecord>,
    #[serde(rename = "USER", default)]
    pub user: BTreeMap<String, SnapshotRecord>,
    #[serde(rename = "EMPLOYEE", default)]
    pub employee: BTreeMap<String, SnapshotRecord>,
    pub metadata: NetworkMetadata,
}

impl GlobalSnapshot {
    fn bucket_mut(&mut self, role: Role) -> &mut BTreeMap<String, SnapshotRecord> {
        match role {
            Role::Admin => &mut self.admin,
            Role::User => &mut self.user,
            Role::Employee => &mut self.employee,
        }
    }

    fn buckets(&self) -> [(Role, &BTreeMap<String, SnapshotRecord>); 3] {
        [
            (Role::Admin, &self.admin),
            (Role::User, &self.user),
            (Role::Employee, &self.employee),
        ]
    }

    /// Number of accounts across all buckets.
    pub fn len(&self) -> usize {
        self.admin.len() + self.user.len() + self.employee.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportStats {
    /// New accounts written.
    pub imported: usize,
    /// Accounts whose identity already existed locally.
    pub skipped: usize,
}

impl Database {
    pub fn export_snapshot(&self) -> Result<GlobalSnapshot> {
        let mut snapshot = GlobalSnapshot {
            admin: BTreeMap::new(),
            user: BTreeMap::new(),
            employee: BTreeMap::new(),
            metadata: self.metadata()?,
        };

        let mut stmt = self
            .conn()
            .prepare("SELECT id, credential FROM accounts")?;
        let credentials = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<std::result::Result<BTreeMap<_, _>, _>>()?;

        for profile in self.all_profiles()? {
            let id = profile.id.to_string();
            let Some(credential) = credentials.get(&id) else {
                continue;
            };
            snapshot.bucket_mut(profile.role).insert(
                id,
                SnapshotRecord {
                    credential: credential.clone(),
                    profile,
                },
            );
        }

        tracing::info!(accounts = snapshot.len(), "snapshot exported");
        Ok(snapshot)
    }

    /// Merge a snapshot into the local store. Existing identities are left
    /// untouched; the local network metadata is kept.
    pub fn import_snapshot(&self, snapshot: &GlobalSnapshot) -> Result<ImportStats> {
        let mut stats = ImportStats::default();
        let tx = self.conn().unchecked_transaction()?;

        for (role, bucket) in snapshot.buckets() {
            for (key, record) in bucket {
                let credential = Credential::from_encoded(&record.credential)?;
                let mut profile = record.profile.clone();
                // The bucket decides the role
                profile.role = role;

                if key != profile.id.as_str() {
                    tracing::warn!(key = %key, id = %profile.id, "snapshot key does not match profile id");
                }

                match insert_account(&tx, &profile, &credential) {
                    Ok(()) => stats.imported += 1,
                    Err(StoreError::Sqlite(rusqlite::Error::SqliteFailure(f, _)))
                        if f.code == ErrorCode::ConstraintViolation =>
                    {
                        stats.skipped += 1;
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        if stats.imported > 0 {
            touch_last_sync(&tx)?;
        }
        tx.commit()?;

        tracing::info!(
            imported = stats.imported,
            skipped = stats.skipped,
            source = %snapshot.metadata.network_id,
            "snapshot imported"
        );
        Ok(stats)
    }
}
