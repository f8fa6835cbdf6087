//! Network metadata: identifier, last write time, data format version and
//! the optional master network key.

use chrono::Utc;
use greenpoints_shared::constants::{
    DATA_FORMAT_VERSION, NETWORK_ID_PREFIX, NETWORK_ID_SUFFIX_LEN,
};
use greenpoints_shared::error::ValidationError;
use rand::distributions::Alphanumeric;
use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{parse_db_time, to_db_time, NetworkMetadata};

const KEY_NETWORK_ID: &str = "network_id";
const KEY_LAST_SYNC: &str = "last_sync";
const KEY_VERSION: &str = "version";
const KEY_MASTER_KEY: &str = "master_key";

impl Database {
    /// Generate the network id on first open. Existing values are kept.
    pub(crate) fn ensure_metadata(&self) -> Result<()> {
        let tx = self.conn().unchecked_transaction()?;
        if get_value(&tx, KEY_NETWORK_ID)?.is_none() {
            let network_id = generate_network_id();
            tracing::info!(network_id = %network_id, "initialising network metadata");
            set_value(&tx, KEY_NETWORK_ID, &network_id)?;
            set_value(&tx, KEY_VERSION, DATA_FORMAT_VERSION)?;
            touch_last_sync(&tx)?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn metadata(&self) -> Result<NetworkMetadata> {
        let network_id = get_value(self.conn(), KEY_NETWORK_ID)?.ok_or(StoreError::NotFound)?;
        let last_sync = get_value(self.conn(), KEY_LAST_SYNC)?.ok_or(StoreError::NotFound)?;
        let version = get_value(self.conn(), KEY_VERSION)?
            .unwrap_or_else(|| DATA_FORMAT_VERSION.to_string());

        Ok(NetworkMetadata {
            network_id,
            last_sync: parse_db_time(0, &last_sync)?,
            version,
        })
    }

    /// The master network key, falling back to the network id when unset.
    pub fn master_key(&self) -> Result<String> {
        match get_value(self.conn(), KEY_MASTER_KEY)? {
            Some(key) => Ok(key),
            None => Ok(self.metadata()?.network_id),
        }
    }

    pub fn set_master_key(&self, key: &str) -> Result<()> {
        let key = key.trim();
        if key.is_empty() {
            return Err(ValidationError::EmptySecret.into());
        }
        let tx = self.conn().unchecked_transaction()?;
        set_value(&tx, KEY_MASTER_KEY, key)?;
        touch_last_sync(&tx)?;
        tx.commit()?;
        tracing::info!("master network key updated");
        Ok(())
    }
}

/// Record that the data changed. Called inside every write transaction.
pub(crate) fn touch_last_sync(conn: &Connection) -> Result<()> {
    set_value(conn, KEY_LAST_SYNC, &to_db_time(&Utc::now()))
}

fn get_value(conn: &Connection, key: &str) -> Result<Option<String>> {
    Ok(conn
        .query_row(
            "SELECT value FROM metadata WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?)
}

fn set_value(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO metadata (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )?;
    Ok(())
}

fn generate_network_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(NETWORK_ID_SUFFIX_LEN)
        .map(|b| char::from(b).to_ascii_uppercase())
        .collect();
    format!("{NETWORK_ID_PREFIX}{suffix}")
}
