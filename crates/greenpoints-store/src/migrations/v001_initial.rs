//! v001 -- Initial schema creation.
//!
//! Creates `accounts` (one row per identity, tagged with its role bucket)
//! and the key/value `metadata` table.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Accounts
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS accounts (
    id                TEXT PRIMARY KEY NOT NULL,   -- identity, unique across roles
    role              TEXT NOT NULL CHECK (role IN ('ADMIN', 'USER', 'EMPLOYEE')),
    credential        TEXT NOT NULL,               -- "<salt hex>$<key hex>"
    name              TEXT NOT NULL,
    gender            TEXT NOT NULL DEFAULT 'MALE',
    points            INTEGER NOT NULL DEFAULT 0 CHECK (points >= 0),
    bottles           INTEGER NOT NULL DEFAULT 0 CHECK (bottles >= 0),
    joined_at         TEXT NOT NULL,               -- RFC-3339
    profile_image     TEXT,                        -- base64 payload
    last_image_update TEXT,                        -- RFC-3339
    is_banned         INTEGER NOT NULL DEFAULT 0,  -- boolean 0/1
    notice            TEXT,
    theme             TEXT NOT NULL DEFAULT 'DARK'
);

CREATE INDEX IF NOT EXISTS idx_accounts_role_points
    ON accounts(role, points DESC);

-- ----------------------------------------------------------------
-- Network metadata (network_id, last_sync, version, master_key)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS metadata (
    key   TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
