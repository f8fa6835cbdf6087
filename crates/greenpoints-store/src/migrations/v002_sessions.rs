use rusqlite::Connection;

const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS sessions (
    token          TEXT PRIMARY KEY NOT NULL,  -- hex-encoded 32 random bytes
    account_id     TEXT NOT NULL,              -- FK -> accounts(id)
    snapshot       TEXT NOT NULL,              -- profile JSON as last synced
    created_at     TEXT NOT NULL,
    expires_at     TEXT NOT NULL,
    last_synced_at TEXT NOT NULL,

    FOREIGN KEY (account_id) REFERENCES accounts(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_sessions_account ON sessions(account_id);
CREATE INDEX IF NOT EXISTS idx_sessions_expiry ON sessions(expires_at);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
