//! SQLite-backed settings store.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use super::{SettingsRecord, SettingsStore, StoreError};

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS user_settings (
    id TEXT PRIMARY KEY,
    user_email TEXT UNIQUE NOT NULL,
    gemini_api_key TEXT,
    github_pat_token TEXT,
    gemini_key_expires_at TEXT,
    github_token_expires_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
";

pub struct SqliteSettingsStore {
    conn: Mutex<Connection>,
}

impl SqliteSettingsStore {
    /// Open or create the settings database at `db_path`.
    pub fn open(db_path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        debug!(path = %db_path.display(), "opening settings database");
        let conn = Connection::open(db_path)?;
        conn.execute_batch("PRAGMA busy_timeout = 5000;")?;
        Self::with_connection(conn)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl SettingsStore for SqliteSettingsStore {
    fn find(&self, user_email: &str) -> Result<Option<SettingsRecord>, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let row = conn
            .query_row(
                "SELECT id, user_email, gemini_api_key, github_pat_token,
                        gemini_key_expires_at, github_token_expires_at, created_at, updated_at
                 FROM user_settings WHERE user_email = ?1 LIMIT 1",
                params![user_email],
                |row| {
                    Ok(RawRow {
                        id: row.get(0)?,
                        user_email: row.get(1)?,
                        gemini_api_key: row.get(2)?,
                        github_pat_token: row.get(3)?,
                        gemini_key_expires_at: row.get(4)?,
                        github_token_expires_at: row.get(5)?,
                        created_at: row.get(6)?,
                        updated_at: row.get(7)?,
                    })
                },
            )
            .optional()?;
        row.map(RawRow::into_record).transpose()
    }

    fn upsert(&self, record: &SettingsRecord) -> Result<(), StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        conn.execute(
            "INSERT INTO user_settings (
                id, user_email, gemini_api_key, github_pat_token,
                gemini_key_expires_at, github_token_expires_at, created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(user_email) DO UPDATE SET
                gemini_api_key = excluded.gemini_api_key,
                github_pat_token = excluded.github_pat_token,
                gemini_key_expires_at = excluded.gemini_key_expires_at,
                github_token_expires_at = excluded.github_token_expires_at,
                updated_at = excluded.updated_at",
            params![
                record.id,
                record.user_email,
                record.gemini_api_key,
                record.github_pat_token,
                record.gemini_key_expires_at.map(|t| t.to_rfc3339()),
                record.github_token_expires_at.map(|t| t.to_rfc3339()),
                record.created_at.to_rfc3339(),
                record.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn delete(&self, user_email: &str) -> Result<bool, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let removed = conn.execute("DELETE FROM user_settings WHERE user_email = ?1", params![user_email])?;
        Ok(removed > 0)
    }
}

struct RawRow {
    id: String,
    user_email: String,
    gemini_api_key: Option<String>,
    github_pat_token: Option<String>,
    gemini_key_expires_at: Option<String>,
    github_token_expires_at: Option<String>,
    created_at: String,
    updated_at: String,
}

impl RawRow {
    fn into_record(self) -> Result<SettingsRecord, StoreError> {
        Ok(SettingsRecord {
            id: self.id,
            user_email: self.user_email,
            gemini_api_key: self.gemini_api_key,
            github_pat_token: self.github_pat_token,
            gemini_key_expires_at: self.gemini_key_expires_at.as_deref().map(parse_timestamp).transpose()?,
            github_token_expires_at: self.github_token_expires_at.as_deref().map(parse_timestamp).transpose()?,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Timestamp(format!("{value}: {e}")))
}
