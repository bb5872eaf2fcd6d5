//! SQLite-backed credential store.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{AccessToken, AuthorizedUser, CredentialError, CredentialStore};

pub struct SqliteCredentialStore {
    conn: Mutex<Connection>,
}

impl SqliteCredentialStore {
    /// Open (or create) the credential database at `path`.
    pub fn new(path: &Path) -> Result<Self, CredentialError> {
        let conn = Connection::open(path).map_err(CredentialError::database)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, CredentialError> {
        let conn = Connection::open_in_memory().map_err(CredentialError::database)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), CredentialError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS user_tokens (
                user_id TEXT PRIMARY KEY,
                token TEXT NOT NULL,
                authorized_at TEXT NOT NULL
            );
            "#,
        )
        .map_err(CredentialError::database)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, CredentialError> {
        self.conn
            .lock()
            .map_err(|_| CredentialError::database("connection mutex poisoned"))
    }
}

impl CredentialStore for SqliteCredentialStore {
    fn get(&self, user_id: &str) -> Result<Option<AuthorizedUser>, CredentialError> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT user_id, token, authorized_at FROM user_tokens WHERE user_id = ?",
                params![user_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()
            .map_err(CredentialError::database)?;

        Ok(row.map(|(user_id, token, authorized_at)| AuthorizedUser {
            user_id,
            token: AccessToken::new(token),
            authorized_at: DateTime::parse_from_rfc3339(&authorized_at)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        }))
    }

    fn put(&self, user: &AuthorizedUser) -> Result<(), CredentialError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO user_tokens (user_id, token, authorized_at) VALUES (?, ?, ?)
             ON CONFLICT(user_id) DO UPDATE SET token = excluded.token, authorized_at = excluded.authorized_at",
            params![
                user.user_id,
                user.token.expose(),
                user.authorized_at.to_rfc3339()
            ],
        )
        .map_err(CredentialError::database)?;
        Ok(())
    }
}
