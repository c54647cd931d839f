//! SQLite-backed transactional store.
//!
//! One `rusqlite` connection behind an async mutex; every caller funnels
//! through [`Store::with_conn`], so multi-statement writes run on a single
//! serialized connection and can open a real SQLite transaction. The store
//! also owns the user table; task and ledger row operations live next to
//! their domain types and receive a `&Connection`.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::error::{CoreError, CoreResult};
use crate::roles::Role;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    username      TEXT NOT NULL UNIQUE,
    email         TEXT NOT NULL UNIQUE,
    role          TEXT NOT NULL CHECK(role IN ('advisor', 'parent', 'member')),
    password_hash TEXT NOT NULL,
    salt          TEXT NOT NULL,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS tasks (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    title        TEXT NOT NULL,
    description  TEXT NOT NULL DEFAULT '',
    task_type    TEXT NOT NULL CHECK(task_type IN ('PM', 'FTL', 'PA', 'UBI')),
    points       INTEGER NOT NULL CHECK(points >= 0),
    status       TEXT NOT NULL DEFAULT 'pending',
    created_by   INTEGER NOT NULL REFERENCES users(id),
    assignee_id  INTEGER REFERENCES users(id),
    due_date     TEXT,
    completed_at TEXT,
    approved_at  TEXT,
    approved_by  INTEGER REFERENCES users(id),
    created_at   TEXT NOT NULL,
    updated_at   TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);
CREATE INDEX IF NOT EXISTS idx_tasks_assignee ON tasks(assignee_id);

CREATE TABLE IF NOT EXISTS points_ledger (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id    INTEGER NOT NULL REFERENCES users(id),
    delta      INTEGER NOT NULL,
    reason     TEXT NOT NULL CHECK(reason IN
                 ('task_completed', 'task_approved', 'manual_adjustment', 'correction')),
    task_id    INTEGER REFERENCES tasks(id),
    note       TEXT,
    created_by INTEGER REFERENCES users(id),
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_ledger_user ON points_ledger(user_id);
CREATE INDEX IF NOT EXISTS idx_ledger_created ON points_ledger(created_at);
";

/// A registered household member.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: Role,
    #[serde(skip)]
    pub password_hash: String,
    #[serde(skip)]
    pub salt: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Shared handle to the SQLite database.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (creating if needed) the database at `path`.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let conn = Connection::open(path)?;
        // WAL keeps readers unblocked during the write transactions the
        // workflow opens; a no-op for in-memory databases, so only set here.
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::from_connection(conn)
    }

    /// In-memory database, used by tests.
    pub fn open_in_memory() -> anyhow::Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> anyhow::Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run `f` with exclusive access to the connection. This is the only
    /// path to the database; it is what serializes concurrent writers.
    pub async fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> CoreResult<T>,
    ) -> CoreResult<T> {
        let mut conn = self.conn.lock().await;
        f(&mut conn)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Users
    // ─────────────────────────────────────────────────────────────────────

    pub async fn create_user(
        &self,
        username: &str,
        email: &str,
        role: Role,
        password_hash: &str,
        salt: &str,
    ) -> CoreResult<User> {
        let username = username.to_string();
        let email = email.to_string();
        let password_hash = password_hash.to_string();
        let salt = salt.to_string();
        self.with_conn(move |conn| {
            let now = Utc::now();
            conn.execute(
                "INSERT INTO users (username, email, role, password_hash, salt, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![username, email, role.as_str(), password_hash, salt, now, now],
            )
            .map_err(|e| match e {
                rusqlite::Error::SqliteFailure(err, _)
                    if err.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    CoreError::Validation("username or email already taken".to_string())
                }
                other => CoreError::Storage(other),
            })?;
            let id = conn.last_insert_rowid();
            user_by_id(conn, id)
        })
        .await
    }

    pub async fn user_by_username(&self, username: &str) -> CoreResult<Option<User>> {
        let username = username.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT id, username, email, role, password_hash, salt, created_at, updated_at
                 FROM users WHERE username = ?1",
                params![username],
                user_from_row,
            )
            .optional()
            .map_err(CoreError::from)
        })
        .await
    }

    pub async fn user_by_id(&self, id: i64) -> CoreResult<User> {
        self.with_conn(move |conn| user_by_id(conn, id)).await
    }

    pub async fn user_count(&self) -> CoreResult<i64> {
        self.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
                .map_err(CoreError::from)
        })
        .await
    }
}

/// Fetch a user inside an existing connection scope.
pub fn user_by_id(conn: &Connection, id: i64) -> CoreResult<User> {
    conn.query_row(
        "SELECT id, username, email, role, password_hash, salt, created_at, updated_at
         FROM users WHERE id = ?1",
        params![id],
        user_from_row,
    )
    .optional()?
    .ok_or_else(|| CoreError::NotFound(format!("user {id}")))
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    let role_str: String = row.get(3)?;
    let role = Role::parse(&role_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("unknown role '{role_str}'").into(),
        )
    })?;
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        role,
        password_hash: row.get(4)?,
        salt: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_fetch_user() {
        let store = Store::open_in_memory().unwrap();
        let user = store
            .create_user("alice", "alice@example.com", Role::Parent, "hash", "salt")
            .await
            .unwrap();
        assert_eq!(user.username, "alice");
        assert_eq!(user.role, Role::Parent);

        let by_name = store.user_by_username("alice").await.unwrap().unwrap();
        assert_eq!(by_name.id, user.id);
        assert!(store.user_by_username("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username_is_validation_error() {
        let store = Store::open_in_memory().unwrap();
        store
            .create_user("alice", "a@example.com", Role::Member, "h", "s")
            .await
            .unwrap();
        let err = store
            .create_user("alice", "b@example.com", Role::Member, "h", "s")
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[tokio::test]
    async fn test_reopen_persists_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("board.db");
        {
            let store = Store::open(&path).unwrap();
            store
                .create_user("alice", "alice@example.com", Role::Member, "h", "s")
                .await
                .unwrap();
        }
        let store = Store::open(&path).unwrap();
        assert!(store.user_by_username("alice").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_missing_user_is_not_found() {
        let store = Store::open_in_memory().unwrap();
        let err = store.user_by_id(99).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }
}
