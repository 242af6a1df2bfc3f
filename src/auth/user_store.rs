//! User Storage
//! Mission: Persist user accounts in SQLite with unique usernames and emails

use crate::auth::models::User;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, types::Type, Connection, ErrorCode, OptionalExtension, Row};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    password TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    last_login TEXT,
    last_ip TEXT
);
"#;

const USER_COLUMNS: &str = "id, username, email, password, created_at, last_login, last_ip";

/// Which unique key a registration collided with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictField {
    Username,
    Email,
}

impl fmt::Display for ConflictField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictField::Username => write!(f, "Username"),
            ConflictField::Email => write!(f, "Email"),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} already exists")]
    Conflict(ConflictField),
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// User storage with SQLite backend
pub struct UserStore {
    conn: Mutex<Connection>,
}

impl UserStore {
    /// Open (or create) the user database at `db_path`
    pub fn new(db_path: &str) -> Result<Self> {
        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                info!("📁 Creating data directory {}", parent.display());
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }

        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open database at {}", db_path))?;
        Self::init(conn)
    }

    /// In-memory store (tests)
    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(SCHEMA_SQL)
            .context("Failed to initialize users schema")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Insert a new user. `password_hash` must already be hashed.
    ///
    /// The creation time doubles as the first login, and the registering
    /// client's address is kept as the last known address.
    pub fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        client_addr: &str,
    ) -> Result<i64, StoreError> {
        let conn = self.conn.lock();

        if Self::exists(&conn, "username", username)? {
            return Err(StoreError::Conflict(ConflictField::Username));
        }
        if Self::exists(&conn, "email", email)? {
            return Err(StoreError::Conflict(ConflictField::Email));
        }

        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO users (username, email, password, created_at, last_login, last_ip)
             VALUES (?1, ?2, ?3, ?4, ?4, ?5)",
            params![username, email, password_hash, now, client_addr],
        )
        .map_err(map_unique_violation)?;

        let id = conn.last_insert_rowid();
        info!("✅ Created user: {} ({})", username, id);
        Ok(id)
    }

    pub fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        self.find_one("username", username)
    }

    pub fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.find_one("email", email)
    }

    pub fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let conn = self.conn.lock();
        let user = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
                params![id],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    /// Stamp a successful login. Failures are logged and swallowed.
    pub fn record_login(&self, id: i64, client_addr: &str) {
        let now = Utc::now().to_rfc3339();
        let result = self.conn.lock().execute(
            "UPDATE users SET last_login = ?1, last_ip = ?2 WHERE id = ?3",
            params![now, client_addr, id],
        );

        match result {
            Ok(0) => warn!("Login recorded for unknown user id {}", id),
            Ok(_) => {}
            Err(e) => warn!("Failed to record login for user {}: {}", id, e),
        }
    }

    pub fn count(&self) -> Result<i64, StoreError> {
        let conn = self.conn.lock();
        Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?)
    }

    fn find_one(&self, column: &'static str, value: &str) -> Result<Option<User>, StoreError> {
        let conn = self.conn.lock();
        let user = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE {} = ?1", USER_COLUMNS, column),
                params![value],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    fn exists(conn: &Connection, column: &'static str, value: &str) -> rusqlite::Result<bool> {
        conn.query_row(
            &format!("SELECT EXISTS(SELECT 1 FROM users WHERE {} = ?1)", column),
            params![value],
            |row| row.get(0),
        )
    }
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    let created_at: String = row.get(4)?;
    let last_login: Option<String> = row.get(5)?;

    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        created_at: parse_timestamp(4, &created_at)?,
        last_login: last_login
            .as_deref()
            .map(|ts| parse_timestamp(5, ts))
            .transpose()?,
        last_ip: row.get(6)?,
    })
}

fn parse_timestamp(column: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}

/// Map a UNIQUE violation that slipped past the existence checks to a conflict
fn map_unique_violation(err: rusqlite::Error) -> StoreError {
    if let rusqlite::Error::SqliteFailure(code, Some(message)) = &err {
        if code.code == ErrorCode::ConstraintViolation {
            if message.contains("users.username") {
                return StoreError::Conflict(ConflictField::Username);
            }
            if message.contains("users.email") {
                return StoreError::Conflict(ConflictField::Email);
            }
        }
    }
    StoreError::Database(err)
}
