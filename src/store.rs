//! Process-wide persistence store.
//!
//! A key-value snapshot store backed by SQLite. The core components never
//! assume it holds anything: every read has a default, and a missing or
//! failing store degrades to in-memory state. Lifecycle is load-at-init,
//! save-on-mutation.

use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::domain::{Deck, Mode};

/// Snapshot keys
pub const KEY_DECK: &str = "deck_snapshot";
pub const KEY_STUDY: &str = "study_snapshot";
pub const KEY_MODE: &str = "mode";

/// Extension trait for logging errors before discarding them
pub trait LogOnError<T> {
    /// Log the error at warn level and return None
    fn log_warn(self, context: &str) -> Option<T>;
    /// Log the error at warn level and return the default
    fn log_warn_default(self, context: &str) -> T
    where
        T: Default;
}

impl<T, E: std::fmt::Display> LogOnError<T> for std::result::Result<T, E> {
    fn log_warn(self, context: &str) -> Option<T> {
        match self {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!("{}: {}", context, e);
                None
            }
        }
    }

    fn log_warn_default(self, context: &str) -> T
    where
        T: Default,
    {
        match self {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("{}: {}", context, e);
                T::default()
            }
        }
    }
}

/// Store access errors
#[derive(Debug)]
pub enum StoreError {
    /// The connection mutex was poisoned by a panicking thread
    Lock,
    Sqlite(rusqlite::Error),
    Serde(serde_json::Error),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Lock => write!(f, "Store unavailable"),
            StoreError::Sqlite(e) => write!(f, "Store query failed: {}", e),
            StoreError::Serde(e) => write!(f, "Snapshot encoding failed: {}", e),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Sqlite(e)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serde(e)
    }
}

#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open (or create) the store at the given path and run migrations.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(path)?;
        run_migrations(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory store, used by tests and ephemeral sessions.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        run_migrations(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_: PoisonError<_>| {
            tracing::error!("store mutex poisoned - a thread panicked while holding the lock");
            StoreError::Lock
        })
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT value FROM snapshots WHERE key = ?1")?;
        let mut rows = stmt.query([key])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    /// Read a key, falling back to `default` when absent or unreadable.
    pub fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key)
            .log_warn("Store read failed")
            .flatten()
            .unwrap_or_else(|| default.to_string())
    }

    pub fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO snapshots (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            [key, value],
        )?;
        Ok(())
    }

    pub fn set_json<T: serde::Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let encoded = serde_json::to_string(value)?;
        self.set(key, &encoded)
    }

    pub fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<T>, StoreError> {
        match self.get(key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    // ==================== Snapshot helpers ====================

    pub fn save_deck(&self, deck: &Deck) -> Result<(), StoreError> {
        self.set_json(KEY_DECK, deck)
    }

    pub fn load_deck(&self) -> Result<Option<Deck>, StoreError> {
        self.get_json(KEY_DECK)
    }

    pub fn save_mode(&self, mode: Mode) -> Result<(), StoreError> {
        self.set(KEY_MODE, mode.as_str())
    }

    /// Load the persisted mode selection, defaulting to Study.
    pub fn load_mode(&self) -> Mode {
        Mode::from_str(&self.get_or(KEY_MODE, Mode::Study.as_str())).unwrap_or_default()
    }
}

fn run_migrations(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS snapshots (
          key TEXT PRIMARY KEY,
          value TEXT NOT NULL
        );
        "#,
    )
}
