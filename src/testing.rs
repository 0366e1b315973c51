//! Test utilities.
//!
//! Provides a disposable store environment and a small deck fixture so
//! tests share one authoritative setup path.

use tempfile::TempDir;

use crate::domain::{Deck, DeckRow};
use crate::store::{Store, StoreError};

/// Test environment with an on-disk store in a temporary directory.
///
/// The directory is kept alive for the life of the environment and
/// cleaned up automatically when dropped.
pub struct TestEnv {
    /// Temporary directory (kept alive for store file persistence)
    pub temp: TempDir,
    pub store: Store,
}

impl TestEnv {
    pub fn new() -> Result<Self, StoreError> {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "flashcoach=debug".into()),
            )
            .with_test_writer()
            .try_init();

        let temp = TempDir::new().map_err(|e| {
            StoreError::Sqlite(rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
        })?;
        let store = Store::open(&temp.path().join("store.db"))?;
        Ok(Self { temp, store })
    }

    /// Get the temporary directory path for creating test files.
    pub fn path(&self) -> &std::path::Path {
        self.temp.path()
    }
}

/// Two-card fixture deck.
pub fn sample_deck() -> Deck {
    Deck::from_rows(
        vec![
            DeckRow::new("abate", "减弱", Some(10)),
            DeckRow::new("banal", "陈腐", Some(10)),
        ],
        30,
    )
}
