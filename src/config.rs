//! Application configuration constants.
//!
//! Centralizes the tunable values used across the study and test modes,
//! with a `config.toml > environment > default` loading chain for the
//! deployment-specific ones.

use serde::Deserialize;
use std::path::PathBuf;

// ==================== Study Configuration ====================

/// Time budget applied to cards whose source row has no usable duration
pub const DEFAULT_CARD_DURATION_SECS: u32 = 30;

// ==================== Test Session Configuration ====================

/// Countdown tick period
pub const COUNTDOWN_TICK_MS: u64 = 1_000;

/// Pause between releasing one capture and acquiring the next, letting the
/// hardware release settle before re-acquisition
pub const CAPTURE_SETTLE_MS: u64 = 250;

// ==================== External Endpoints ====================

/// Evaluation endpoint used when neither config.toml nor the environment
/// provides one
pub const DEFAULT_EVAL_ENDPOINT: &str = "http://localhost:7861/api/process_test";

// ==================== Loading ====================

/// Configuration file structure for config.toml
#[derive(Debug, Deserialize)]
struct AppConfig {
    store: Option<StoreConfig>,
    evaluation: Option<EvaluationConfig>,
}

#[derive(Debug, Deserialize)]
struct StoreConfig {
    path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EvaluationConfig {
    endpoint: Option<String>,
}

fn read_config() -> Option<AppConfig> {
    let contents = std::fs::read_to_string("config.toml").ok()?;
    toml::from_str(&contents).ok()
}

/// Load the persistence store path with priority: config.toml > .env > default
pub fn load_store_path() -> PathBuf {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    if let Some(config) = read_config() {
        if let Some(path) = config.store.and_then(|s| s.path) {
            tracing::info!("Using store path from config.toml: {}", path);
            return PathBuf::from(path);
        }
    }

    if let Ok(path) = std::env::var("STORE_PATH") {
        tracing::info!("Using store path from STORE_PATH env: {}", path);
        return PathBuf::from(path);
    }

    let default = PathBuf::from("data/flashcoach.db");
    tracing::info!("Using default store path: {}", default.display());
    default
}

/// Load the evaluation endpoint URL with priority: config.toml > .env > default
pub fn evaluation_endpoint() -> String {
    let _ = dotenvy::dotenv();

    if let Some(config) = read_config() {
        if let Some(endpoint) = config.evaluation.and_then(|e| e.endpoint) {
            tracing::info!("Using evaluation endpoint from config.toml: {}", endpoint);
            return endpoint;
        }
    }

    if let Ok(endpoint) = std::env::var("EVAL_ENDPOINT") {
        tracing::info!("Using evaluation endpoint from EVAL_ENDPOINT env: {}", endpoint);
        return endpoint;
    }

    DEFAULT_EVAL_ENDPOINT.to_string()
}
