//! Typed configuration from environment variables.
//!
//! Loaded once at startup; fails fast on missing required vars. The
//! database URL carries credentials and stays wrapped in `SecretString`.

use std::path::PathBuf;

use crate::error::{Error, Result};
use secrecy::SecretString;

/// Default location of the branch directory file.
pub const DEFAULT_BRANCHES_FILE: &str = "branches.toml";

#[derive(Debug)]
pub struct Config {
    pub database_url: SecretString,
    pub branches_file: PathBuf,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: SecretString::from(required_var("DATABASE_URL")?),
            branches_file: std::env::var("BRANCHES_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_BRANCHES_FILE)),
            otel_endpoint: std::env::var("OTEL_ENDPOINT")
                .ok()
                .filter(|s| !s.is_empty()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn required_var(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(Error::Config(format!(
            "required environment variable {name} is not set"
        ))),
    }
}
