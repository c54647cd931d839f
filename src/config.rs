//! Server configuration, read from the environment.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

/// Auth-related settings.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Secret for signing JWTs. Required; the server refuses to start
    /// without one.
    pub jwt_secret: String,
    /// Token lifetime in days.
    pub jwt_ttl_days: i64,
    /// Optional password for seeding the first advisor account when the
    /// user table is empty.
    pub bootstrap_admin_password: Option<String>,
}

/// Top-level configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: PathBuf,
    pub auth: AuthConfig,
}

impl Config {
    /// Load from `FAMILYBOARD_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let host = env_or("FAMILYBOARD_HOST", "0.0.0.0");
        let port = env_or("FAMILYBOARD_PORT", "8080")
            .parse::<u16>()
            .context("FAMILYBOARD_PORT must be a port number")?;
        let database_path = PathBuf::from(env_or("FAMILYBOARD_DB", "familyboard.db"));

        let jwt_secret = std::env::var("FAMILYBOARD_JWT_SECRET").unwrap_or_default();
        if jwt_secret.trim().is_empty() {
            bail!("FAMILYBOARD_JWT_SECRET must be set");
        }
        let jwt_ttl_days = env_or("FAMILYBOARD_JWT_TTL_DAYS", "30")
            .parse::<i64>()
            .context("FAMILYBOARD_JWT_TTL_DAYS must be an integer")?;
        let bootstrap_admin_password = std::env::var("FAMILYBOARD_ADMIN_PASSWORD")
            .ok()
            .filter(|p| !p.trim().is_empty());

        Ok(Self {
            host,
            port,
            database_path,
            auth: AuthConfig {
                jwt_secret,
                jwt_ttl_days,
                bootstrap_admin_password,
            },
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}
