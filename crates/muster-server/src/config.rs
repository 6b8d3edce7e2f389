//! Configuration management for the registry server.
//!
//! Loads configuration from environment variables layered over a `.env`
//! file, with sensible defaults for everything that is not a secret.

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server display name, reported by `GET /`.
    pub server_name: String,

    /// Bind host.
    pub host: String,

    /// Bind port.
    pub port: u16,

    /// Username of the bootstrapped admin account.
    pub admin_username: String,

    /// Password of the bootstrapped admin account.
    pub admin_password: String,

    /// Server-wide secret used to sign bearer tokens.
    pub token_secret: String,

    /// SQLite database file.
    pub database_file: PathBuf,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists (for local development)
        dotenvy::dotenv().ok();

        let config = Config {
            server_name: env::var("MUSTER_SERVER_NAME").unwrap_or_else(|_| "muster".to_string()),

            host: env::var("MUSTER_SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),

            port: env::var("MUSTER_SERVER_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("Invalid MUSTER_SERVER_PORT")?,

            admin_username: env::var("MUSTER_ADMIN_USERNAME")
                .unwrap_or_else(|_| "admin".to_string()),

            admin_password: env::var("MUSTER_ADMIN_PASSWORD")
                .context("MUSTER_ADMIN_PASSWORD must be set")?,

            token_secret: env::var("MUSTER_TOKEN_SECRET")
                .context("MUSTER_TOKEN_SECRET must be set")?,

            database_file: env::var("MUSTER_DATABASE_FILE")
                .unwrap_or_else(|_| "./muster.db".to_string())
                .into(),
        };

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.port == 0 {
            anyhow::bail!("MUSTER_SERVER_PORT must be greater than 0");
        }

        if self.admin_password.is_empty() {
            anyhow::bail!("MUSTER_ADMIN_PASSWORD must not be empty");
        }

        if self.token_secret.is_empty() {
            anyhow::bail!("MUSTER_TOKEN_SECRET must not be empty");
        }

        Ok(())
    }

    /// Get the server bind address
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
