use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::warn;

/// Secrets that must never reach production.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

const DEFAULT_SECRET: &str = "dev-secret-change-me";

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
}

impl Config {
    /// Read `SYNTRA_*` variables from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let host = lookup("SYNTRA_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = match lookup("SYNTRA_PORT") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("SYNTRA_PORT is not a port: {}", raw))?,
            None => 5000,
        };
        let db_path = lookup("SYNTRA_DB_PATH").unwrap_or_else(|| "syntra.db".into()).into();

        let jwt_secret = lookup("SYNTRA_JWT_SECRET")
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_SECRET.into());
        if PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            warn!("SYNTRA_JWT_SECRET is unset or a placeholder; REST tokens are forgeable");
        }

        Ok(Self {
            host,
            port,
            db_path,
            jwt_secret,
        })
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}
