//! Service configuration loaded once from the environment.

use std::str::FromStr;

use anyhow::{bail, Context};

/// Deployment mode. Only `Development` exposes raw error details to clients.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Mode {
    Development,
    Test,
    #[default]
    Production,
}

impl Mode {
    pub fn is_development(self) -> bool { self == Mode::Development }
}

impl FromStr for Mode {
    type Err = std::convert::Infallible;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Mode::Development,
            "test" => Mode::Test,
            _ => Mode::Production,
        })
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub nats_url: Option<String>,
    pub jwt_secret: String,
    pub mode: Mode,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mode = lookup("APP_ENV").map(|v| v.parse::<Mode>().unwrap_or_default()).unwrap_or_default();
        let port = match lookup("PORT") {
            Some(p) => p.parse().with_context(|| format!("PORT is not a valid port: {p}"))?,
            None => 8083,
        };
        let max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            Some(n) => n.parse().with_context(|| format!("DATABASE_MAX_CONNECTIONS is not a number: {n}"))?,
            None => 10,
        };
        let jwt_secret = match lookup("JWT_SECRET").filter(|s| !s.is_empty()) {
            Some(secret) => secret,
            None if mode == Mode::Development => "dev-secret".to_string(),
            None => bail!("JWT_SECRET must be set outside development"),
        };
        Ok(Self {
            port,
            database_url: lookup("DATABASE_URL").filter(|s| !s.is_empty()),
            max_connections,
            nats_url: lookup("NATS_URL").filter(|s| !s.is_empty()),
            jwt_secret,
            mode,
        })
    }
}
