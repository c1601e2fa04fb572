//! Configuration - connection parameters and environment-driven settings

use crate::file_codec::DEFAULT_PREVIEW_ROWS;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Parameters for one ClickHouse session. Every credential is optional;
/// without any the server's default user is used.
#[derive(Clone, Deserialize, PartialEq, Eq)]
pub struct ConnectionParams {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default, alias = "jwt_token")]
    pub auth_token: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
    /// Use https for the HTTP interface
    #[serde(default)]
    pub secure: bool,
}

impl ConnectionParams {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            user: None,
            password: None,
            auth_token: None,
            database: None,
            secure: false,
        }
    }

    pub fn with_credentials(mut self, user: impl Into<String>, password: Option<String>) -> Self {
        self.user = Some(user.into());
        self.password = password;
        self
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn endpoint(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{}://{}:{}/", scheme, self.host.trim_end_matches('/'), self.port)
    }
}

// credentials stay out of logs
impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("auth_token", &self.auth_token.as_ref().map(|_| "***"))
            .field("database", &self.database)
            .field("secure", &self.secure)
            .finish()
    }
}

/// Process-wide settings, read from the environment (and `.env`)
#[derive(Debug, Clone)]
pub struct Settings {
    pub connection: ConnectionParams,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    /// Relative export destinations resolve against this directory
    pub output_dir: PathBuf,
    pub preview_rows: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            connection: ConnectionParams::new("localhost", 8123),
            timeout: Duration::from_secs(300),
            connect_timeout: Duration::from_secs(10),
            output_dir: PathBuf::from("uploads"),
            preview_rows: DEFAULT_PREVIEW_ROWS,
        }
    }
}

impl Settings {
    /// Create settings from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Settings::from_env`] over an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Settings::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match get("CLICKHOUSE_PORT") {
            Some(v) => v
                .trim()
                .parse::<u16>()
                .with_context(|| format!("CLICKHOUSE_PORT is not a valid port: {}", v))?,
            None => defaults.connection.port,
        };

        let secure = match get("CLICKHOUSE_SECURE") {
            Some(v) => parse_bool(&v).with_context(|| format!("CLICKHOUSE_SECURE is not a boolean: {}", v))?,
            None => false,
        };

        let connection = ConnectionParams {
            host: get("CLICKHOUSE_HOST").unwrap_or(defaults.connection.host),
            port,
            user: get("CLICKHOUSE_USER"),
            password: get("CLICKHOUSE_PASSWORD"),
            auth_token: get("CLICKHOUSE_JWT"),
            database: get("CLICKHOUSE_DATABASE"),
            secure,
        };

        Ok(Self {
            connection,
            timeout: secs_or(get("CLICKHOUSE_TIMEOUT_SECS"), "CLICKHOUSE_TIMEOUT_SECS", defaults.timeout)?,
            connect_timeout: secs_or(
                get("CLICKHOUSE_CONNECT_TIMEOUT_SECS"),
                "CLICKHOUSE_CONNECT_TIMEOUT_SECS",
                defaults.connect_timeout,
            )?,
            output_dir: get("INGEST_OUTPUT_DIR").map(PathBuf::from).unwrap_or(defaults.output_dir),
            preview_rows: match get("INGEST_PREVIEW_ROWS") {
                Some(v) => v
                    .trim()
                    .parse()
                    .with_context(|| format!("INGEST_PREVIEW_ROWS is not a number: {}", v))?,
                None => defaults.preview_rows,
            },
        })
    }
}

fn secs_or(value: Option<String>, key: &str, default: Duration) -> Result<Duration> {
    match value {
        Some(v) => {
            let secs = v
                .trim()
                .parse::<u64>()
                .with_context(|| format!("{} is not a number of seconds: {}", key, v))?;
            Ok(Duration::from_secs(secs))
        }
        None => Ok(default),
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("unrecognised boolean '{}'", other),
    }
}
