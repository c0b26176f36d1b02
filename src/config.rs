use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::error::ServerError;
use crate::web::{AllowedOrigins, ServerSettings};

// ============================================
// Environment variable name constants
// ============================================
pub mod env {
    pub const LOG_FORMAT: &str = "LOG_FORMAT";
    pub const LOG_LEVEL: &str = "LOG_LEVEL";
    pub const SERVER_PORT: &str = "SERVER_PORT";
    pub const STORAGE_BACKEND: &str = "STORAGE_BACKEND";
    pub const STORAGE_PATH: &str = "STORAGE_PATH";
    pub const ALLOWED_ORIGINS: &str = "ALLOWED_ORIGINS";
    pub const DRAIN_TIMEOUT_SECS: &str = "DRAIN_TIMEOUT_SECS";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// SQLite file under the storage path
    Sqlite,
    /// In-memory store; accepts writes, answers every query with empty data
    Memory,
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackend::Sqlite => write!(f, "sqlite"),
            StorageBackend::Memory => write!(f, "memory"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Show version information
    Version,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "resource-viewer",
    version,
    about = "Read-only query API and UI server for collected cloud resource data"
)]
pub struct Config {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Log format
    #[arg(long, env = env::LOG_FORMAT, value_enum, default_value = "json")]
    pub log_format: LogFormat,

    /// Log level: trace, debug, info, warn, error
    #[arg(long, env = env::LOG_LEVEL, default_value = "info")]
    pub log_level: String,

    /// API/UI server port
    #[arg(long, env = env::SERVER_PORT, default_value = "8081")]
    pub server_port: u16,

    /// Storage backend
    #[arg(long, env = env::STORAGE_BACKEND, value_enum, default_value = "sqlite")]
    pub storage_backend: StorageBackend,

    /// Directory holding the SQLite database (sqlite backend only)
    #[arg(long, env = env::STORAGE_PATH, default_value = "/data")]
    pub storage_path: String,

    /// Origins allowed to call the API, comma-separated ("*" = any)
    #[arg(long, env = env::ALLOWED_ORIGINS, value_delimiter = ',', default_value = "*")]
    pub allowed_origins: Vec<String>,

    /// Seconds in-flight requests may take to finish after shutdown starts
    #[arg(long, env = env::DRAIN_TIMEOUT_SECS, default_value = "30")]
    pub drain_timeout_secs: u64,
}

impl Config {
    pub fn from_args() -> Self {
        Config::parse()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.drain_timeout_secs == 0 {
            return Err(format!("{} must be greater than 0", env::DRAIN_TIMEOUT_SECS));
        }
        if self.storage_backend == StorageBackend::Sqlite && self.storage_path.trim().is_empty() {
            return Err(format!(
                "{} is required with the sqlite backend",
                env::STORAGE_PATH
            ));
        }
        AllowedOrigins::parse(&self.allowed_origins).map_err(|e| e.to_string())?;
        Ok(())
    }

    /// Get SQLite database path
    pub fn get_db_path(&self) -> String {
        format!("{}/resources.db", self.storage_path.trim_end_matches('/'))
    }

    pub fn server_settings(&self) -> Result<ServerSettings, ServerError> {
        Ok(ServerSettings {
            port: self.server_port,
            allowed_origins: AllowedOrigins::parse(&self.allowed_origins)?,
            drain_timeout: Duration::from_secs(self.drain_timeout_secs),
        })
    }
}
