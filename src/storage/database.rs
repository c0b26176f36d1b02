//! SQLite connection and lifecycle management

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, info};

use crate::error::StorageError;

use super::schema::list_tables;

/// SQLite-backed storage, one table per resource kind
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
    db_path: String,
}

impl SqliteStorage {
    /// Open (or create) the database at `db_path`. `:memory:` opens a private in-memory database.
    pub fn open(db_path: &str) -> Result<Self> {
        info!(path = %db_path, "Initializing database");

        if Path::new(db_path).exists() {
            let size = std::fs::metadata(db_path)
                .map(|m| Self::format_bytes(m.len()))
                .unwrap_or_else(|_| "unknown".to_string());
            info!(path = %db_path, size = %size, "Found existing database file");
        }

        if let Some(parent) = Path::new(db_path).parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            info!(directory = %parent.display(), "Creating database directory");
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;
        }

        debug!(path = %db_path, "Opening SQLite connection");
        let conn = Connection::open(db_path)
            .map_err(|e| {
                error!(path = %db_path, error = %e, "Failed to open SQLite database");
                e
            })
            .context("Failed to open SQLite database")?;

        let sqlite_version: String = conn
            .query_row("SELECT sqlite_version()", [], |row| row.get(0))
            .unwrap_or_else(|_| "unknown".to_string());

        let tables = list_tables(&conn).context("Failed to list resource tables")?;

        info!(
            path = %db_path,
            sqlite_version = %sqlite_version,
            resource_tables = tables.len(),
            "Database initialized successfully"
        );

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: db_path.to_string(),
        })
    }

    pub fn path(&self) -> &str {
        &self.db_path
    }

    pub(super) fn conn(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Persistence("database connection lock poisoned".to_string()))
    }

    /// Format bytes into human-readable string
    pub(super) fn format_bytes(bytes: u64) -> String {
        const KB: u64 = 1024;
        const MB: u64 = KB * 1024;
        const GB: u64 = MB * 1024;

        if bytes >= GB {
            format!("{:.2} GB", bytes as f64 / GB as f64)
        } else if bytes >= MB {
            format!("{:.2} MB", bytes as f64 / MB as f64)
        } else if bytes >= KB {
            format!("{:.2} KB", bytes as f64 / KB as f64)
        } else {
            format!("{} B", bytes)
        }
    }
}

impl Clone for SqliteStorage {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
            db_path: self.db_path.clone(),
        }
    }
}
