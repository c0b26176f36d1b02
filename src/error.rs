//! Error types shared by the storage and web layers.

use std::net::SocketAddr;

use thiserror::Error;

/// Failures reported by a storage backend.
///
/// Queries for data that does not exist are not errors; backends return
/// empty collections instead and leave "not found" decisions to callers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The medium is unreachable or the record does not fit its schema.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// A schema could not be provisioned or removed.
    #[error("schema error for '{kind}': {reason}")]
    Schema { kind: String, reason: String },
}

impl StorageError {
    pub fn persistence<E: std::fmt::Display>(err: E) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn schema<E: std::fmt::Display>(kind: &str, err: E) -> Self {
        Self::Schema {
            kind: kind.to_string(),
            reason: err.to_string(),
        }
    }
}

/// A response body could not be serialized.
#[derive(Error, Debug)]
#[error("failed to encode response body: {0}")]
pub struct EncodingError(#[from] pub serde_json::Error);

/// Errors raised while configuring or starting the HTTP server.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid allowed origin '{0}'")]
    InvalidOrigin(String),
}
