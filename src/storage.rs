//! Storage layer for the resource viewer
//!
//! The web layer only talks to the [`Storage`] trait. Two backends implement it:
//! an in-memory, shape-only double and an SQLite file.
//!
//! # Module Structure
//! - `port`: The `Storage` trait every backend implements
//! - `models`: Records, rows and summaries
//! - `memory`: In-memory backend with a call log
//! - `database`: SQLite connection and lifecycle management
//! - `schema`: Per-kind table naming and provisioning
//! - `operations`: `Storage` implementation for SQLite

mod database;
mod memory;
mod models;
mod operations;
mod port;
mod schema;

// Re-export public types
pub use database::SqliteStorage;
pub use memory::{MemoryStorage, StorageCall};
pub use models::{Record, ResourceRow, Summary, SummaryMap};
pub use port::Storage;
