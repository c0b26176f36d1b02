//! In-memory storage backend
//!
//! Shape-correct but content-empty: schema registration and writes are
//! tracked, queries always return empty collections. Every call is logged
//! so tests can assert which operations a request triggered.

use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::error::StorageError;

use super::models::{Record, ResourceRow, SummaryMap};
use super::port::Storage;

/// A single call made against [`MemoryStorage`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageCall {
    Create(String),
    EnsureSchema(String),
    DropSchema(String),
    GetSummary,
    GetResourceRows(String),
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    tables: Mutex<BTreeSet<String>>,
    records: Mutex<Vec<Record>>,
    calls: Mutex<Vec<StorageCall>>,
    query_failure: Option<String>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend whose query operations fail with `message`. Writes still succeed.
    pub fn with_query_failure(message: impl Into<String>) -> Self {
        Self {
            query_failure: Some(message.into()),
            ..Self::default()
        }
    }

    /// Names of the currently registered schemas
    pub fn tables(&self) -> BTreeSet<String> {
        lock(&self.tables).clone()
    }

    /// Records passed to `create`, oldest first
    pub fn records(&self) -> Vec<Record> {
        lock(&self.records).clone()
    }

    /// Calls made so far, oldest first
    pub fn calls(&self) -> Vec<StorageCall> {
        lock(&self.calls).clone()
    }

    fn record_call(&self, call: StorageCall) {
        debug!(call = ?call, "Memory storage call");
        lock(&self.calls).push(call);
    }

    fn check_query(&self) -> Result<(), StorageError> {
        match &self.query_failure {
            Some(message) => Err(StorageError::Persistence(message.clone())),
            None => Ok(()),
        }
    }
}

impl Storage for MemoryStorage {
    fn create(&self, record: &Record) -> Result<(), StorageError> {
        self.record_call(StorageCall::Create(record.kind.clone()));
        lock(&self.records).push(record.clone());
        Ok(())
    }

    fn ensure_schema(&self, kind: &str) -> Result<(), StorageError> {
        self.record_call(StorageCall::EnsureSchema(kind.to_string()));
        lock(&self.tables).insert(kind.to_string());
        Ok(())
    }

    fn drop_schema(&self, kind: &str) -> Result<(), StorageError> {
        self.record_call(StorageCall::DropSchema(kind.to_string()));
        lock(&self.tables).remove(kind);
        Ok(())
    }

    fn get_summary(&self) -> Result<SummaryMap, StorageError> {
        self.record_call(StorageCall::GetSummary);
        self.check_query()?;
        Ok(SummaryMap::new())
    }

    fn get_resource_rows(&self, kind: &str) -> Result<Vec<ResourceRow>, StorageError> {
        self.record_call(StorageCall::GetResourceRows(kind.to_string()));
        self.check_query()?;
        Ok(Vec::new())
    }
}
