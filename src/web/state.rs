//! Application state shared across handlers

use std::sync::Arc;

use crate::storage::Storage;

use super::assets::Assets;

/// Shared read-only by every request task; never mutated after construction.
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub assets: Assets,
}
