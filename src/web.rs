//! Web layer for the resource viewer
//!
//! This module provides the HTTP server, its lifecycle and the API endpoints.
//!
//! # Module Structure
//! - `server`: Construction and endpoint binding
//! - `lifecycle`: Accept loop, graceful drain and the stop handle
//! - `handlers`: HTTP request handlers
//! - `assets`: UI bundle and SPA fallback
//! - `cors`: Cross-origin policy
//! - `response`: JSON response writing
//! - `state`: Application state
//! - `types`: Response types

mod assets;
mod cors;
mod handlers;
mod lifecycle;
mod response;
mod server;
mod state;
mod types;

// Re-export public types
pub use assets::{Assets, INDEX_DOCUMENT};
pub use cors::AllowedOrigins;
pub use lifecycle::{LifecycleState, ShutdownOutcome, StopHandle};
pub use response::{respond, write_json};
pub use server::{DRAIN_TIMEOUT, Server, ServerSettings};
pub use state::AppState;
pub use types::{ErrorResponse, HealthResponse};

use utoipa::OpenApi;

use crate::storage::Summary;

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Resource Viewer API",
        description = "Read-only query API over collected cloud resource data",
        version = env!("CARGO_PKG_VERSION"),
        license(name = "MIT")
    ),
    paths(handlers::health, handlers::get_summary, handlers::get_resource_rows),
    components(schemas(HealthResponse, ErrorResponse, Summary)),
    tags(
        (name = "Health", description = "Liveness endpoint"),
        (name = "Summary", description = "Aggregated view across resource types"),
        (name = "Resources", description = "Collected rows per resource type"),
    )
)]
pub struct ApiDoc;
