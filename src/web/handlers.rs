//! HTTP request handlers for API endpoints

use axum::{
    extract::{OriginalUri, Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use tracing::{debug, error};
use utoipa::OpenApi;

use super::ApiDoc;
use super::response::respond;
use super::state::AppState;
use super::types::{ErrorResponse, HealthResponse};

/// Liveness check; never touches storage
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse)
    )
)]
pub async fn health() -> Response {
    respond(StatusCode::OK, &HealthResponse::ok())
}

/// Aggregated summary across all resource types
#[utoipa::path(
    get,
    path = "/api/v1/summary",
    tag = "Summary",
    responses(
        (status = 200, description = "Summary keyed by resource type"),
        (status = 500, description = "Storage failure", body = ErrorResponse)
    )
)]
pub async fn get_summary(State(state): State<AppState>) -> Response {
    let storage = state.storage.clone();
    match tokio::task::spawn_blocking(move || storage.get_summary()).await {
        Ok(Ok(summary)) => respond(StatusCode::OK, &summary),
        Ok(Err(e)) => {
            error!(error = %e, "Failed to fetch summary");
            internal_error("Failed to fetch summary")
        }
        Err(e) => {
            error!(error = %e, "Summary query task failed");
            internal_error("Failed to fetch summary")
        }
    }
}

/// Rows collected for one resource type
#[utoipa::path(
    get,
    path = "/api/v1/resources/{type}",
    tag = "Resources",
    params(
        ("type" = String, Path, description = "Resource type, for example ec2")
    ),
    responses(
        (status = 200, description = "Collected rows, empty when none"),
        (status = 500, description = "Storage failure", body = ErrorResponse)
    )
)]
pub async fn get_resource_rows(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> Response {
    let storage = state.storage.clone();
    let query_kind = kind.clone();
    match tokio::task::spawn_blocking(move || storage.get_resource_rows(&query_kind)).await {
        Ok(Ok(rows)) => {
            debug!(kind = %kind, rows = rows.len(), "Resource rows fetched");
            respond(StatusCode::OK, &rows)
        }
        Ok(Err(e)) => {
            error!(error = %e, kind = %kind, "Failed to fetch resource rows");
            internal_error("Failed to fetch resource data")
        }
        Err(e) => {
            error!(error = %e, kind = %kind, "Resource query task failed");
            internal_error("Failed to fetch resource data")
        }
    }
}

/// Fallback for every route the router does not know
pub async fn not_found(OriginalUri(uri): OriginalUri) -> Response {
    debug!(path = %uri.path(), "Route not found");
    respond(
        StatusCode::NOT_FOUND,
        &ErrorResponse::new(StatusCode::NOT_FOUND, "Route not found"),
    )
}

pub async fn serve_openapi() -> Response {
    match ApiDoc::openapi().to_pretty_json() {
        Ok(doc) => ([(header::CONTENT_TYPE, "application/json")], doc).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to render OpenAPI document");
            internal_error("Failed to render OpenAPI document")
        }
    }
}

fn internal_error(message: &str) -> Response {
    respond(
        StatusCode::INTERNAL_SERVER_ERROR,
        &ErrorResponse::new(StatusCode::INTERNAL_SERVER_ERROR, message),
    )
}
