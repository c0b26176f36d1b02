//! Server construction and endpoint binding

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{Router, middleware, routing::get};
use tokio::net::TcpListener;
use tracing::{debug, info};

use crate::error::ServerError;
use crate::storage::Storage;

use super::assets::{Assets, serve_index, serve_static, spa_fallback, static_root};
use super::cors::AllowedOrigins;
use super::handlers::{get_resource_rows, get_summary, health, not_found, serve_openapi};
use super::lifecycle::{self, Lifecycle, LifecycleState, StopHandle};
use super::state::AppState;

/// How long in-flight requests may run after a stop before they are force-closed
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Port to bind on all interfaces; 0 picks a free port
    pub port: u16,
    pub allowed_origins: AllowedOrigins,
    pub drain_timeout: Duration,
}

impl ServerSettings {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            allowed_origins: AllowedOrigins::Any,
            drain_timeout: DRAIN_TIMEOUT,
        }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}

/// Read-only API and UI server
pub struct Server {
    settings: ServerSettings,
    state: AppState,
    routes: Option<Router<AppState>>,
    lifecycle: Arc<Lifecycle>,
}

impl Server {
    /// Configure the server. No socket is opened until [`Server::serve`].
    pub fn new(settings: ServerSettings, storage: Arc<dyn Storage>, assets: Assets) -> Self {
        Self {
            settings,
            state: AppState { storage, assets },
            routes: None,
            lifecycle: Arc::new(Lifecycle::default()),
        }
    }

    pub fn settings(&self) -> &ServerSettings {
        &self.settings
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.current()
    }

    /// Register every route. Calling it again has no effect.
    pub fn bind_endpoints(&mut self) {
        if self.routes.is_some() {
            debug!("Endpoints already bound");
            return;
        }

        let static_routes = Router::new()
            .route("/static", get(static_root))
            .route("/static/", get(static_root))
            .route("/static/{*path}", get(serve_static))
            .route_layer(middleware::from_fn_with_state(
                self.state.assets.clone(),
                spa_fallback,
            ));

        let routes = Router::new()
            .route("/api/v1/health", get(health))
            .route("/api/v1/summary", get(get_summary))
            .route("/api/v1/resources/{type}", get(get_resource_rows))
            .route("/api-docs/openapi.json", get(serve_openapi))
            .route("/", get(serve_index))
            .merge(static_routes)
            .fallback(not_found);

        self.routes = Some(routes);
    }

    /// The router with CORS applied. Empty until endpoints are bound.
    pub fn router(&self) -> Router {
        self.routes
            .clone()
            .unwrap_or_else(Router::new)
            .layer(self.settings.allowed_origins.layer())
            .with_state(self.state.clone())
    }

    /// Bind the listener and start serving in the background.
    ///
    /// Consumes the server, so a stopped server cannot be restarted.
    pub async fn serve(mut self) -> Result<StopHandle, ServerError> {
        self.bind_endpoints();

        let addr = self.settings.bind_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        self.lifecycle.advance(LifecycleState::Serving);
        let handle = lifecycle::spawn(
            listener,
            self.router(),
            self.settings.drain_timeout,
            self.lifecycle.clone(),
        );

        info!(
            addr = %handle.local_addr(),
            drain_timeout_secs = self.settings.drain_timeout.as_secs(),
            "Server listening"
        );
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use crate::storage::{MemoryStorage, Record, ResourceRow, StorageCall, SummaryMap};
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_assets() -> Assets {
        Assets::from_files([
            ("index.html", &b"<html>spa</html>"[..]),
            ("js/app.js", &b"console.log('app')"[..]),
        ])
    }

    fn test_server(storage: Arc<MemoryStorage>) -> Server {
        test_server_with(storage)
    }

    fn test_server_with(storage: Arc<dyn Storage>) -> Server {
        let mut server = Server::new(ServerSettings::new(0), storage, test_assets());
        server.bind_endpoints();
        server
    }

    /// Storage whose queries panic inside the blocking task
    struct PanickingStorage;

    impl Storage for PanickingStorage {
        fn create(&self, _record: &Record) -> Result<(), StorageError> {
            Ok(())
        }

        fn ensure_schema(&self, _kind: &str) -> Result<(), StorageError> {
            Ok(())
        }

        fn drop_schema(&self, _kind: &str) -> Result<(), StorageError> {
            Ok(())
        }

        fn get_summary(&self) -> Result<SummaryMap, StorageError> {
            panic!("summary query crashed");
        }

        fn get_resource_rows(&self, _kind: &str) -> Result<Vec<ResourceRow>, StorageError> {
            panic!("row query crashed");
        }
    }

    async fn send_get(server: &Server, uri: &str) -> (StatusCode, Option<String>, Vec<u8>) {
        let response = server
            .router()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, content_type, body.to_vec())
    }

    fn json(body: &[u8]) -> serde_json::Value {
        serde_json::from_slice(body).expect("body is JSON")
    }

    #[tokio::test]
    async fn health_returns_ok_without_storage_calls() {
        let storage = Arc::new(MemoryStorage::new());
        let server = test_server(storage.clone());

        let (status, content_type, body) = send_get(&server, "/api/v1/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type.as_deref(), Some("application/json"));
        assert_eq!(json(&body)["status"], "ok");
        assert!(storage.calls().is_empty());
    }

    #[tokio::test]
    async fn summary_returns_empty_map() {
        let storage = Arc::new(MemoryStorage::new());
        let server = test_server(storage.clone());

        let (status, _, body) = send_get(&server, "/api/v1/summary").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json(&body), serde_json::json!({}));
        assert_eq!(storage.calls(), vec![StorageCall::GetSummary]);
    }

    #[tokio::test]
    async fn summary_storage_failure_returns_500_envelope() {
        let storage = Arc::new(MemoryStorage::with_query_failure("connection refused"));
        let server = test_server(storage);

        let (status, content_type, body) = send_get(&server, "/api/v1/summary").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(content_type.as_deref(), Some("application/json"));
        let body = json(&body);
        assert_eq!(body["status"], 500);
        // Underlying cause stays in the logs
        assert_eq!(body["message"], "Failed to fetch summary");
    }

    #[tokio::test]
    async fn resources_for_empty_kind_returns_empty_array() {
        let storage = Arc::new(MemoryStorage::new());
        let server = test_server(storage.clone());

        let (status, _, body) = send_get(&server, "/api/v1/resources/ec2").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json(&body), serde_json::json!([]));
        assert_eq!(
            storage.calls(),
            vec![StorageCall::GetResourceRows("ec2".to_string())]
        );
    }

    #[tokio::test]
    async fn resources_storage_failure_returns_500() {
        let storage = Arc::new(MemoryStorage::with_query_failure("boom"));
        let server = test_server(storage);

        let (status, _, body) = send_get(&server, "/api/v1/resources/ec2").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json(&body)["status"], 500);
    }

    #[tokio::test]
    async fn panicking_storage_query_returns_500_envelope() {
        let server = test_server_with(Arc::new(PanickingStorage));

        for uri in ["/api/v1/summary", "/api/v1/resources/ec2"] {
            let (status, content_type, body) = send_get(&server, uri).await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{uri}");
            assert_eq!(content_type.as_deref(), Some("application/json"));
            assert_eq!(json(&body)["status"], 500);
        }

        let (status, _, _) = send_get(&server, "/api/v1/health").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_api_route_returns_json_404() {
        let storage = Arc::new(MemoryStorage::new());
        let server = test_server(storage.clone());

        let (status, content_type, body) = send_get(&server, "/api/v1/unknown").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(content_type.as_deref(), Some("application/json"));
        assert_eq!(json(&body)["status"], 404);
        assert!(storage.calls().is_empty());
    }

    #[tokio::test]
    async fn static_asset_passes_through() {
        let server = test_server(Arc::new(MemoryStorage::new()));

        let (status, content_type, body) = send_get(&server, "/static/js/app.js").await;

        assert_eq!(status, StatusCode::OK);
        assert!(content_type.unwrap_or_default().ends_with("javascript"));
        assert_eq!(body, b"console.log('app')");
    }

    #[tokio::test]
    async fn missing_static_asset_serves_spa_document() {
        let server = test_server(Arc::new(MemoryStorage::new()));

        let (status, content_type, body) = send_get(&server, "/static/reports/ec2").await;

        assert_eq!(status, StatusCode::OK);
        assert!(content_type.unwrap_or_default().starts_with("text/html"));
        assert_eq!(body, b"<html>spa</html>");
    }

    #[tokio::test]
    async fn static_prefix_without_path_serves_spa_document() {
        let server = test_server(Arc::new(MemoryStorage::new()));

        for uri in ["/static", "/static/"] {
            let (status, content_type, body) = send_get(&server, uri).await;
            assert_eq!(status, StatusCode::OK, "{uri}");
            assert!(content_type.unwrap_or_default().starts_with("text/html"));
            assert_eq!(body, b"<html>spa</html>");
        }
    }

    #[tokio::test]
    async fn missing_static_asset_without_bundle_stays_404() {
        let mut server = Server::new(
            ServerSettings::new(0),
            Arc::new(MemoryStorage::new()),
            Assets::default(),
        );
        server.bind_endpoints();

        let (status, _, _) = send_get(&server, "/static/app.js").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn root_serves_spa_document() {
        let server = test_server(Arc::new(MemoryStorage::new()));

        let (status, _, body) = send_get(&server, "/").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"<html>spa</html>");
    }

    #[tokio::test]
    async fn openapi_document_lists_endpoints() {
        let server = test_server(Arc::new(MemoryStorage::new()));

        let (status, _, body) = send_get(&server, "/api-docs/openapi.json").await;

        assert_eq!(status, StatusCode::OK);
        let doc = json(&body);
        assert!(doc["paths"]["/api/v1/health"].is_object());
        assert!(doc["paths"]["/api/v1/resources/{type}"].is_object());
    }

    #[tokio::test]
    async fn cors_allows_configured_origin() {
        let mut settings = ServerSettings::new(0);
        settings.allowed_origins =
            AllowedOrigins::parse(&["https://ui.example"]).expect("valid origin");
        let mut server = Server::new(settings, Arc::new(MemoryStorage::new()), test_assets());
        server.bind_endpoints();

        let response = server
            .router()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/health")
                    .header(header::ORIGIN, "https://ui.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://ui.example"
        );
    }

    #[tokio::test]
    async fn bind_endpoints_twice_is_noop() {
        let storage = Arc::new(MemoryStorage::new());
        let mut server = test_server(storage);
        server.bind_endpoints();

        let (status, _, _) = send_get(&server, "/api/v1/health").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[test]
    fn new_server_is_created_state() {
        let server = Server::new(
            ServerSettings::new(0),
            Arc::new(MemoryStorage::new()),
            Assets::default(),
        );
        assert_eq!(server.state(), LifecycleState::Created);
        assert_eq!(server.settings().drain_timeout, DRAIN_TIMEOUT);
        assert_eq!(server.settings().bind_addr().to_string(), "0.0.0.0:0");
    }
}
