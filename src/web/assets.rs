//! UI bundle and SPA fallback
//!
//! The bundle is loaded into an [`Assets`] value owned by the server rather
//! than process-wide state, so several servers can run side by side.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::{Html, IntoResponse, Response},
};
use rust_embed::Embed;
use tracing::debug;

use super::response::respond;
use super::state::AppState;
use super::types::ErrorResponse;

/// Entry document of the single-page application
pub const INDEX_DOCUMENT: &str = "index.html";

#[derive(Embed)]
#[folder = "ui/build/"]
struct UiBundle;

/// Static files keyed by their path inside the bundle
#[derive(Clone, Default)]
pub struct Assets {
    files: Arc<HashMap<String, Cow<'static, [u8]>>>,
}

impl Assets {
    /// Bundle compiled into the binary from `ui/build/`
    pub fn embedded() -> Self {
        let assets = Self::from_files(
            UiBundle::iter().filter_map(|path| UiBundle::get(&path).map(|file| (path, file.data))),
        );
        debug!(files = assets.len(), "Loaded embedded UI bundle");
        assets
    }

    pub fn from_files<I, P, D>(files: I) -> Self
    where
        I: IntoIterator<Item = (P, D)>,
        P: Into<String>,
        D: Into<Cow<'static, [u8]>>,
    {
        let files = files
            .into_iter()
            .map(|(path, data)| (path.into(), data.into()))
            .collect();
        Self {
            files: Arc::new(files),
        }
    }

    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.files
            .get(path.trim_start_matches('/'))
            .map(|data| data.as_ref())
    }

    pub fn index(&self) -> Option<&[u8]> {
        self.get(INDEX_DOCUMENT)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn index_response(&self) -> Option<Response> {
        self.index()
            .map(|doc| (StatusCode::OK, Html(doc.to_vec())).into_response())
    }
}

pub async fn serve_index(State(state): State<AppState>) -> Response {
    state.assets.index_response().unwrap_or_else(|| {
        respond(
            StatusCode::NOT_FOUND,
            &ErrorResponse::new(StatusCode::NOT_FOUND, "UI bundle not available"),
        )
    })
}

pub async fn serve_static(State(state): State<AppState>, Path(path): Path<String>) -> Response {
    let path = path.trim_start_matches('/');
    match state.assets.get(path) {
        Some(content) => {
            let mime = mime_guess::from_path(path).first_or_octet_stream();
            ([(header::CONTENT_TYPE, mime.as_ref())], content.to_vec()).into_response()
        }
        None => (StatusCode::NOT_FOUND, "Not found").into_response(),
    }
}

/// `/static` and `/static/` name no asset; the SPA fallback decides what they serve
pub async fn static_root() -> Response {
    (StatusCode::NOT_FOUND, "Not found").into_response()
}

/// Rewrite a 404 from the wrapped static handler into the SPA entry document,
/// so client-side routes survive a full page load. Other responses pass through.
pub async fn spa_fallback(State(assets): State<Assets>, request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    if response.status() != StatusCode::NOT_FOUND {
        return response;
    }

    match assets.index_response() {
        Some(index) => index,
        None => response,
    }
}
