//! Cross-origin policy

use axum::http::{HeaderValue, Method, header};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::error::ServerError;

/// Origins allowed to call the API from a browser
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AllowedOrigins {
    #[default]
    Any,
    List(Vec<HeaderValue>),
}

impl AllowedOrigins {
    /// Parse configured origins. `*` anywhere in the list (or an empty list) allows all origins.
    pub fn parse<S: AsRef<str>>(origins: &[S]) -> Result<Self, ServerError> {
        let origins: Vec<&str> = origins
            .iter()
            .map(|o| o.as_ref().trim())
            .filter(|o| !o.is_empty())
            .collect();

        if origins.is_empty() || origins.contains(&"*") {
            return Ok(Self::Any);
        }

        origins
            .into_iter()
            .map(|o| {
                HeaderValue::from_str(o).map_err(|_| ServerError::InvalidOrigin(o.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self::List)
    }

    /// Read-only API: only GET is allowed cross-origin.
    pub fn layer(&self) -> CorsLayer {
        let cors = CorsLayer::new()
            .allow_methods([Method::GET])
            .allow_headers([header::CONTENT_TYPE]);

        match self {
            Self::Any => cors.allow_origin(Any),
            Self::List(origins) => cors.allow_origin(AllowOrigin::list(origins.clone())),
        }
    }
}
