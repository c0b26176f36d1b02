//! JSON response writing

use axum::{
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

use crate::error::EncodingError;

/// Build a JSON response with an indented body and `Content-Type: application/json`.
///
/// The status is set exactly once. Encoding errors are returned, not retried.
pub fn write_json<T: Serialize + ?Sized>(
    status: StatusCode,
    data: &T,
) -> Result<Response, EncodingError> {
    let mut body = serde_json::to_vec_pretty(data)?;
    body.push(b'\n');

    Ok((
        status,
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        )],
        body,
    )
        .into_response())
}

/// [`write_json`], logging an encoding failure and answering a bare 500 instead.
pub fn respond<T: Serialize + ?Sized>(status: StatusCode, data: &T) -> Response {
    match write_json(status, data) {
        Ok(response) => response,
        Err(e) => {
            error!(error = %e, status = status.as_u16(), "Failed to encode response");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
