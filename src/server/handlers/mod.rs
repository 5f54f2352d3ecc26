//! HTTP handlers and the error-to-status mapping.

pub mod linked_data;
pub mod navigation;
pub mod root;

use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::Request;
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;
use tracing::Instrument;

use crate::error::Error;

/// The single place error kinds become HTTP statuses. The body is a
/// small `{code, message}` object; stack traces stay in the logs.
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::RemoteTimeout => StatusCode::GATEWAY_TIMEOUT,
            Error::DatabaseUnavailable(_)
            | Error::RemoteService { .. }
            | Error::Geometry(_)
            | Error::Configuration(_)
            | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(kind = self.code(), "{self}");
        } else {
            tracing::warn!(kind = self.code(), "{self}");
        }
        (
            status,
            Json(json!({ "code": self.code(), "message": self.to_string() })),
        )
            .into_response()
    }
}

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Attach a request id and path to the tracing span so error logs can be
/// correlated without repeating the context at every call site.
pub async fn request_context(request: Request, next: Next) -> Response {
    let id = NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed);
    let span = tracing::info_span!("request", id, path = %request.uri().path());
    next.run(request).instrument(span).await
}

/// Serialise a JSON body honouring the pretty-print setting.
pub fn json_body<T: Serialize>(pretty: bool, value: &T) -> Response {
    let body = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    match body {
        Ok(body) => (
            [(header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response(),
        Err(err) => Error::Internal(format!("response serialisation failed: {err}")).into_response(),
    }
}
