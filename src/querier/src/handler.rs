//! Prometheus Remote Read Handler
//!
//! Serves the Prometheus remote_read protocol on top of [`RemoteReadAdapter`].
//!
//! ## Protocol Details
//!
//! - Content-Type: `application/x-protobuf`
//! - Content-Encoding: `snappy` (block format, not framed)
//! - Endpoint: `POST /api/v1/read`
//!
//! Only the sampled response type is produced; streamed chunks are not.

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use common::prompb::{
    CodecError, PROTOBUF_CONTENT_TYPE, SNAPPY_CONTENT_ENCODING, decode_read_request,
    encode_read_response,
};
use tower_http::trace::TraceLayer;

use crate::adapter::RemoteReadAdapter;
use crate::error::QueryError;

pub const READ_PATH: &str = "/api/v1/read";
pub const HEALTH_PATH: &str = "/health";

/// Shared state for the remote read handler
#[derive(Clone)]
pub struct RemoteReadState {
    pub adapter: RemoteReadAdapter,
}

/// Router serving remote read and a health probe
pub fn remote_read_router(adapter: RemoteReadAdapter) -> Router {
    Router::new()
        .route(READ_PATH, post(handle_remote_read))
        .route(HEALTH_PATH, get(|| async { "OK" }))
        .layer(TraceLayer::new_for_http())
        .with_state(RemoteReadState { adapter })
}

/// Errors that can occur while serving a remote read request
#[derive(Debug, thiserror::Error)]
pub enum RemoteReadError {
    #[error("Decode error: {0}")]
    Decode(#[source] CodecError),
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error("Encode error: {0}")]
    Encode(#[source] CodecError),
}

impl IntoResponse for RemoteReadError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Decode(_) => StatusCode::BAD_REQUEST,
            Self::Query(e) if e.is_backend_error() => StatusCode::BAD_GATEWAY,
            Self::Query(_) => StatusCode::BAD_REQUEST,
            Self::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, self.to_string()).into_response()
    }
}

/// Axum handler for POST /api/v1/read
pub async fn handle_remote_read(
    State(state): State<RemoteReadState>,
    body: Bytes,
) -> Result<Response, RemoteReadError> {
    tracing::debug!(body_size = body.len(), "Handling Prometheus remote_read request");

    let request = decode_read_request(&body).map_err(|e| {
        tracing::error!(error = ?e, "Failed to decode Prometheus remote_read");
        RemoteReadError::Decode(e)
    })?;

    let response = state.adapter.read(&request).await?;

    let encoded = encode_read_response(&response).map_err(|e| {
        tracing::error!(error = ?e, "Failed to encode remote_read response");
        RemoteReadError::Encode(e)
    })?;

    Ok((
        [
            (header::CONTENT_TYPE, PROTOBUF_CONTENT_TYPE),
            (header::CONTENT_ENCODING, SNAPPY_CONTENT_ENCODING),
        ],
        encoded,
    )
        .into_response())
}
