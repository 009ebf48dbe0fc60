use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use tokio_util::io::ReaderStream;

use crate::api::response::ApiError;
use crate::ratelimit::{self, COPY_BUFFER_SIZE};
use crate::AppState;

/// Stream stored bytes by short key, throttled to the configured rate.
/// Route: GET /download/:key
pub async fn download(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Response, ApiError> {
    let (record, mut reader) = state.indexer.download(&key).await?;

    // The copy feeds one end of a pipe and the response body drains the
    // other. A client that goes away drops the body, which fails the
    // copy's next write and ends it.
    let (mut pipe_writer, pipe_reader) = tokio::io::duplex(COPY_BUFFER_SIZE);
    let rate = state.config.default_rate;
    let copy_key = key.clone();
    tokio::spawn(async move {
        match ratelimit::copy(&mut reader, &mut pipe_writer, rate, None).await {
            Ok(bytes) => tracing::debug!(key = %copy_key, bytes, "Download complete"),
            Err(e) if is_disconnect(&e) => {
                tracing::debug!(key = %copy_key, error = %e, "Client went away")
            }
            Err(e) => tracing::warn!(key = %copy_key, error = %e, "Download failed"),
        }
    });

    let body = Body::from_stream(ReaderStream::new(pipe_reader));
    let mut response = (StatusCode::OK, body).into_response();
    let headers = response.headers_mut();

    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    headers.insert(
        header::CONTENT_LENGTH,
        HeaderValue::from(record.size_bytes),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        content_disposition(&record.original_name),
    );

    Ok(response)
}

/// The response body was dropped before the copy finished.
fn is_disconnect(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
    )
}

fn content_disposition(file_name: &str) -> HeaderValue {
    let escaped: String = file_name
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| if c == '"' || c == '\\' { '_' } else { c })
        .collect();

    format!("attachment; filename=\"{escaped}\"")
        .parse()
        .unwrap_or(HeaderValue::from_static("attachment"))
}
