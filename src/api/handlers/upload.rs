use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::Json;
use bytes::Bytes;
use std::sync::Arc;

use crate::api::response::{ApiError, Envelope};
use crate::indexer::UploadRequest;
use crate::AppState;

const UPLOAD_FORM: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
	<meta charset="UTF-8">
	<title>Upload a file</title>
</head>
<body>
<form action="/upload" method="post" enctype="multipart/form-data">
	<label>Project (required):
		<input type="text" name="project"/>
	</label>
	<label>Module (optional):
		<input type="text" name="module"/>
	</label>
	<input type="file" name="file"/>
	<input type="submit" value="Upload"/>
</form>
</body>
</html>"#;

/// Route: GET /upload.html
pub async fn upload_form() -> Html<&'static str> {
    Html(UPLOAD_FORM)
}

/// Store a multipart upload and answer with its short key.
/// Route: POST /upload
pub async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<Envelope<String>>, ApiError> {
    let max_upload_size = state.config.max_upload_size;

    let mut project: Option<String> = None;
    let mut module: Option<String> = None;
    let mut file_name: Option<String> = None;
    let mut file_data: Option<Bytes> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_upload_size))?
    {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            "project" => {
                project = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| multipart_error(e, max_upload_size))?,
                );
            }
            "module" => {
                module = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| multipart_error(e, max_upload_size))?,
                );
            }
            "file" => {
                file_name = field.file_name().map(|s| s.to_string());

                let data = field
                    .bytes()
                    .await
                    .map_err(|e| multipart_error(e, max_upload_size))?;

                if data.len() as u64 > max_upload_size {
                    return Err(ApiError::size_limit(max_upload_size));
                }
                file_data = Some(data);
            }
            _ => {
                // Ignore unknown fields
            }
        }
    }

    let project = project
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::invalid_argument("project must not be empty"))?;
    let data = file_data.ok_or_else(|| ApiError::invalid_argument("file field is required"))?;
    let file_name = file_name
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ApiError::invalid_argument("file must carry a file name"))?;

    let key = state
        .indexer
        .upload(UploadRequest {
            project,
            module: module.filter(|m| !m.is_empty()),
            file_name,
            data,
            rename: state.config.storage.rename,
        })
        .await?;

    Ok(Envelope::success(key))
}

fn multipart_error(e: MultipartError, max_upload_size: u64) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::size_limit(max_upload_size)
    } else {
        ApiError::invalid_argument(format!("Invalid multipart data: {}", e.body_text()))
    }
}
