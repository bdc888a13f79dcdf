use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use bytes::Bytes;
use tracing::info;

use super::RouteState;
use crate::{
    file_upload::read_file_upload,
    http_objects::{ApiError, FileUploaded, UploadParams},
};

/// Upload a file to the share directory
///
/// The body is either the raw file or `multipart/form-data`, in which case
/// the first file part is stored.
#[utoipa::path(
    post,
    path = "/files/upload",
    request_body(content = String, content_type = "application/octet-stream"),
    tag = "files",
    params(
        UploadParams,
        ("X-File-Name" = Option<String>, Header, description = "Name to store the file under. Takes precedence over every other name source. Non-UTF-8 bytes are replaced with U+FFFD.")
    ),
    responses(
        (status = 200, description = "File uploaded", body = FileUploaded),
        (status = 400, description = "empty body or malformed multipart"),
        (status = INTERNAL_SERVER_ERROR, description = "Internal Server Error")
    ),
)]
#[tracing::instrument(skip_all)]
pub async fn upload_file(
    State(state): State<RouteState>,
    Query(params): Query<UploadParams>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<FileUploaded>, ApiError> {
    let upload = read_file_upload(&headers, params.file_name.as_deref(), body).await?;

    state
        .file_share
        .create_if_not_exists()
        .await
        .map_err(ApiError::internal_error)?;
    state
        .share_directory
        .create_if_not_exists()
        .await
        .map_err(ApiError::internal_error)?;
    let put_result = state
        .share_directory
        .upload_file(&upload.file_name, upload.data)
        .await
        .map_err(ApiError::internal_error)?;

    info!(
        size_bytes = put_result.size_bytes,
        sha256 = %put_result.sha256_hash,
        e_tag = put_result.e_tag.as_deref(),
        "Uploaded file '{}' to {}/{}",
        upload.file_name,
        state.file_share.name(),
        state.share_directory.name()
    );

    Ok(Json(FileUploaded {
        file_name: upload.file_name,
        message: "Uploaded".to_string(),
    }))
}

/// List the files in the share directory
#[utoipa::path(
    get,
    path = "/files/list",
    tag = "files",
    responses(
        (status = 200, description = "File names"),
        (status = INTERNAL_SERVER_ERROR, description = "Internal Server Error")
    ),
)]
pub async fn list_files(State(state): State<RouteState>) -> Result<Json<Vec<String>>, ApiError> {
    let files = state
        .share_directory
        .list_files()
        .await
        .map_err(ApiError::internal_error)?;
    Ok(Json(files))
}
