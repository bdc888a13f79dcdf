use axum::{extract::State, Json};
use bytes::Bytes;
use tracing::info;
use uuid::Uuid;

use super::RouteState;
use crate::http_objects::ApiError;

/// Upload the request body as a new blob
#[utoipa::path(
    post,
    path = "/api/UploadBlob",
    tag = "blobs",
    request_body(content = String, content_type = "application/octet-stream"),
    responses(
        (status = 200, description = "Blob uploaded: <name>", body = String),
        (status = INTERNAL_SERVER_ERROR, description = "Internal Server Error")
    ),
)]
#[tracing::instrument(skip_all)]
pub async fn upload_blob(
    State(state): State<RouteState>,
    body: Bytes,
) -> Result<String, ApiError> {
    let blob_name = format!("file-{}.txt", Uuid::new_v4());
    let put_result = state
        .blob_storage
        .upload(&blob_name, body)
        .await
        .map_err(ApiError::internal_error)?;

    info!(
        container = state.blob_storage.container_name(),
        size_bytes = put_result.size_bytes,
        sha256 = %put_result.sha256_hash,
        "Blob {} uploaded.",
        blob_name
    );

    Ok(format!("Blob uploaded: {}", blob_name))
}

/// List the blobs in the upload container
#[utoipa::path(
    get,
    path = "/api/ListBlobs",
    tag = "blobs",
    responses(
        (status = 200, description = "Blob names"),
        (status = INTERNAL_SERVER_ERROR, description = "Internal Server Error")
    ),
)]
pub async fn list_blobs(State(state): State<RouteState>) -> Result<Json<Vec<String>>, ApiError> {
    let blobs = state
        .blob_storage
        .list_blobs()
        .await
        .map_err(ApiError::internal_error)?;
    Ok(Json(blobs))
}
