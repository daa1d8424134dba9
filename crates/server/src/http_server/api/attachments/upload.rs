//! Content-addressed upload.
//!
//! The path arrives as the URL segment; the client may declare the hash and
//! length it computed so the server can refuse corrupted transfers before
//! touching storage. Identical bytes under an id already present collapse
//! into an `unchanged` reply without a second object write.

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::HeaderMap;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use common::paths::{self, PathError};
use common::protocol::UploadResponse;

use crate::blobs::BlobsError;
use crate::http_server::api::VaultQuery;

use super::{MAX_ATTACHMENT_BYTES, X_CONTENT_HASH, X_CONTENT_LENGTH};

pub async fn handler(
    State(state): State<crate::State>,
    Path(path): Path<String>,
    Query(query): Query<VaultQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, UploadError> {
    let vault_id = query.vault_id();

    paths::validate_attachment_path(&path)?;

    if body.len() > MAX_ATTACHMENT_BYTES {
        return Err(UploadError::TooLarge(body.len()));
    }

    let hash = hex::encode(Sha256::digest(&body));

    if let Some(declared) = header_str(&headers, X_CONTENT_HASH) {
        if !declared.eq_ignore_ascii_case(&hash) {
            return Err(UploadError::HashMismatch {
                declared: declared.to_owned(),
                actual: hash,
            });
        }
    }
    if let Some(declared) = header_str(&headers, X_CONTENT_LENGTH) {
        let declared: usize = declared
            .parse()
            .map_err(|_| UploadError::LengthMismatch {
                declared: declared.to_owned(),
                actual: body.len(),
            })?;
        if declared != body.len() {
            return Err(UploadError::LengthMismatch {
                declared: declared.to_string(),
                actual: body.len(),
            });
        }
    }

    let content_type = header_str(&headers, CONTENT_TYPE.as_str())
        .map(str::to_owned)
        .unwrap_or_else(|| {
            mime_guess::from_path(&path)
                .first_or_octet_stream()
                .to_string()
        });

    let ext = paths::file_ext(&path);
    let id = paths::attachment_id(vault_id, &hash, ext);
    let object_key = paths::attachment_object_key(vault_id, &hash, ext);

    if let Some(existing) = state.database().get_attachment(&id, vault_id).await? {
        if !existing.deleted {
            debug!(id = %id, "identical attachment already stored");
            return Ok(Json(UploadResponse {
                ok: true,
                id,
                hash: existing.hash,
                size: existing.size,
                content_type: existing.content_type,
                unchanged: Some(true),
            })
            .into_response());
        }
    }

    let size = body.len() as i64;
    state.blobs().put(&object_key, body).await?;
    state
        .database()
        .upsert_attachment(&id, vault_id, &path, &content_type, size, &hash, &object_key)
        .await?;

    info!(id = %id, size, "attachment stored");

    Ok(Json(UploadResponse {
        ok: true,
        id,
        hash,
        size,
        content_type,
        unchanged: None,
    })
    .into_response())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("invalid attachment path: {0}")]
    BadPath(#[from] PathError),
    #[error("declared hash {declared} does not match content hash {actual}")]
    HashMismatch { declared: String, actual: String },
    #[error("declared length {declared} does not match content length {actual}")]
    LengthMismatch { declared: String, actual: usize },
    #[error("attachment exceeds size limit: {0} bytes")]
    TooLarge(usize),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("blob store error: {0}")]
    Blobs(#[from] BlobsError),
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        let status = match &self {
            UploadError::BadPath(_) | UploadError::LengthMismatch { .. } => {
                http::StatusCode::BAD_REQUEST
            }
            UploadError::HashMismatch { .. } => http::StatusCode::CONFLICT,
            UploadError::TooLarge(_) => http::StatusCode::PAYLOAD_TOO_LARGE,
            UploadError::Database(_) | UploadError::Blobs(_) => {
                http::StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, format!("{self}")).into_response()
    }
}
