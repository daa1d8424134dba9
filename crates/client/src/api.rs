//! Typed API client over the retry transport.
//!
//! Doc ids and attachment paths go into URL path segments, so they are
//! percent-encoded segment-wise (slashes included); the server decodes them
//! back before use.

use reqwest::StatusCode;
use thiserror::Error;
use url::Url;

use common::protocol::{
    AttachmentChangesResponse, BulkDocInput, BulkDocResult, BulkDocsRequest, ChangesResponse,
    DocBody, PutDocRequest, PutDocResponse, StatusResponse, UploadResponse,
};

use crate::transport::{Transport, TransportError};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("server returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("response body invalid: {0}")]
    Decode(#[source] reqwest::Error),
    #[error("invalid server URL: {0}")]
    BadUrl(String),
}

impl ApiError {
    /// 401/403: a configuration problem, not something to retry or count
    /// per-file.
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            ApiError::Status {
                status: StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN,
                ..
            }
        )
    }
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    transport: Transport,
    base: Url,
    api_key: String,
    vault_id: String,
}

impl ApiClient {
    pub fn new(
        transport: Transport,
        server_url: &str,
        api_key: &str,
        vault_id: &str,
    ) -> Result<Self, ApiError> {
        let base = Url::parse(server_url).map_err(|e| ApiError::BadUrl(e.to_string()))?;
        Ok(Self {
            transport,
            base,
            api_key: api_key.to_owned(),
            vault_id: vault_id.to_owned(),
        })
    }

    pub fn vault_id(&self) -> &str {
        &self.vault_id
    }

    /// `{base}/{prefix}/{segment}` with the segment percent-encoded as one
    /// path component.
    fn segment_url(&self, prefix: &str, segment: &str) -> Result<Url, ApiError> {
        let mut url = self
            .base
            .join(prefix)
            .map_err(|e| ApiError::BadUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| ApiError::BadUrl("server URL cannot be a base".to_owned()))?
            .push(segment);
        Ok(url)
    }

    fn plain_url(&self, path: &str) -> Result<Url, ApiError> {
        self.base
            .join(path)
            .map_err(|e| ApiError::BadUrl(e.to_string()))
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let status = response.status();
        if status.is_success() {
            response.json().await.map_err(ApiError::Decode)
        } else {
            Err(ApiError::Status {
                status,
                body: response.text().await.unwrap_or_default(),
            })
        }
    }

    pub async fn status(&self) -> Result<StatusResponse, ApiError> {
        let url = self.plain_url("/api/status")?;
        let response = self
            .transport
            .execute(|client| {
                client
                    .get(url.clone())
                    .query(&[("vault_id", &self.vault_id)])
                    .bearer_auth(&self.api_key)
            })
            .await?;
        Self::decode(response).await
    }

    pub async fn changes(&self, since: i64, limit: i64) -> Result<ChangesResponse, ApiError> {
        let url = self.plain_url("/api/changes")?;
        let response = self
            .transport
            .execute(|client| {
                client
                    .get(url.clone())
                    .query(&[
                        ("since", since.to_string()),
                        ("limit", limit.to_string()),
                        ("vault_id", self.vault_id.clone()),
                    ])
                    .bearer_auth(&self.api_key)
            })
            .await?;
        Self::decode(response).await
    }

    /// `None` on 404.
    pub async fn get_doc(&self, id: &str) -> Result<Option<DocBody>, ApiError> {
        let url = self.segment_url("/api/docs", id)?;
        let response = self
            .transport
            .execute(|client| {
                client
                    .get(url.clone())
                    .query(&[("vault_id", &self.vault_id)])
                    .bearer_auth(&self.api_key)
            })
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Self::decode(response).await.map(Some)
    }

    pub async fn put_doc(
        &self,
        id: &str,
        rev: Option<&str>,
        content: &str,
    ) -> Result<PutDocResponse, ApiError> {
        let url = self.segment_url("/api/docs", id)?;
        let body = PutDocRequest {
            rev: rev.map(str::to_owned),
            content: Some(content.to_owned()),
        };
        let response = self
            .transport
            .execute(|client| {
                client
                    .put(url.clone())
                    .query(&[("vault_id", &self.vault_id)])
                    .bearer_auth(&self.api_key)
                    .json(&body)
            })
            .await?;
        Self::decode(response).await
    }

    pub async fn bulk_docs(&self, docs: &[BulkDocInput]) -> Result<Vec<BulkDocResult>, ApiError> {
        let url = self.plain_url("/api/docs/bulk_docs")?;
        let body = BulkDocsRequest {
            docs: docs.to_vec(),
        };
        let response = self
            .transport
            .execute(|client| {
                client
                    .post(url.clone())
                    .query(&[("vault_id", &self.vault_id)])
                    .bearer_auth(&self.api_key)
                    .json(&body)
            })
            .await?;
        Self::decode(response).await
    }

    pub async fn attachment_changes(
        &self,
        since: i64,
        limit: i64,
    ) -> Result<AttachmentChangesResponse, ApiError> {
        let url = self.plain_url("/api/attachments/changes")?;
        let response = self
            .transport
            .execute(|client| {
                client
                    .get(url.clone())
                    .query(&[
                        ("since", since.to_string()),
                        ("limit", limit.to_string()),
                        ("vault_id", self.vault_id.clone()),
                    ])
                    .bearer_auth(&self.api_key)
            })
            .await?;
        Self::decode(response).await
    }

    pub async fn upload_attachment(
        &self,
        path: &str,
        content_type: &str,
        hash: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadResponse, ApiError> {
        let url = self.segment_url("/api/attachments", path)?;
        let length = bytes.len();
        let response = self
            .transport
            .execute(|client| {
                client
                    .put(url.clone())
                    .query(&[("vault_id", &self.vault_id)])
                    .bearer_auth(&self.api_key)
                    .header("Content-Type", content_type)
                    .header("X-Content-Hash", hash)
                    .header("X-Content-Length", length.to_string())
                    .body(bytes.clone())
            })
            .await?;
        Self::decode(response).await
    }

    /// Public URL a document can embed for an uploaded attachment.
    pub fn attachment_url(&self, id: &str) -> String {
        match self.segment_url("/api/attachments", id) {
            Ok(mut url) => {
                if let Ok(mut segments) = url.path_segments_mut() {
                    segments.push("content");
                }
                url.query_pairs_mut()
                    .append_pair("vault_id", &self.vault_id);
                url.to_string()
            }
            Err(_) => String::new(),
        }
    }
}
