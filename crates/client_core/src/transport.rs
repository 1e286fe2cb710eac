//! `RetrievalBackend` over HTTP.

use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client, Response,
};
use serde::de::DeserializeOwned;
use shared::{
    domain::DocumentId,
    error::extract_error_message,
    protocol::{
        ChatRequest, ChatResponse, DocumentListResponse, DocumentSummary, SummarizeRequest,
        SummaryResponse, UploadResponse,
    },
};
use tracing::debug;
use url::Url;

use crate::{busy::Operation, error::BackendError, RetrievalBackend};

#[derive(Clone)]
pub struct HttpBackend {
    http: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> Result<Self, BackendError> {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(http: Client, base_url: &str) -> Result<Self, BackendError> {
        Ok(Self {
            http,
            base_url: normalize_base_url(base_url)?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// `{base}/{route}/{document_id}` with the id percent-encoded as a
    /// single path segment.
    fn document_endpoint(
        &self,
        route: &str,
        document_id: &DocumentId,
    ) -> Result<Url, BackendError> {
        let invalid = |reason: String| BackendError::InvalidBaseUrl {
            url: self.base_url.clone(),
            reason,
        };
        let mut url = Url::parse(&self.endpoint(route)).map_err(|err| invalid(err.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| invalid("base url cannot carry path segments".to_string()))?
            .push(document_id.as_str());
        Ok(url)
    }
}

/// Validates an http(s) base address and strips trailing slashes.
pub fn normalize_base_url(raw: &str) -> Result<String, BackendError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let parsed = Url::parse(trimmed).map_err(|err| BackendError::InvalidBaseUrl {
        url: raw.to_string(),
        reason: err.to_string(),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(BackendError::InvalidBaseUrl {
            url: raw.to_string(),
            reason: "scheme must be http or https".to_string(),
        });
    }
    Ok(trimmed.to_string())
}

async fn read_body(operation: Operation, response: Response) -> Result<Vec<u8>, BackendError> {
    let status = response.status();
    let body = response
        .bytes()
        .await
        .map_err(|err| BackendError::transport(operation, &err))?;
    if !status.is_success() {
        debug!(
            operation = operation.as_str(),
            status = status.as_u16(),
            "backend: non-success status"
        );
        return Err(BackendError::Application {
            operation,
            status: status.as_u16(),
            message: extract_error_message(&body, operation.failure_label()),
        });
    }
    Ok(body.to_vec())
}

async fn read_json<T: DeserializeOwned>(
    operation: Operation,
    response: Response,
) -> Result<T, BackendError> {
    let body = read_body(operation, response).await?;
    serde_json::from_slice(&body).map_err(|err| BackendError::Decode {
        operation,
        message: err.to_string(),
    })
}

#[async_trait]
impl RetrievalBackend for HttpBackend {
    async fn list_documents(&self) -> Result<Vec<DocumentSummary>, BackendError> {
        let operation = Operation::ListDocuments;
        let response = self
            .http
            .get(self.endpoint("documents"))
            .send()
            .await
            .map_err(|err| BackendError::transport(operation, &err))?;
        let listing: DocumentListResponse = read_json(operation, response).await?;
        Ok(listing.documents)
    }

    async fn upload_document(
        &self,
        payload: Vec<u8>,
        filename: &str,
    ) -> Result<UploadResponse, BackendError> {
        let operation = Operation::Upload;
        let mime = mime_guess::from_path(filename).first_or_octet_stream();
        let part = Part::bytes(payload)
            .file_name(filename.to_string())
            .mime_str(mime.essence_str())
            .map_err(|err| BackendError::transport(operation, &err))?;
        let response = self
            .http
            .post(self.endpoint("upload-document"))
            .multipart(Form::new().part("file", part))
            .send()
            .await
            .map_err(|err| BackendError::transport(operation, &err))?;
        read_json(operation, response).await
    }

    async fn delete_document(&self, document_id: &DocumentId) -> Result<(), BackendError> {
        let operation = Operation::Delete;
        let url = self.document_endpoint("delete-document", document_id)?;
        let response = self
            .http
            .delete(url)
            .send()
            .await
            .map_err(|err| BackendError::transport(operation, &err))?;
        read_body(operation, response).await.map(|_| ())
    }

    async fn ask(&self, request: ChatRequest) -> Result<ChatResponse, BackendError> {
        let operation = Operation::Ask;
        let response = self
            .http
            .post(self.endpoint("chat"))
            .json(&request)
            .send()
            .await
            .map_err(|err| BackendError::transport(operation, &err))?;
        read_json(operation, response).await
    }

    async fn summarize_document(
        &self,
        document_id: &DocumentId,
        max_bullets: u32,
    ) -> Result<SummaryResponse, BackendError> {
        let operation = Operation::Summarize;
        let url = self.document_endpoint("summarize-document", document_id)?;
        let response = self
            .http
            .post(url)
            .json(&SummarizeRequest { max_bullets })
            .send()
            .await
            .map_err(|err| BackendError::transport(operation, &err))?;
        read_json(operation, response).await
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
