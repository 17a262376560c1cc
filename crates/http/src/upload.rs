//! Writeback over HTTP PUT

use async_trait::async_trait;
use sc_core::{EndpointSelector, Error, Result, UploadBackend, UploadRequest};
use url::Url;

use crate::client::{format_reqwest_error, pinned_client, status_error};

/// Uploads files to the namespace's writeback host
#[derive(Debug, Clone, Default)]
pub struct HttpUploader {
    selector: EndpointSelector,
}

impl HttpUploader {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UploadBackend for HttpUploader {
    async fn upload(&self, request: &UploadRequest) -> Result<u64> {
        let host = request.namespace.writeback_host.as_deref().ok_or_else(|| {
            Error::Upload(format!(
                "namespace {} does not accept writes",
                request.namespace.path
            ))
        })?;
        let path = request.destination.federation_path();
        let url = writeback_url(host, &path)?;

        let body = tokio::fs::read(&request.source).await?;
        let size = body.len() as u64;
        let content_type = mime_guess::from_path(&request.source)
            .first_or_octet_stream()
            .to_string();

        tracing::debug!(url = %url, size = size, "Uploading");
        let client = pinned_client(&url, &self.selector)?;
        let response = client
            .put(url.clone())
            .bearer_auth(request.credential.token())
            .header("Content-Type", content_type)
            .body(body)
            .send()
            .await
            .map_err(|e| Error::Upload(format_reqwest_error(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(match status_error(&url, status) {
                e @ Error::CredentialNotFound(_) => e,
                e => Error::Upload(e.to_string()),
            });
        }

        Ok(size)
    }
}

fn writeback_url(host: &str, path: &str) -> Result<Url> {
    let mut url = Url::parse(host)
        .map_err(|e| Error::Upload(format!("Invalid writeback host '{host}': {e}")))?;
    url.set_path(path);
    Ok(url)
}
