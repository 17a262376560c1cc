//! XRootD backend, driving the external `xrdcp` client

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use sc_core::{Cache, DownloadBackend, DownloadRequest, Error, Result, TelemetryPayload, TokenProvider};
use tokio::process::Command;

const METHOD: &str = "xrootd";

/// Runs `xrdcp` against each namespace cache until one succeeds
pub struct XrootdBackend {
    program: PathBuf,
    tokens: Arc<dyn TokenProvider>,
}

impl XrootdBackend {
    pub fn new(program: impl Into<PathBuf>, tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            program: program.into(),
            tokens,
        }
    }

    async fn copy(&self, url: &str, request: &DownloadRequest, token: Option<&str>) -> Result<()> {
        let mut command = Command::new(&self.program);
        command
            .arg("-f")
            .arg(url)
            .arg(&request.destination)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(token) = token {
            command.env("BEARER_TOKEN", token);
        }

        let output = command.output().await.map_err(|e| {
            Error::method(METHOD, format!("failed to run {}: {e}", self.program.display()))
        })?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(Error::method(
                METHOD,
                format!("xrdcp exited with {}: {}", output.status, stderr.trim()),
            ))
        }
    }
}

#[async_trait]
impl DownloadBackend for XrootdBackend {
    async fn download(&self, request: &DownloadRequest, payload: &mut TelemetryPayload) -> Result<u64> {
        let token = if request.namespace.use_token_on_read {
            let credential = self
                .tokens
                .resolve(&request.credential_hint)
                .map_err(|e| Error::method(METHOD, e.to_string()))?;
            Some(credential.token().to_string())
        } else {
            None
        };

        let mut last_error = Error::method(METHOD, "no caches available for namespace");
        for cache in &request.namespace.caches {
            let url = root_url(cache, &request.source);
            tracing::debug!(url = %url, "Running xrdcp");

            match self.copy(&url, request, token.as_deref()).await {
                Ok(()) => {
                    let bytes = tokio::fs::metadata(&request.destination).await?.len();
                    payload.cache = Some(cache.endpoint.clone());
                    return Ok(bytes);
                }
                Err(e) => {
                    tracing::warn!(cache = %cache.endpoint, error = %e, "xrdcp failed");
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }
}

/// `root://` URL of `path` on the cache host, at the default XRootD port
fn root_url(cache: &Cache, path: &str) -> String {
    let host = cache
        .endpoint
        .rsplit_once(':')
        .map(|(host, _)| host)
        .unwrap_or(&cache.endpoint);
    format!("root://{host}//{}", path.trim_start_matches('/'))
}
