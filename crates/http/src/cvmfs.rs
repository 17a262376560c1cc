//! CVMFS backend
//!
//! Worker nodes often mount the federation read-only under CVMFS. When the
//! mount is present a download is a local copy.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sc_core::{DownloadBackend, DownloadRequest, Error, Result, TelemetryPayload};

const METHOD: &str = "cvmfs";

/// Copies from a local CVMFS mount
#[derive(Debug, Clone)]
pub struct CvmfsBackend {
    root: PathBuf,
}

impl CvmfsBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn mounted_path(&self, source: &str) -> PathBuf {
        self.root.join(source.trim_start_matches('/'))
    }
}

#[async_trait]
impl DownloadBackend for CvmfsBackend {
    async fn download(&self, request: &DownloadRequest, payload: &mut TelemetryPayload) -> Result<u64> {
        if request.namespace.use_token_on_read {
            return Err(Error::method(METHOD, "protected namespaces are not published in CVMFS"));
        }

        let source = self.mounted_path(&request.source);
        if !is_file(&source).await {
            return Err(Error::method(
                METHOD,
                format!("{} is not available in the mount", source.display()),
            ));
        }

        tracing::debug!(path = %source.display(), "Copying from CVMFS");
        let bytes = tokio::fs::copy(&source, &request.destination)
            .await
            .map_err(|e| Error::method(METHOD, e.to_string()))?;

        payload.cache = Some(self.root.display().to_string());
        Ok(bytes)
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}
