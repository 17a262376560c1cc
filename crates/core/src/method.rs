//! Transfer methods and their backends
//!
//! A method is one way of getting bytes from the federation to the local
//! machine. Methods are tried in order until one succeeds.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::namespace::Namespace;
use crate::telemetry::TelemetryPayload;

/// Supported download methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferMethod {
    /// Copy out of a locally mounted CVMFS repository
    Cvmfs,
    /// XRootD copy client
    Xrootd,
    /// Direct HTTP(S) from a cache
    Http,
}

impl TransferMethod {
    pub const ALL: [TransferMethod; 3] = [
        TransferMethod::Cvmfs,
        TransferMethod::Xrootd,
        TransferMethod::Http,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransferMethod::Cvmfs => "cvmfs",
            TransferMethod::Xrootd => "xrootd",
            TransferMethod::Http => "http",
        }
    }
}

impl fmt::Display for TransferMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransferMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cvmfs" => Ok(TransferMethod::Cvmfs),
            "xrootd" => Ok(TransferMethod::Xrootd),
            "http" => Ok(TransferMethod::Http),
            _ => Err(format!("Unknown transfer method: {s}")),
        }
    }
}

/// Everything a backend needs to perform one download
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    /// Federation path, always rooted at `/`
    pub source: String,

    /// Local file (or directory, when recursive) to write
    pub destination: PathBuf,

    pub namespace: Namespace,

    pub recursive: bool,

    /// Credential name from the source scheme; empty for the default token
    pub credential_hint: String,
}

/// A backend able to perform downloads for one method
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DownloadBackend: Send + Sync {
    /// Download `request.source` to `request.destination`, returning bytes written
    ///
    /// Backends may record details (such as the cache used) in `payload`.
    async fn download(&self, request: &DownloadRequest, payload: &mut TelemetryPayload)
    -> Result<u64>;
}

/// Lookup from method to backend
#[derive(Clone, Default)]
pub struct MethodTable {
    backends: HashMap<TransferMethod, Arc<dyn DownloadBackend>>,
}

impl MethodTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `backend` for `method`, replacing any previous one
    pub fn with(mut self, method: TransferMethod, backend: Arc<dyn DownloadBackend>) -> Self {
        self.backends.insert(method, backend);
        self
    }

    pub fn get(&self, method: TransferMethod) -> Option<&Arc<dyn DownloadBackend>> {
        self.backends.get(&method)
    }

    pub fn contains(&self, method: TransferMethod) -> bool {
        self.backends.contains_key(&method)
    }
}

impl fmt::Debug for MethodTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut methods: Vec<_> = self.backends.keys().map(|m| m.as_str()).collect();
        methods.sort_unstable();
        f.debug_struct("MethodTable").field("methods", &methods).finish()
    }
}
