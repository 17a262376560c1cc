//! Transfer orchestration
//!
//! Ties the pieces together for a single transfer: locator validation,
//! direction detection, namespace and credential lookup, the method fallback
//! loop, and telemetry. Only scheme validation, writeback failures and
//! exhausting every method are reported to the caller; everything else ends
//! up in the logs.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::FutureExt;
use jiff::Timestamp;
use tracing::Instrument;

use crate::accumulator::ErrorAccumulator;
use crate::credentials::{Credential, TokenProvider};
use crate::error::{Error, Result};
use crate::job_ad::JobAd;
use crate::locator::Locator;
use crate::method::{DownloadRequest, MethodTable, TransferMethod};
use crate::namespace::{Namespace, NamespaceMatcher};
use crate::telemetry::{TelemetryPayload, TelemetrySink, UNKNOWN_SITE};

/// One requested transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub source: String,
    pub destination: String,
    pub methods: Vec<String>,
    pub recursive: bool,
}

impl TransferRequest {
    pub fn new(
        source: impl Into<String>,
        destination: impl Into<String>,
        methods: Vec<String>,
        recursive: bool,
    ) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            methods,
            recursive,
        }
    }

    /// Methods that will actually be tried
    ///
    /// Directory listing is only implemented over HTTP, so a recursive
    /// request always uses HTTP alone.
    pub fn effective_methods(&self) -> Vec<String> {
        if self.recursive {
            vec![TransferMethod::Http.to_string()]
        } else {
            self.methods.clone()
        }
    }
}

/// Everything the upload backend needs for a writeback
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Local file to send
    pub source: PathBuf,
    /// Federation destination, with its credential hint
    pub destination: Locator,
    pub credential: Credential,
    pub namespace: Namespace,
}

/// Backend performing writebacks into the federation
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UploadBackend: Send + Sync {
    async fn upload(&self, request: &UploadRequest) -> Result<u64>;
}

/// Result of one orchestration run
#[derive(Debug)]
pub struct TransferOutcome {
    pub bytes: u64,
    pub elapsed: Duration,
    /// Method that completed a download
    pub method: Option<TransferMethod>,
    pub writeback: bool,
    pub error: Option<Error>,
}

impl TransferOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn into_result(self) -> Result<u64> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.bytes),
        }
    }
}

struct Completed {
    bytes: u64,
    method: Option<TransferMethod>,
    writeback: bool,
}

/// Coordinates a transfer across its collaborators
pub struct Orchestrator {
    namespaces: Arc<dyn NamespaceMatcher>,
    tokens: Arc<dyn TokenProvider>,
    methods: MethodTable,
    uploader: Arc<dyn UploadBackend>,
    telemetry: Arc<dyn TelemetrySink>,
    errors: ErrorAccumulator,
    site: String,
    version: String,
    job_ad: JobAd,
}

impl Orchestrator {
    pub fn new(
        namespaces: Arc<dyn NamespaceMatcher>,
        tokens: Arc<dyn TokenProvider>,
        methods: MethodTable,
        uploader: Arc<dyn UploadBackend>,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Self {
        Self {
            namespaces,
            tokens,
            methods,
            uploader,
            telemetry,
            errors: ErrorAccumulator::new(),
            site: UNKNOWN_SITE.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            job_ad: JobAd::default(),
        }
    }

    /// Share an accumulator with other orchestrators
    pub fn with_errors(mut self, errors: ErrorAccumulator) -> Self {
        self.errors = errors;
        self
    }

    pub fn with_site(mut self, site: impl Into<String>) -> Self {
        self.site = site.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_job_ad(mut self, job_ad: JobAd) -> Self {
        self.job_ad = job_ad;
        self
    }

    pub fn errors(&self) -> &ErrorAccumulator {
        &self.errors
    }

    /// Run a transfer, returning the bytes moved
    pub async fn run(&self, request: &TransferRequest) -> Result<u64> {
        self.execute(request).await.into_result()
    }

    /// Run a transfer and report the full outcome
    ///
    /// A panic anywhere below this point is caught, recorded in the error
    /// accumulator, and returned as [`Error::Panic`].
    pub async fn execute(&self, request: &TransferRequest) -> TransferOutcome {
        let started = Instant::now();
        let span = tracing::info_span!(
            "transfer",
            source = %request.source,
            destination = %request.destination,
            methods = ?request.methods,
            recursive = request.recursive,
            site = %self.site,
            token_name = tracing::field::Empty,
        );

        let result = AssertUnwindSafe(self.transfer(request).instrument(span))
            .catch_unwind()
            .await;

        let elapsed = started.elapsed();
        match result {
            Ok(Ok(done)) => TransferOutcome {
                bytes: done.bytes,
                elapsed,
                method: done.method,
                writeback: done.writeback,
                error: None,
            },
            Ok(Err(e)) => TransferOutcome {
                bytes: 0,
                elapsed,
                method: None,
                writeback: false,
                error: Some(e),
            },
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::error!(panic = %message, "Panic captured while attempting to perform transfer");
                let err = Error::Panic(message);
                self.errors.add(&err);
                TransferOutcome {
                    bytes: 0,
                    elapsed,
                    method: None,
                    writeback: false,
                    error: Some(err),
                }
            }
        }
    }

    async fn transfer(&self, request: &TransferRequest) -> Result<Completed> {
        let source = Locator::parse(&request.source).inspect_err(|e| {
            tracing::error!(error = %e, "Failed to parse source locator");
        })?;
        let destination = Locator::parse(&request.destination).inspect_err(|e| {
            tracing::error!(error = %e, "Failed to parse destination locator");
        })?;

        tracing::debug!(
            source_scheme = %source.transport(),
            dest_scheme = %destination.transport(),
            "Locators validated"
        );

        if destination.transport().is_federation() {
            return self.writeback(&source, destination).await;
        }

        self.download(request, &source, &destination).await
    }

    async fn writeback(&self, source: &Locator, destination: Locator) -> Result<Completed> {
        tracing::debug!("Detected writeback");

        let dest_path = destination.federation_path();
        // Uploading without knowing the namespace policy is refused
        let namespace = self
            .namespaces
            .match_namespace(&dest_path)
            .await
            .inspect_err(|e| {
                tracing::error!(error = %e, "Failed to get namespace information");
                self.errors.add(e);
            })?;

        let credential = self.tokens.resolve(destination.credential_hint())?;
        tracing::debug!(source = ?credential.source(), "Using credential for writeback");

        let upload = UploadRequest {
            source: source.local_path(),
            destination,
            credential,
            namespace,
        };
        let bytes = self.uploader.upload(&upload).await.inspect_err(|e| {
            tracing::error!(error = %e, "Writeback failed");
            self.errors.add(e);
        })?;

        Ok(Completed {
            bytes,
            method: None,
            writeback: true,
        })
    }

    async fn download(
        &self,
        request: &TransferRequest,
        source: &Locator,
        destination: &Locator,
    ) -> Result<Completed> {
        let source_path = source.federation_path();

        let namespace = match self.namespaces.match_namespace(&source_path).await {
            Ok(ns) => ns,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to get namespace information, continuing without it");
                Namespace::default()
            }
        };

        let credential_hint = source.credential_hint().to_string();
        tracing::Span::current().record("token_name", credential_hint.as_str());

        let download = DownloadRequest {
            source: source_path.clone(),
            destination: resolve_destination(&destination.local_path(), source),
            namespace,
            recursive: request.recursive,
            credential_hint,
        };

        let mut payload = TelemetryPayload::new(&source_path, &self.site, &self.version)
            .with_job_ad(&self.job_ad);

        let start = Timestamp::now().as_second();
        let mut completed: Option<(TransferMethod, u64)> = None;

        for name in request.effective_methods() {
            let method = match name.parse::<TransferMethod>() {
                Ok(m) => m,
                Err(e) => {
                    tracing::error!("{e}");
                    continue;
                }
            };
            let Some(backend) = self.methods.get(method) else {
                tracing::warn!(method = %method, "No backend available for transfer method");
                continue;
            };

            tracing::info!("Trying {}...", method.as_str().to_uppercase());
            match backend.download(&download, &mut payload).await {
                Ok(bytes) => {
                    completed = Some((method, bytes));
                    break;
                }
                Err(e) => {
                    tracing::warn!(method = %method, error = %e, "Transfer method failed");
                    self.errors.add(&e);
                }
            }
        }

        let end = Timestamp::now().as_second();
        let bytes = completed.map(|(_, b)| b).unwrap_or(0);
        payload.finish(start, end, bytes, completed.is_some());

        // Delivery problems never affect the transfer result
        if let Err(e) = self.telemetry.send(&payload).await {
            tracing::debug!(error = %e, "Failed to send transfer record");
        }

        match completed {
            Some((method, bytes)) => Ok(Completed {
                bytes,
                method: Some(method),
                writeback: false,
            }),
            None => {
                tracing::error!("All methods failed! Unable to download file.");
                Err(Error::AllMethodsFailed(source_path))
            }
        }
    }
}

/// Absolute destination path; an existing directory receives the source's file name
fn resolve_destination(destination: &Path, source: &Locator) -> PathBuf {
    let absolute = std::path::absolute(destination).unwrap_or_else(|_| destination.to_path_buf());

    if absolute.is_dir()
        && let Some(name) = source.file_name()
    {
        return absolute.join(name);
    }
    absolute
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
