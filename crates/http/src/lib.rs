//! sc-http: network and filesystem collaborators for stashcp
//!
//! Implements the `sc-core` collaborator traits:
//! - namespace map lookup over HTTP
//! - HTTP, CVMFS and XRootD download backends
//! - HTTP writeback
//! - the telemetry reporter

mod client;
pub mod cvmfs;
pub mod download;
pub mod namespaces;
pub mod telemetry;
pub mod upload;
pub mod webdav;
pub mod xrootd;

use std::sync::Arc;

use sc_core::{Config, MethodTable, TokenProvider, TransferMethod};

pub use client::{USER_AGENT, build_client};
pub use cvmfs::CvmfsBackend;
pub use download::HttpBackend;
pub use namespaces::{HttpNamespaceMatcher, NamespaceMap};
pub use telemetry::TelemetryReporter;
pub use upload::HttpUploader;
pub use xrootd::XrootdBackend;

/// Register a backend for every transfer method
pub fn method_table(config: &Config, tokens: Arc<dyn TokenProvider>) -> MethodTable {
    MethodTable::new()
        .with(TransferMethod::Cvmfs, Arc::new(CvmfsBackend::new(&config.cvmfs_root)))
        .with(
            TransferMethod::Xrootd,
            Arc::new(XrootdBackend::new(&config.xrdcp, tokens.clone())),
        )
        .with(TransferMethod::Http, Arc::new(HttpBackend::new(tokens)))
}
