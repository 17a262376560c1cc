//! sc-core: Core library for the stashcp federated transfer client
//!
//! This crate provides the transfer orchestration engine, including:
//! - Locator parsing and scheme normalization
//! - Bearer token discovery
//! - DNS endpoint ordering
//! - The ordered method-fallback loop
//! - Telemetry payloads and the collaborator traits backends implement
//!
//! This crate performs no HTTP itself, so every collaborator can be mocked
//! in tests. Concrete backends live in `sc-http`.

pub mod accumulator;
pub mod config;
pub mod credentials;
pub mod endpoint;
pub mod error;
pub mod job_ad;
pub mod locator;
pub mod method;
pub mod namespace;
pub mod orchestrator;
pub mod telemetry;

pub use accumulator::{ErrorAccumulator, RecordedError};
pub use config::{Config, ConfigManager, TelemetryConfig};
pub use credentials::{Credential, CredentialResolver, CredentialSource, TokenEnvironment, TokenProvider};
pub use endpoint::{EndpointSelector, ResolvedAddress};
pub use error::{Error, Result};
pub use job_ad::JobAd;
pub use locator::{Locator, Transport, split_scheme};
pub use method::{DownloadBackend, DownloadRequest, MethodTable, TransferMethod};
pub use namespace::{Cache, Namespace, NamespaceMatcher};
pub use orchestrator::{Orchestrator, TransferOutcome, TransferRequest, UploadBackend, UploadRequest};
pub use telemetry::{NoopTelemetry, TelemetryPayload, TelemetrySink, TransferStatus};
