//! Shared HTTP client construction
//!
//! Wraps reqwest setup and maps its errors onto `sc_core::Error`.

use std::net::{IpAddr, SocketAddr};

use sc_core::{EndpointSelector, Error, Result};
use url::Url;

/// User agent sent with every request
pub const USER_AGENT: &str = concat!("stashcp/", env!("CARGO_PKG_VERSION"));

/// Build the default client
pub fn build_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| Error::Network(format!("Failed to create HTTP client: {e}")))
}

/// Build a client that connects to a specific address for `url`'s host
///
/// The hostname stays in the request so TLS and virtual hosting still work.
/// When the host cannot be resolved the plain client is returned.
pub fn pinned_client(url: &Url, selector: &EndpointSelector) -> Result<reqwest::Client> {
    let (Some(host), Some(port)) = (url.host_str(), url.port_or_known_default()) else {
        return build_client();
    };

    // Already an address
    if host.trim_matches(|c| c == '[' || c == ']').parse::<IpAddr>().is_ok() {
        return build_client();
    }

    let Some(address) = selector.resolve(host).into_iter().next() else {
        return build_client();
    };

    tracing::debug!(host = host, address = %address, "Pinning host to resolved address");
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .resolve(host, SocketAddr::new(address.ip(), port))
        .build()
        .map_err(|e| Error::Network(format!("Failed to create HTTP client: {e}")))
}

/// Format a reqwest error into a detailed message
pub(crate) fn format_reqwest_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "Request timeout".to_string()
    } else if error.is_connect() {
        format!("Connection failed: {error}")
    } else if let Some(status) = error.status() {
        format!("Server returned {status}")
    } else {
        error.to_string()
    }
}

/// Map an HTTP status to the matching error
pub(crate) fn status_error(url: &Url, status: reqwest::StatusCode) -> Error {
    match status {
        reqwest::StatusCode::NOT_FOUND => Error::NotFound(url.to_string()),
        reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
            Error::CredentialNotFound(format!("{url} rejected the credential ({status})"))
        }
        _ => Error::Network(format!("{url} returned {status}")),
    }
}
