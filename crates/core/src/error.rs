//! Error types for stashcp
//!
//! Only a few of these ever reach the caller of a transfer. Most are logged,
//! absorbed, and optionally recorded in the [`ErrorAccumulator`](crate::ErrorAccumulator).

use thiserror::Error;

/// Result type alias for stashcp operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for stashcp operations
#[derive(Error, Debug)]
pub enum Error {
    /// Transport scheme outside the accepted set
    #[error("Do not understand scheme '{scheme}' in locator '{locator}'")]
    UnrecognizedScheme { scheme: String, locator: String },

    /// Locator could not be parsed at all
    #[error("Invalid locator '{locator}': {message}")]
    InvalidLocator { locator: String, message: String },

    /// No credential could be located
    #[error("Credential not found: {0}")]
    CredentialNotFound(String),

    /// Namespace metadata lookup failed
    #[error("Namespace lookup failed for {path}: {message}")]
    NamespaceLookup { path: String, message: String },

    /// A single transfer method failed
    #[error("{method} transfer failed: {message}")]
    Method { method: String, message: String },

    /// Every configured method failed
    #[error("All transfer methods failed for {0}")]
    AllMethodsFailed(String),

    /// Upload to the federation failed
    #[error("Upload failed: {0}")]
    Upload(String),

    /// Telemetry delivery did not complete in time
    #[error("Telemetry send timed out after {0:?}")]
    TelemetryTimeout(std::time::Duration),

    /// Telemetry delivery failed on the network
    #[error("Telemetry send failed: {0}")]
    TelemetryNetwork(String),

    /// Payload could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A panic recovered at the orchestration boundary
    #[error("Unrecoverable error (panic) captured during transfer: {0}")]
    Panic(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network error
    #[error("Network error: {0}")]
    Network(String),

    /// Remote or local object not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a Method error
    pub fn method(method: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Method {
            method: method.into(),
            message: message.into(),
        }
    }

    /// Create a NamespaceLookup error
    pub fn namespace(path: impl Into<String>, message: impl Into<String>) -> Self {
        Error::NamespaceLookup {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::UnrecognizedScheme { .. } | Error::InvalidLocator { .. } | Error::Config(_) => 2,
            Error::Network(_)
            | Error::NamespaceLookup { .. }
            | Error::TelemetryTimeout(_)
            | Error::TelemetryNetwork(_) => 3,
            Error::CredentialNotFound(_) => 4,
            Error::NotFound(_) => 5,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::UnrecognizedScheme {
            scheme: "ftp".to_string(),
            locator: "ftp://host/path".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Do not understand scheme 'ftp' in locator 'ftp://host/path'"
        );

        let err = Error::method("xrootd", "xrdcp exited with status 54");
        assert_eq!(
            err.to_string(),
            "xrootd transfer failed: xrdcp exited with status 54"
        );
    }

    #[test]
    fn test_exit_code() {
        let scheme = Error::UnrecognizedScheme {
            scheme: "ftp".to_string(),
            locator: "ftp://h/p".to_string(),
        };
        assert_eq!(scheme.exit_code(), 2);
        assert_eq!(Error::CredentialNotFound("x".to_string()).exit_code(), 4);
        assert_eq!(Error::AllMethodsFailed("/a".to_string()).exit_code(), 1);
    }
}
