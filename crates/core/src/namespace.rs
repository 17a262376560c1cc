//! Namespace metadata
//!
//! A namespace describes the routing and auth policy for a path prefix in the
//! federation. The lookup itself is performed by a [`NamespaceMatcher`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A cache that can serve reads for a namespace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cache {
    /// `host:port` of the unauthenticated endpoint
    pub endpoint: String,

    /// `host:port` of the token-authenticated endpoint
    #[serde(default)]
    pub auth_endpoint: Option<String>,

    /// Resource name in the topology
    #[serde(default)]
    pub resource: Option<String>,
}

/// Routing and auth policy for a path prefix
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespace {
    /// Path prefix this namespace covers
    pub path: String,

    /// Reads must go over HTTPS
    #[serde(default, rename = "readhttps")]
    pub read_https: bool,

    /// Reads require a bearer token
    #[serde(default, rename = "usetokenonread")]
    pub use_token_on_read: bool,

    /// Origin accepting uploads, `https://host:port`
    #[serde(default, rename = "writebackhost")]
    pub writeback_host: Option<String>,

    /// Server answering directory listings, `https://host:port`
    #[serde(default, rename = "dirlisthost")]
    pub dirlist_host: Option<String>,

    /// Caches serving this namespace, nearest first
    #[serde(default)]
    pub caches: Vec<Cache>,
}

impl Namespace {
    /// Whether this namespace covers `path`
    pub fn matches(&self, path: &str) -> bool {
        let prefix = self.path.trim_end_matches('/');
        path == prefix
            || path
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with('/'))
            || prefix.is_empty()
    }

    /// Whether the namespace was actually found (the default value is empty)
    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }
}

/// Namespace lookup service
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NamespaceMatcher: Send + Sync {
    /// Return the namespace covering `path`
    async fn match_namespace(&self, path: &str) -> Result<Namespace>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_prefix_on_segment_boundary() {
        let ns = Namespace {
            path: "/osgconnect/public".to_string(),
            ..Default::default()
        };
        assert!(ns.matches("/osgconnect/public"));
        assert!(ns.matches("/osgconnect/public/user/file"));
        assert!(!ns.matches("/osgconnect/publicity/file"));
        assert!(!ns.matches("/other"));
    }

    #[test]
    fn test_deserialize_topology_namespace() {
        let json = r#"{
            "path": "/ospool/PROTECTED",
            "readhttps": true,
            "usetokenonread": true,
            "writebackhost": "https://origin.example.org:1095",
            "dirlisthost": null
        }"#;
        let ns: Namespace = serde_json::from_str(json).unwrap();
        assert!(ns.read_https);
        assert!(ns.use_token_on_read);
        assert_eq!(
            ns.writeback_host.as_deref(),
            Some("https://origin.example.org:1095")
        );
        assert!(ns.dirlist_host.is_none());
        assert!(ns.caches.is_empty());
    }
}
