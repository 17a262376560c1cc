//! Namespace map lookup
//!
//! The federation publishes a JSON document listing every namespace and the
//! caches serving them. It is fetched once per process and matched by
//! longest path prefix.

use std::path::PathBuf;

use async_trait::async_trait;
use sc_core::{Cache, Config, Error, Namespace, NamespaceMatcher, Result};
use serde::Deserialize;
use tokio::sync::OnceCell;

use crate::client::format_reqwest_error;

/// The published namespace document
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NamespaceMap {
    #[serde(default)]
    pub caches: Vec<Cache>,
    #[serde(default)]
    pub namespaces: Vec<Namespace>,
}

impl NamespaceMap {
    /// Longest-prefix match for `path`
    ///
    /// Namespaces without their own cache list inherit the global one.
    pub fn find(&self, path: &str) -> Option<Namespace> {
        let best = self
            .namespaces
            .iter()
            .filter(|ns| ns.matches(path))
            .max_by_key(|ns| ns.path.trim_end_matches('/').len())?;

        let mut ns = best.clone();
        if ns.caches.is_empty() {
            ns.caches = self.caches.clone();
        }
        Some(ns)
    }
}

#[derive(Debug, Clone)]
enum MapSource {
    Url(String),
    File(PathBuf),
}

/// [`NamespaceMatcher`] backed by the published namespace map
pub struct HttpNamespaceMatcher {
    client: reqwest::Client,
    source: MapSource,
    cache_override: Vec<Cache>,
    map: OnceCell<NamespaceMap>,
}

impl HttpNamespaceMatcher {
    pub fn new(client: reqwest::Client, config: &Config) -> Self {
        let source = match &config.namespaces_file {
            Some(path) => MapSource::File(path.clone()),
            None => MapSource::Url(config.namespaces_url.clone()),
        };
        let cache_override = config
            .caches
            .iter()
            .map(|endpoint| Cache {
                endpoint: endpoint.clone(),
                auth_endpoint: Some(endpoint.clone()),
                resource: None,
            })
            .collect();

        Self {
            client,
            source,
            cache_override,
            map: OnceCell::new(),
        }
    }

    async fn load(&self) -> Result<NamespaceMap> {
        match &self.source {
            MapSource::File(path) => {
                tracing::debug!(path = %path.display(), "Loading namespace map from file");
                let contents = tokio::fs::read_to_string(path).await?;
                Ok(serde_json::from_str(&contents)?)
            }
            MapSource::Url(url) => {
                tracing::debug!(url = %url, "Fetching namespace map");
                let response = self
                    .client
                    .get(url)
                    .send()
                    .await
                    .and_then(|r| r.error_for_status())
                    .map_err(|e| Error::namespace("/", format_reqwest_error(&e)))?;
                response
                    .json::<NamespaceMap>()
                    .await
                    .map_err(|e| Error::namespace("/", format!("Invalid namespace map: {e}")))
            }
        }
    }
}

#[async_trait]
impl NamespaceMatcher for HttpNamespaceMatcher {
    async fn match_namespace(&self, path: &str) -> Result<Namespace> {
        let map = self.map.get_or_try_init(|| self.load()).await?;

        let mut ns = map
            .find(path)
            .ok_or_else(|| Error::namespace(path, "no namespace matches this path"))?;

        if !self.cache_override.is_empty() {
            ns.caches = self.cache_override.clone();
        }

        tracing::debug!(namespace = %ns.path, caches = ns.caches.len(), "Matched namespace");
        Ok(ns)
    }
}
