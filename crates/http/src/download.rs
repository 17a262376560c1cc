//! HTTP download backend
//!
//! Fetches from the caches advertised for the namespace, nearest first. For
//! protected namespaces the bearer token is sent to the cache's
//! authenticated endpoint. Recursive requests list directories through the
//! namespace's dir-list host and fetch every file found.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use sc_core::{
    Cache, DownloadBackend, DownloadRequest, EndpointSelector, Error, Result, TelemetryPayload,
    TokenProvider,
};
use tokio::io::AsyncWriteExt;
use url::Url;

use crate::client::{format_reqwest_error, pinned_client, status_error};
use crate::webdav;

const METHOD: &str = "http";

/// Downloads over HTTP(S) from federation caches
pub struct HttpBackend {
    tokens: Arc<dyn TokenProvider>,
    selector: EndpointSelector,
}

impl HttpBackend {
    pub fn new(tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            tokens,
            selector: EndpointSelector::new(),
        }
    }

    fn token_for(&self, request: &DownloadRequest) -> Result<Option<String>> {
        if !request.namespace.use_token_on_read {
            return Ok(None);
        }
        let credential = self.tokens.resolve(&request.credential_hint)?;
        Ok(Some(credential.token().to_string()))
    }

    /// Try each cache in turn for one file
    async fn fetch_file(
        &self,
        caches: &[Cache],
        source: &str,
        destination: &Path,
        secure: bool,
        token: Option<&str>,
    ) -> Result<(u64, String)> {
        let mut last_error = None;

        for cache in caches {
            let url = cache_url(cache, source, secure, token.is_some())?;
            tracing::debug!(url = %url, "Downloading from cache");

            match self.fetch_url(&url, destination, token).await {
                Ok(bytes) => return Ok((bytes, cache.endpoint.clone())),
                Err(e) => {
                    tracing::warn!(cache = %cache.endpoint, error = %e, "Cache download failed");
                    last_error = Some(e);
                }
            }
        }

        Err(match last_error {
            Some(e) => Error::method(METHOD, e.to_string()),
            None => Error::method(METHOD, "no caches available for namespace"),
        })
    }

    async fn fetch_url(&self, url: &Url, destination: &Path, token: Option<&str>) -> Result<u64> {
        let client = pinned_client(url, &self.selector)?;
        let mut request = client.get(url.clone());
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let mut response = request
            .send()
            .await
            .map_err(|e| Error::Network(format_reqwest_error(&e)))?;
        if !response.status().is_success() {
            return Err(status_error(url, response.status()));
        }

        let mut file = tokio::fs::File::create(destination).await?;
        let mut written = 0u64;
        let result: Result<()> = async {
            while let Some(chunk) = response
                .chunk()
                .await
                .map_err(|e| Error::Network(format_reqwest_error(&e)))?
            {
                file.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
            file.flush().await?;
            Ok(())
        }
        .await;

        if let Err(e) = result {
            drop(file);
            // Leave no partial file behind for the next method
            let _ = tokio::fs::remove_file(destination).await;
            return Err(e);
        }

        Ok(written)
    }

    async fn fetch_directory(
        &self,
        request: &DownloadRequest,
        secure: bool,
        token: Option<&str>,
    ) -> Result<(u64, Option<String>)> {
        let host = request.namespace.dirlist_host.as_deref().ok_or_else(|| {
            Error::method(METHOD, "namespace does not support directory listings")
        })?;
        let client = crate::client::build_client()?;

        let mut total = 0u64;
        let mut used_cache = None;
        let mut pending: Vec<(String, PathBuf)> =
            vec![(request.source.clone(), request.destination.clone())];

        while let Some((remote, local)) = pending.pop() {
            tokio::fs::create_dir_all(&local).await?;
            let entries = webdav::list(&client, host, &remote, token).await?;

            for entry in entries {
                let Some(name) = child_name(&remote, &entry.path) else {
                    tracing::warn!(
                        directory = %remote,
                        entry = %entry.path,
                        "Skipping listing entry outside the directory"
                    );
                    continue;
                };
                let target = local.join(name);
                if entry.is_dir {
                    pending.push((entry.path, target));
                } else {
                    let (bytes, cache) = self
                        .fetch_file(&request.namespace.caches, &entry.path, &target, secure, token)
                        .await?;
                    total += bytes;
                    used_cache = Some(cache);
                }
            }
        }

        Ok((total, used_cache))
    }
}

#[async_trait]
impl DownloadBackend for HttpBackend {
    async fn download(&self, request: &DownloadRequest, payload: &mut TelemetryPayload) -> Result<u64> {
        let token = self
            .token_for(request)
            .map_err(|e| Error::method(METHOD, e.to_string()))?;
        let secure = request.namespace.read_https || token.is_some();

        if request.recursive {
            let (bytes, cache) = self.fetch_directory(request, secure, token.as_deref()).await?;
            payload.cache = cache;
            return Ok(bytes);
        }

        let (bytes, cache) = self
            .fetch_file(
                &request.namespace.caches,
                &request.source,
                &request.destination,
                secure,
                token.as_deref(),
            )
            .await?;
        payload.cache = Some(cache);
        Ok(bytes)
    }
}

/// Name of `child` when it sits directly under `parent`
fn child_name<'a>(parent: &str, child: &'a str) -> Option<&'a str> {
    let name = child
        .strip_prefix(parent.trim_end_matches('/'))?
        .strip_prefix('/')?;
    match name {
        "" | "." | ".." => None,
        _ if name.contains('/') => None,
        _ => Some(name),
    }
}

/// URL of `path` on `cache`
fn cache_url(cache: &Cache, path: &str, secure: bool, authenticated: bool) -> Result<Url> {
    let endpoint = if authenticated {
        cache.auth_endpoint.as_deref().unwrap_or(&cache.endpoint)
    } else {
        &cache.endpoint
    };
    let scheme = if secure { "https" } else { "http" };

    let mut url = Url::parse(&format!("{scheme}://{endpoint}"))
        .map_err(|e| Error::Config(format!("Invalid cache endpoint '{endpoint}': {e}")))?;
    url.set_path(path);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sc_core::{Credential, CredentialSource, Namespace};
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    struct StaticToken;

    impl TokenProvider for StaticToken {
        fn resolve(&self, _hint: &str) -> Result<Credential> {
            Ok(Credential::new("test-token", CredentialSource::BearerTokenEnv))
        }
    }

    /// Serve one canned response, handing back the raw request
    async fn serve_once(response: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let n = socket.read(&mut buf).await.unwrap();
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&buf[..n]).to_string()
        });
        (addr, handle)
    }

    fn request(endpoint: &str, destination: PathBuf, token_on_read: bool) -> DownloadRequest {
        DownloadRequest {
            source: "/ospool/data/hello.txt".to_string(),
            destination,
            namespace: Namespace {
                path: "/ospool".to_string(),
                use_token_on_read: token_on_read,
                caches: vec![Cache {
                    endpoint: endpoint.to_string(),
                    auth_endpoint: None,
                    resource: None,
                }],
                ..Default::default()
            },
            recursive: false,
            credential_hint: String::new(),
        }
    }

    /// Answer requests by method and path until the test ends, recording each request line
    async fn serve_routes(
        routes: Vec<(&'static str, u16, String)>,
    ) -> (String, Arc<std::sync::Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let log = seen.clone();
        tokio::spawn(async move {
            loop {
                let (mut socket, _) = listener.accept().await.unwrap();
                let raw = read_request(&mut socket).await;
                let line = raw.lines().next().unwrap_or_default().to_string();
                let key = line.rsplit_once(' ').map(|(k, _)| k).unwrap_or_default();
                log.lock().unwrap().push(key.to_string());

                let (status, body) = routes
                    .iter()
                    .find(|(route, _, _)| *route == key)
                    .map(|(_, status, body)| (*status, body.as_str()))
                    .unwrap_or((404, ""));
                let response = format!(
                    "HTTP/1.1 {status} OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                socket.shutdown().await.unwrap();
            }
        });
        (addr, seen)
    }

    /// Read headers and any Content-Length body
    async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
        let mut raw = Vec::new();
        let mut buf = [0u8; 4096];
        let header_end = loop {
            let n = socket.read(&mut buf).await.unwrap();
            raw.extend_from_slice(&buf[..n]);
            if let Some(pos) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
            if n == 0 {
                break raw.len();
            }
        };
        let headers = String::from_utf8_lossy(&raw[..header_end]).to_lowercase();
        let length: usize = headers
            .lines()
            .find_map(|l| l.strip_prefix("content-length:"))
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0);
        while raw.len() < header_end + length {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            raw.extend_from_slice(&buf[..n]);
        }
        String::from_utf8_lossy(&raw).to_string()
    }

    fn listing(entries: &[(&str, bool)]) -> String {
        let mut body = String::from(r#"<?xml version="1.0"?><D:multistatus xmlns:D="DAV:">"#);
        for (href, is_dir) in entries {
            let kind = if *is_dir { "<D:collection/>" } else { "" };
            body.push_str(&format!(
                "<D:response><D:href>{href}</D:href><D:propstat><D:prop><D:resourcetype>{kind}</D:resourcetype></D:prop></D:propstat></D:response>"
            ));
        }
        body.push_str("</D:multistatus>");
        body
    }

    #[test]
    fn test_child_name() {
        assert_eq!(child_name("/ospool/data", "/ospool/data/a.txt"), Some("a.txt"));
        assert_eq!(child_name("/ospool/data/", "/ospool/data/sub"), Some("sub"));
        assert_eq!(child_name("/ospool/data", "/ospool/data/.."), None);
        assert_eq!(child_name("/ospool/data", "/ospool/data/."), None);
        assert_eq!(child_name("/ospool/data", "/ospool/data"), None);
        assert_eq!(child_name("/ospool/data", "/ospool/data/sub/deep.txt"), None);
        assert_eq!(child_name("/ospool/data", "/ospool/database.txt"), None);
        assert_eq!(child_name("/ospool/data", "/elsewhere/x.txt"), None);
    }

    #[test]
    fn test_cache_url() {
        let cache = Cache {
            endpoint: "cache.example.org:8000".to_string(),
            auth_endpoint: Some("cache.example.org:8443".to_string()),
            resource: None,
        };
        assert_eq!(
            cache_url(&cache, "/ospool/a b", false, false).unwrap().as_str(),
            "http://cache.example.org:8000/ospool/a%20b"
        );
        assert_eq!(
            cache_url(&cache, "/ospool/a", true, true).unwrap().as_str(),
            "https://cache.example.org:8443/ospool/a"
        );
    }

    #[tokio::test]
    async fn test_download_from_cache() {
        let (addr, server) = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Length: 11\r\nConnection: close\r\n\r\nhello world",
        )
        .await;
        let dir = tempfile::TempDir::new().unwrap();
        let dest = dir.path().join("hello.txt");

        let backend = HttpBackend::new(Arc::new(StaticToken));
        let mut payload = TelemetryPayload::default();
        let bytes = backend
            .download(&request(&addr, dest.clone(), false), &mut payload)
            .await
            .unwrap();

        assert_eq!(bytes, 11);
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "hello world");
        assert_eq!(payload.cache.as_deref(), Some(addr.as_str()));

        let raw = server.await.unwrap();
        assert!(raw.starts_with("GET /ospool/data/hello.txt"));
        assert!(!raw.to_lowercase().contains("authorization"));
    }

    #[tokio::test]
    async fn test_missing_file_is_method_error() {
        let (addr, _server) =
            serve_once("HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                .await;
        let dir = tempfile::TempDir::new().unwrap();
        let dest = dir.path().join("hello.txt");

        let backend = HttpBackend::new(Arc::new(StaticToken));
        let err = backend
            .download(&request(&addr, dest.clone(), false), &mut TelemetryPayload::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Method { .. }));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_no_caches() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut req = request("unused:1", dir.path().join("x"), false);
        req.namespace.caches.clear();

        let backend = HttpBackend::new(Arc::new(StaticToken));
        let err = backend
            .download(&req, &mut TelemetryPayload::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no caches"));
    }

    #[tokio::test]
    async fn test_recursive_requires_dirlist_host() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut req = request("unused:1", dir.path().join("out"), false);
        req.recursive = true;

        let backend = HttpBackend::new(Arc::new(StaticToken));
        let err = backend
            .download(&req, &mut TelemetryPayload::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("directory listings"));
    }

    #[tokio::test]
    async fn test_fetch_url_sends_bearer_token() {
        let (addr, server) = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Length: 5\r\nConnection: close\r\n\r\nhello",
        )
        .await;
        let dir = tempfile::TempDir::new().unwrap();
        let dest = dir.path().join("hello.txt");
        let url = Url::parse(&format!("http://{addr}/ospool/protected/hello.txt")).unwrap();

        let backend = HttpBackend::new(Arc::new(StaticToken));
        let bytes = backend.fetch_url(&url, &dest, Some("test-token")).await.unwrap();
        assert_eq!(bytes, 5);

        let raw = server.await.unwrap().to_lowercase();
        assert!(raw.starts_with("get /ospool/protected/hello.txt"));
        assert!(raw.contains("authorization: bearer test-token"));
    }

    #[tokio::test]
    async fn test_token_on_read_uses_https_auth_endpoint() {
        let auth = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let auth_addr = auth.local_addr().unwrap().to_string();
        let plain = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let plain_addr = plain.local_addr().unwrap().to_string();

        let handshake = tokio::spawn(async move {
            let (mut socket, _) = auth.accept().await.unwrap();
            let mut first = [0u8; 1];
            socket.read_exact(&mut first).await.unwrap();
            first[0]
        });

        let dir = tempfile::TempDir::new().unwrap();
        let mut req = request(&plain_addr, dir.path().join("hello.txt"), true);
        req.namespace.caches[0].auth_endpoint = Some(auth_addr);

        let backend = HttpBackend::new(Arc::new(StaticToken));
        let err = backend
            .download(&req, &mut TelemetryPayload::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Method { .. }));

        let first = tokio::time::timeout(std::time::Duration::from_secs(5), handshake)
            .await
            .expect("client never reached the authenticated endpoint")
            .unwrap();
        // TLS handshake record
        assert_eq!(first, 0x16);
    }

    #[tokio::test]
    async fn test_recursive_download() {
        let root = listing(&[
            ("/ospool/data/", true),
            ("/ospool/data/a.txt", false),
            ("/ospool/data/sub/", true),
            ("/ospool/data/..", true),
            ("/elsewhere/x.txt", false),
        ]);
        let sub = listing(&[("/ospool/data/sub/", true), ("/ospool/data/sub/b.txt", false)]);
        let (addr, seen) = serve_routes(vec![
            ("PROPFIND /ospool/data", 207, root),
            ("PROPFIND /ospool/data/sub", 207, sub),
            ("GET /ospool/data/a.txt", 200, "alpha".to_string()),
            ("GET /ospool/data/sub/b.txt", 200, "bravo!".to_string()),
        ])
        .await;

        let dir = tempfile::TempDir::new().unwrap();
        let out = dir.path().join("out");
        let mut req = request(&addr, out.clone(), false);
        req.source = "/ospool/data".to_string();
        req.recursive = true;
        req.namespace.dirlist_host = Some(format!("http://{addr}"));

        let backend = HttpBackend::new(Arc::new(StaticToken));
        let mut payload = TelemetryPayload::default();
        let bytes = backend.download(&req, &mut payload).await.unwrap();

        assert_eq!(bytes, 11);
        assert_eq!(std::fs::read_to_string(out.join("a.txt")).unwrap(), "alpha");
        assert_eq!(std::fs::read_to_string(out.join("sub/b.txt")).unwrap(), "bravo!");
        assert!(!dir.path().join("x.txt").exists());
        assert_eq!(payload.cache.as_deref(), Some(addr.as_str()));

        let mut requests = seen.lock().unwrap().clone();
        requests.sort();
        assert_eq!(
            requests,
            vec![
                "GET /ospool/data/a.txt",
                "GET /ospool/data/sub/b.txt",
                "PROPFIND /ospool/data",
                "PROPFIND /ospool/data/sub",
            ]
        );
    }
}
