//! Telemetry reporter
//!
//! Posts one JSON record per transfer to the collector. Sending is advisory:
//! the POST runs on its own task and the caller stops waiting after the
//! configured timeout, leaving the task to finish or fail on its own.

use async_trait::async_trait;
use sc_core::{Error, Result, TelemetryConfig, TelemetryPayload, TelemetrySink};
use tokio::sync::oneshot;

use crate::client::format_reqwest_error;

/// [`TelemetrySink`] posting to the collector
#[derive(Debug, Clone)]
pub struct TelemetryReporter {
    client: reqwest::Client,
    config: TelemetryConfig,
}

impl TelemetryReporter {
    pub fn new(client: reqwest::Client, config: TelemetryConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl TelemetrySink for TelemetryReporter {
    async fn send(&self, payload: &TelemetryPayload) -> Result<()> {
        if !self.config.enabled {
            return Ok(());
        }

        let body = serde_json::to_string(payload).map_err(|e| Error::Serialization(e.to_string()))?;
        let (tx, rx) = oneshot::channel();
        let client = self.client.clone();
        let endpoint = self.config.endpoint.clone();

        tokio::spawn(async move {
            let result: Result<()> = async {
                let response = client
                    .post(&endpoint)
                    .header("Content-Type", "application/json")
                    .body(body)
                    .send()
                    .await
                    .map_err(|e| Error::TelemetryNetwork(format_reqwest_error(&e)))?;
                let status = response.status();
                let text = response
                    .text()
                    .await
                    .map_err(|e| Error::TelemetryNetwork(format_reqwest_error(&e)))?;
                tracing::debug!(status = %status, body = %text, "Telemetry collector responded");
                Ok(())
            }
            .await;
            // The receiver is gone once the caller timed out
            let _ = tx.send(result);
        });

        let timeout = self.config.timeout();
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::TelemetryNetwork("telemetry task ended without a result".to_string())),
            Err(_) => Err(Error::TelemetryTimeout(timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn config(endpoint: String, timeout_secs: u64) -> TelemetryConfig {
        TelemetryConfig {
            enabled: true,
            endpoint,
            timeout_secs,
        }
    }

    #[tokio::test]
    async fn test_disabled_sends_nothing() {
        let reporter = TelemetryReporter::new(
            crate::client::build_client().unwrap(),
            TelemetryConfig {
                enabled: false,
                endpoint: "http://127.0.0.1:9".to_string(),
                timeout_secs: 1,
            },
        );
        assert!(reporter.send(&TelemetryPayload::default()).await.is_ok());
    }

    #[tokio::test]
    async fn test_posts_payload() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                received.extend_from_slice(&buf[..n]);
                if n == 0 || received.ends_with(b"}") {
                    break;
                }
            }
            socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok")
                .await
                .unwrap();
            String::from_utf8_lossy(&received).to_string()
        });

        let reporter =
            TelemetryReporter::new(crate::client::build_client().unwrap(), config(format!("http://{addr}"), 5));
        let payload = TelemetryPayload::new("/ospool/a.txt", "SITE", "0.1.0");
        reporter.send(&payload).await.unwrap();

        let raw = server.await.unwrap();
        assert!(raw.starts_with("POST /"));
        assert!(raw.contains(r#""filename":"/ospool/a.txt""#));
        assert!(raw.contains(r#""sitename":"SITE""#));
    }

    #[tokio::test]
    async fn test_silent_collector_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept and hold the connection without ever answering
        let _server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
            drop(socket);
        });

        let reporter =
            TelemetryReporter::new(crate::client::build_client().unwrap(), config(format!("http://{addr}"), 1));
        let started = Instant::now();
        let err = reporter.send(&TelemetryPayload::default()).await.unwrap_err();

        assert!(matches!(err, Error::TelemetryTimeout(_)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_unreachable_collector() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let reporter =
            TelemetryReporter::new(crate::client::build_client().unwrap(), config(format!("http://{addr}"), 5));
        let err = reporter.send(&TelemetryPayload::default()).await.unwrap_err();
        assert!(matches!(err, Error::TelemetryNetwork(_)));
    }
}
