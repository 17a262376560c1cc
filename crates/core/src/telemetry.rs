//! Transfer telemetry record
//!
//! The payload is the denormalized record sent to the metrics collector after
//! every download attempt. Key names match what the collector already ingests.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;
use crate::job_ad::JobAd;

/// Outcome reported to the collector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub enum TransferStatus {
    Success,
    #[default]
    Fail,
}

/// One transfer's record, as sent to the collector
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TelemetryPayload {
    pub filename: String,
    pub sitename: String,
    pub status: TransferStatus,

    #[serde(rename = "Owner", skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,

    #[serde(rename = "ProjectName", skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,

    #[serde(rename = "ClusterId", skip_serializing_if = "Option::is_none")]
    pub cluster_id: Option<i64>,

    #[serde(rename = "ProcId", skip_serializing_if = "Option::is_none")]
    pub proc_id: Option<i64>,

    #[serde(rename = "JobId", skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,

    #[serde(rename = "ResourceName", skip_serializing_if = "Option::is_none")]
    pub resource_name: Option<String>,

    pub version: String,

    /// Unix seconds
    pub start1: i64,
    pub end1: i64,
    pub timestamp: i64,

    /// Seconds
    #[serde(rename = "downloadTime")]
    pub download_time: i64,

    #[serde(rename = "fileSize")]
    pub file_size: u64,

    #[serde(rename = "downloadSize")]
    pub download_size: u64,

    /// Cache that served the transfer, set by the method backend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<String>,
}

/// Site name used when `OSG_SITE_NAME` is unset
pub const UNKNOWN_SITE: &str = "siteNotFound";

impl TelemetryPayload {
    /// Start a payload for `filename`
    pub fn new(filename: impl Into<String>, sitename: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            sitename: sitename.into(),
            version: version.into(),
            ..Default::default()
        }
    }

    /// Copy job metadata into the payload
    pub fn with_job_ad(mut self, ad: &JobAd) -> Self {
        self.owner = ad.owner.clone();
        self.project_name = ad.project_name.clone();
        self.cluster_id = ad.cluster_id;
        self.proc_id = ad.proc_id;
        self.job_id = ad.job_id();
        self.resource_name = ad.resource_name.clone();
        self
    }

    /// Fill in the timing and size fields once the transfer is over
    pub fn finish(&mut self, start: i64, end: i64, bytes: u64, success: bool) {
        self.start1 = start;
        self.end1 = end;
        self.timestamp = end;
        self.download_time = end - start;
        if success {
            self.status = TransferStatus::Success;
            self.file_size = bytes;
            self.download_size = bytes;
        } else {
            self.status = TransferStatus::Fail;
        }
    }
}

/// Site name from the environment
pub fn site_name() -> String {
    std::env::var("OSG_SITE_NAME").unwrap_or_else(|_| UNKNOWN_SITE.to_string())
}

/// Destination for telemetry payloads
///
/// Errors are advisory; callers log them and carry on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    async fn send(&self, payload: &TelemetryPayload) -> Result<()>;
}

/// Sink that drops every payload
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTelemetry;

#[async_trait]
impl TelemetrySink for NoopTelemetry {
    async fn send(&self, _payload: &TelemetryPayload) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_wire_format() {
        let ad = JobAd {
            owner: Some("alice".to_string()),
            project_name: Some("OSG-Staff".to_string()),
            cluster_id: Some(42),
            proc_id: Some(0),
            resource_name: None,
        };
        let mut payload =
            TelemetryPayload::new("/ospool/data/a.txt", "UNL", "0.1.0").with_job_ad(&ad);
        payload.finish(1_700_000_000, 1_700_000_003, 1024, true);

        insta::assert_json_snapshot!(payload, @r#"
        {
          "filename": "/ospool/data/a.txt",
          "sitename": "UNL",
          "status": "Success",
          "Owner": "alice",
          "ProjectName": "OSG-Staff",
          "ClusterId": 42,
          "ProcId": 0,
          "JobId": "42.0",
          "version": "0.1.0",
          "start1": 1700000000,
          "end1": 1700000003,
          "timestamp": 1700000003,
          "downloadTime": 3,
          "fileSize": 1024,
          "downloadSize": 1024
        }
        "#);
    }

    #[test]
    fn test_failed_transfer_keeps_sizes_zero() {
        let mut payload = TelemetryPayload::new("/a", UNKNOWN_SITE, "0.1.0");
        payload.finish(10, 12, 512, false);
        assert_eq!(payload.status, TransferStatus::Fail);
        assert_eq!(payload.download_time, 2);
        assert_eq!(payload.file_size, 0);

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["status"], "Fail");
        assert!(json.get("Owner").is_none());
    }

    #[tokio::test]
    async fn test_noop_sink() {
        let payload = TelemetryPayload::default();
        assert!(NoopTelemetry.send(&payload).await.is_ok());
    }
}
