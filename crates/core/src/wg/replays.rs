//! Replay-analysis service client
//!
//! Uploads raw replay archives to the third-party analysis service and
//! fetches the JSON form of already-uploaded replays. Responses use
//! the same `status`/`data.summary` envelope the reader consumes.

use std::path::Path;
use std::time::Duration;

use reqwest::Client;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::replay::types::ReplayDocument;

const SERVICE_BASE: &str = "https://wotinspector.com/api/replay";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Counters for one upload run, printed in the end-of-run summary.
#[derive(Debug, Clone, Copy, Default)]
pub struct UploadSummary {
    pub uploaded: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl std::fmt::Display for UploadSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} replays: {} uploaded, {} skipped, {} errors",
            self.uploaded + self.skipped + self.errors,
            self.uploaded,
            self.skipped,
            self.errors
        )
    }
}

pub struct ReplayServiceClient {
    client: Client,
    base_url: String,
}

impl ReplayServiceClient {
    pub fn new() -> Result<Self> {
        Self::with_base_url(SERVICE_BASE.to_string())
    }

    pub fn with_base_url(base_url: String) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client, base_url })
    }

    /// Upload one replay archive; the reply carries the parsed JSON
    /// form of the replay.
    pub async fn upload<P: AsRef<Path>>(&self, path: P, title: &str) -> Result<ReplayDocument> {
        let path = path.as_ref();
        let body = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let url = format!("{}/upload", self.base_url);
        let response = self
            .client
            .post(&url)
            .query(&[("title", title), ("filename", filename.as_str())])
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::Vendor(format!(
                "replay upload failed: {}",
                response.status()
            )));
        }

        let doc: ReplayDocument = response.json().await?;
        if doc.summary().is_none() {
            warn!(path = %path.display(), "uploaded replay has no usable summary");
        } else {
            info!(path = %path.display(), "replay uploaded");
        }
        Ok(doc)
    }

    /// Fetch the JSON form of an already-uploaded replay by id.
    pub async fn fetch(&self, id: &str) -> Result<ReplayDocument> {
        let url = format!("{}/{}", self.base_url, id);
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(Error::Vendor(format!(
                "replay fetch failed: {} ({})",
                id,
                response.status()
            )));
        }

        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_summary_line() {
        let summary = UploadSummary {
            uploaded: 7,
            skipped: 2,
            errors: 1,
        };
        assert_eq!(
            summary.to_string(),
            "10 replays: 7 uploaded, 2 skipped, 1 errors"
        );
    }
}
