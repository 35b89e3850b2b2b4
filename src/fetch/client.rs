//! HTTP client wrapper for fetching archives.
//!
//! This module provides the `HttpClient` struct which streams response bodies
//! straight to disk with timeout configuration and error handling.

use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::Client;
use reqwest::header::CONTENT_LENGTH;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument};
use url::Url;

use super::constants::{CONNECT_TIMEOUT_SECS, PROGRESS_STEP_BYTES, READ_TIMEOUT_SECS};
use super::error::FetchError;
use super::progress::{ProgressEvent, ProgressSender};

/// Where a single transfer reports its progress.
#[derive(Debug, Clone, Default)]
pub struct ItemProgress {
    sender: Option<ProgressSender>,
    index: usize,
    category: String,
}

impl ItemProgress {
    /// Progress target for item `index` of a batch.
    #[must_use]
    pub fn new(sender: Option<ProgressSender>, index: usize, category: impl Into<String>) -> Self {
        Self {
            sender,
            index,
            category: category.into(),
        }
    }

    /// A target that discards every event.
    #[must_use]
    pub fn silent() -> Self {
        Self::default()
    }

    pub(crate) fn emit(&self, event: ProgressEvent) {
        if let Some(sender) = &self.sender {
            sender.publish(self.index, &self.category, event);
        }
    }
}

/// HTTP client for fetching archives with streaming support.
///
/// Created once and cloned into every fetch task so connections are pooled.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Creates a new HTTP client with default timeouts.
    ///
    /// - Connect timeout: 30 seconds
    /// - Overall request timeout: 10 minutes (bulk archives are large)
    /// - Gzip decompression: enabled
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails with the static configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::new_with_timeouts(CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
    }

    /// Creates a new HTTP client with explicit timeout values.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails with the supplied configuration.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new_with_timeouts(connect_timeout_secs: u64, read_timeout_secs: u64) -> Self {
        let version = env!("CARGO_PKG_VERSION");
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .timeout(Duration::from_secs(read_timeout_secs))
            .gzip(true)
            .user_agent(format!("mtgdb/{version}"))
            .build()
            .expect("failed to build HTTP client with static configuration");
        Self { client }
    }

    /// Fetches `url` into `dest`, reporting nothing.
    ///
    /// # Errors
    ///
    /// See [`fetch_to_file_with_progress`](Self::fetch_to_file_with_progress).
    pub async fn fetch_to_file(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
        self.fetch_to_file_with_progress(url, dest, &ItemProgress::silent())
            .await
    }

    /// Streams the body of `url` into the file at `dest`, returning bytes written.
    ///
    /// `dest` is created (or truncated). If anything fails after the file was
    /// created, the partial file is removed before returning.
    ///
    /// # Errors
    ///
    /// Returns `FetchError` if:
    /// - The URL is invalid or not HTTP(S)
    /// - The request fails (network error, timeout)
    /// - The server returns a non-success status
    /// - Writing to disk fails
    #[instrument(skip(self, progress), fields(url = %url, dest = %dest.display()))]
    pub async fn fetch_to_file_with_progress(
        &self,
        url: &str,
        dest: &Path,
        progress: &ItemProgress,
    ) -> Result<u64, FetchError> {
        let parsed = Url::parse(url).map_err(|_| FetchError::invalid_url(url))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FetchError::invalid_url(url));
        }

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| FetchError::network(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::http_status(url, status.as_u16()));
        }

        let total = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        progress.emit(ProgressEvent::Started { total });
        debug!(?total, "response accepted, streaming body");

        let mut file = File::create(dest)
            .await
            .map_err(|e| FetchError::io(dest, e))?;

        let stream_result = stream_to_file(&mut file, response, url, dest, total, progress).await;
        drop(file);

        if stream_result.is_err() {
            debug!(path = %dest.display(), "cleaning up partial file after error");
            let _ = tokio::fs::remove_file(dest).await;
        }

        let bytes = stream_result?;
        progress.emit(ProgressEvent::Finished { bytes });
        info!(path = %dest.display(), bytes, "fetch complete");
        Ok(bytes)
    }

    /// Returns a reference to the underlying reqwest client.
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

/// Streams response body to file, returning bytes written.
async fn stream_to_file(
    file: &mut File,
    response: reqwest::Response,
    url: &str,
    file_path: &Path,
    total: Option<u64>,
    progress: &ItemProgress,
) -> Result<u64, FetchError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;
    let mut next_report = PROGRESS_STEP_BYTES;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| FetchError::network(url, e))?;

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| FetchError::io(file_path, e))?;

        bytes_written += chunk.len() as u64;
        if bytes_written >= next_report {
            progress.emit(ProgressEvent::Advanced {
                bytes: bytes_written,
                total,
            });
            next_report = bytes_written + PROGRESS_STEP_BYTES;
        }
    }

    writer
        .flush()
        .await
        .map_err(|e| FetchError::io(file_path, e))?;

    Ok(bytes_written)
}
