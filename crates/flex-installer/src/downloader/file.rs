//! Cached archive download: remote size check, cache reuse and streaming fetch.

use std::cell::Cell;
use std::path::Path;
use std::sync::Arc;

use crate::http::{HttpClient, HttpError};
use crate::{InstallError, Result};

/// Bytes received between two textual progress reports
pub const PROGRESS_REPORT_INTERVAL: u64 = 800_000;

/// What is already sitting at the cache path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    Absent,
    Present { size_bytes: u64 },
}

impl CacheState {
    /// Inspect the cache path without opening the file
    pub fn inspect(path: &Path) -> Self {
        match std::fs::metadata(path) {
            Ok(metadata) if metadata.is_file() => CacheState::Present {
                size_bytes: metadata.len(),
            },
            _ => CacheState::Absent,
        }
    }

    /// Whether the cached copy can be reused given the remote size.
    ///
    /// An unknown remote size never matches.
    pub fn matches(&self, remote_size: Option<u64>) -> bool {
        match (self, remote_size) {
            (CacheState::Present { size_bytes }, Some(remote)) => *size_bytes == remote,
            _ => false,
        }
    }
}

/// Throttles per-chunk byte counts into occasional "Received N KB" reports
#[derive(Debug, Default)]
pub struct ProgressThrottle {
    notified: Cell<u64>,
}

impl ProgressThrottle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the KB count to report once more than
    /// [`PROGRESS_REPORT_INTERVAL`] bytes arrived since the last report.
    pub fn observe(&self, received: u64) -> Option<u64> {
        if received.saturating_sub(self.notified.get()) > PROGRESS_REPORT_INTERVAL {
            self.notified.set(received);
            Some(received / 1024)
        } else {
            None
        }
    }
}

/// File downloader for the SDK archive
pub struct FileDownloader {
    http_client: Arc<HttpClient>,
}

impl FileDownloader {
    pub fn new(http_client: Arc<HttpClient>) -> Self {
        Self { http_client }
    }

    /// Remote size of `url` from a `HEAD` request
    pub async fn remote_size(&self, url: &str) -> std::result::Result<Option<u64>, HttpError> {
        self.http_client.content_length(url).await
    }

    /// Download `url` to `dest`, overwriting whatever was cached there.
    ///
    /// The cache directory is created if missing. Returns the byte count.
    pub async fn download<F>(&self, url: &str, dest: &Path, progress: Option<F>) -> Result<u64>
    where
        F: Fn(u64, Option<u64>),
    {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        self.http_client
            .download(url, dest, progress)
            .await
            .map_err(|source| InstallError::DownloadFailed {
                url: url.to_string(),
                source,
            })
    }
}
