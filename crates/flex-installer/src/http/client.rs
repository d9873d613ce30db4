//! HTTP client for fetching the SDK archive.
//!
//! This module wraps `reqwest` with the two request shapes the installer needs:
//! - `HEAD` to learn the remote archive size without transferring the body
//! - streaming `GET` into a file with byte-count progress callbacks
//!
//! When a proxy is configured, every request is routed through it and carries
//! the original target's `Host` header.
//!
//! # Examples
//!
//! ```no_run
//! use flex_installer::http::{HttpClient, HttpClientConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = HttpClientConfig::new()
//!     .with_proxy("http://proxy.internal:3128".to_string())
//!     .with_user_agent("flex-sdk-installer".to_string());
//! let client = HttpClient::with_config(config)?;
//!
//! let size = client.content_length("https://example.com/flex_sdk.zip").await?;
//! println!("remote size: {:?}", size);
//!
//! client.download(
//!     "https://example.com/flex_sdk.zip",
//!     "/tmp/flex_sdk.zip".as_ref(),
//!     Some(|downloaded, total| println!("{}/{:?}", downloaded, total)),
//! ).await?;
//! # Ok(())
//! # }
//! ```

use futures_util::StreamExt;
use reqwest::header::{CONTENT_LENGTH, HOST};
use reqwest::{Client, Method, RequestBuilder, Response};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use url::Url;

const DEFAULT_USER_AGENT: &str = concat!("flex-installer/", env!("CARGO_PKG_VERSION"));

/// Environment variables naming an HTTP proxy, in lookup order
pub const PROXY_ENV_VARS: [&str; 2] = ["http_proxy", "HTTP_PROXY"];

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP {status}: {url}")]
    HttpStatus { status: u16, url: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

pub struct HttpClient {
    client: Client,
    user_agent: String,
    proxy: Option<String>,
}

impl HttpClient {
    pub fn new() -> Result<Self, HttpError> {
        Self::with_config(HttpClientConfig::default())
    }

    pub fn with_config(config: HttpClientConfig) -> Result<Self, HttpError> {
        // Routing follows the configured proxy only, never reqwest's env lookup
        let mut builder = Client::builder()
            .no_proxy()
            .user_agent(&config.user_agent);

        if let Some(proxy_url) = &config.proxy {
            let proxy = reqwest::Proxy::all(proxy_url)?;
            builder = builder.proxy(proxy);
        }

        if let Some(cafile) = &config.cafile {
            let cert_bytes = std::fs::read(cafile)?;
            let cert = reqwest::Certificate::from_pem(&cert_bytes)?;
            builder = builder.add_root_certificate(cert);
        }

        let client = builder.build()?;

        Ok(Self {
            client,
            user_agent: config.user_agent,
            proxy: config.proxy,
        })
    }

    /// Build a request, adding the target `Host` header when proxied
    fn request(&self, method: Method, url: &str) -> Result<RequestBuilder, HttpError> {
        let mut request = self.client.request(method, url);

        if self.proxy.is_some() {
            request = request.header(HOST, host_header(url)?);
        }

        Ok(request)
    }

    /// Ask the server for the size of `url` without downloading it.
    ///
    /// Returns `Ok(None)` when the server omits or mangles `Content-Length`,
    /// or answers with a non-success status. The header is read directly:
    /// `Response::content_length` reports the (empty) body size for `HEAD`
    /// responses.
    pub async fn content_length(&self, url: &str) -> Result<Option<u64>, HttpError> {
        let response = self.request(Method::HEAD, url)?.send().await?;

        if !response.status().is_success() {
            log::debug!("HTTP HEAD {} -> {}", url, response.status());
            return Ok(None);
        }

        let length = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok());

        log::debug!("HTTP HEAD {} -> {} (content-length: {:?})", url, response.status(), length);

        Ok(length)
    }

    /// Send a GET request, failing on any non-success status
    pub async fn get(&self, url: &str) -> Result<Response, HttpError> {
        log::debug!("HTTP GET {}", url);
        let response = self.request(Method::GET, url)?.send().await?;

        let status = response.status();
        if !status.is_success() {
            log::debug!("HTTP {} {} headers: {:?}", status.as_u16(), url, response.headers());
            // Dropping the response aborts the in-flight body
            return Err(HttpError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response)
    }

    /// Stream `url` into `dest`, returning the number of bytes written.
    ///
    /// The destination is truncated only once the server has answered with a
    /// success status, so a failed request leaves the previous file in place.
    pub async fn download<F>(
        &self,
        url: &str,
        dest: &Path,
        progress: Option<F>,
    ) -> Result<u64, HttpError>
    where
        F: Fn(u64, Option<u64>),
    {
        let response = self.get(url).await?;

        let total_size = response.content_length();

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = File::create(dest).await?;
        let mut downloaded: u64 = 0;

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;

            if let Some(ref callback) = progress {
                callback(downloaded, total_size);
            }
        }

        file.flush().await?;

        Ok(downloaded)
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn proxy(&self) -> Option<&str> {
        self.proxy.as_deref()
    }
}

/// `host[:port]` of `url`, as sent in the `Host` header
pub fn host_header(url: &str) -> Result<String, HttpError> {
    let parsed = Url::parse(url).map_err(|e| HttpError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    let host = parsed.host_str().ok_or_else(|| HttpError::InvalidUrl {
        url: url.to_string(),
        reason: "missing host".to_string(),
    })?;

    // `port()` is None for the scheme's default port
    Ok(match parsed.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub proxy: Option<String>,
    pub cafile: Option<PathBuf>,
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            proxy: None,
            cafile: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl HttpClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_proxy(mut self, proxy: String) -> Self {
        self.proxy = Some(proxy);
        self
    }

    pub fn with_cafile(mut self, cafile: PathBuf) -> Self {
        self.cafile = Some(cafile);
        self
    }

    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }
}
