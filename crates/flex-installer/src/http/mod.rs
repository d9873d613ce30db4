//! HTTP access to the remote SDK archive.

mod client;

pub use client::{host_header, HttpClient, HttpClientConfig, HttpError, PROXY_ENV_VARS};
