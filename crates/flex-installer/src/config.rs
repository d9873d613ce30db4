//! Installer configuration.
//!
//! All paths are resolved once, before the pipeline starts, and never change
//! while it runs.

use std::path::{Path, PathBuf};

use url::Url;

use crate::http::HttpClientConfig;
use crate::platform::Platform;
use crate::{InstallError, Result};

/// Name of the diagnostic log written next to the installation
pub const DIAGNOSTIC_LOG_NAME: &str = "install.log";

/// Default cache root: `<tmp>/flex_sdk`
pub fn default_cache_root() -> PathBuf {
    std::env::temp_dir().join("flex_sdk")
}

/// Default installation directory below a package root
pub fn default_install_dir(package_root: &Path) -> PathBuf {
    package_root.join("lib").join("flex_sdk")
}

/// Where the artifact comes from and where each stage puts it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactReference {
    pub remote_url: String,
    /// `<cache root>/downloads/<archive file name>`
    pub cached_file: PathBuf,
    /// `<cache root>/extractions`
    pub scratch_dir: PathBuf,
    pub install_dir: PathBuf,
}

impl ArtifactReference {
    pub fn new(
        remote_url: impl Into<String>,
        cache_root: impl AsRef<Path>,
        install_dir: impl Into<PathBuf>,
    ) -> Result<Self> {
        let remote_url = remote_url.into();
        let file_name = archive_file_name(&remote_url)?;
        let cache_root = cache_root.as_ref();

        Ok(Self {
            cached_file: cache_root.join("downloads").join(file_name),
            scratch_dir: cache_root.join("extractions"),
            install_dir: install_dir.into(),
            remote_url,
        })
    }
}

/// Last path segment of `url`, used as the cached archive's file name
pub fn archive_file_name(url: &str) -> Result<String> {
    let parsed = Url::parse(url)
        .map_err(|e| InstallError::Config(format!("invalid SDK URL {}: {}", url, e)))?;

    parsed
        .path_segments()
        .and_then(|segments| segments.last())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .ok_or_else(|| InstallError::Config(format!("SDK URL has no file name: {}", url)))
}

/// Everything the install pipeline needs, assembled once at startup
#[derive(Debug, Clone)]
pub struct InstallConfig {
    pub artifact: ArtifactReference,
    /// Receives non-fatal line ending errors
    pub diagnostic_log: PathBuf,
    /// Leading archive path components to drop while extracting
    pub strip_components: usize,
    pub platform: Platform,
    pub http: HttpClientConfig,
    /// Show progress bars
    pub progress: bool,
}

impl InstallConfig {
    /// Defaults for a package rooted at `package_root`
    pub fn new(artifact: ArtifactReference, package_root: impl AsRef<Path>) -> Self {
        Self {
            artifact,
            diagnostic_log: package_root.as_ref().join(DIAGNOSTIC_LOG_NAME),
            strip_components: 0,
            platform: Platform::current(),
            http: HttpClientConfig::default(),
            progress: true,
        }
    }

    pub fn with_strip_components(mut self, strip_components: usize) -> Self {
        self.strip_components = strip_components;
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_http(mut self, http: HttpClientConfig) -> Self {
        self.http = http;
        self
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_archive_file_name() {
        assert_eq!(
            archive_file_name("http://download.macromedia.com/pub/flex/sdk/flex_sdk_4.6.zip").unwrap(),
            "flex_sdk_4.6.zip"
        );
        assert_eq!(
            archive_file_name("https://example.com/sdk.zip?mirror=1").unwrap(),
            "sdk.zip"
        );
    }

    #[test]
    fn test_archive_file_name_requires_file() {
        assert!(matches!(
            archive_file_name("https://example.com/"),
            Err(InstallError::Config(_))
        ));
        assert!(archive_file_name("not a url").is_err());
    }

    #[test]
    fn test_artifact_reference_layout() {
        let artifact = ArtifactReference::new(
            "https://example.com/sdk/flex_sdk_4.6.zip",
            "/tmp/flex_sdk",
            "/project/lib/flex_sdk",
        )
        .unwrap();

        assert_eq!(artifact.cached_file, PathBuf::from("/tmp/flex_sdk/downloads/flex_sdk_4.6.zip"));
        assert_eq!(artifact.scratch_dir, PathBuf::from("/tmp/flex_sdk/extractions"));
        assert_eq!(artifact.install_dir, PathBuf::from("/project/lib/flex_sdk"));
    }

    #[test]
    fn test_install_config_defaults() {
        let artifact = ArtifactReference::new(
            "https://example.com/flex_sdk.zip",
            default_cache_root(),
            default_install_dir(Path::new("/project")),
        )
        .unwrap();
        let config = InstallConfig::new(artifact, "/project");

        assert_eq!(config.diagnostic_log, PathBuf::from("/project/install.log"));
        assert_eq!(config.artifact.install_dir, PathBuf::from("/project/lib/flex_sdk"));
        assert_eq!(config.strip_components, 0);
        assert_eq!(config.platform, Platform::current());
        assert!(config.progress);
    }
}
