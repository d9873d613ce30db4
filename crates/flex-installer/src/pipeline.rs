//! The SDK install pipeline.
//!
//! Stages run strictly in order, each one consuming the previous stage's
//! output:
//!
//! ```text
//! ProbingSize -> Downloading | SkippingDownload -> Extracting
//!   -> NormalizingLineEndings -> Staging -> Verifying -> RefreshingIndex
//!   -> FixingPermissions -> CleaningUp -> Done
//! ```
//!
//! The first failing stage ends the run with its error; nothing is retried.
//! The installation directory is only touched once extraction and
//! normalization have both succeeded.

use std::cell::Cell;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::cli::{Output, ProgressManager};
use crate::config::InstallConfig;
use crate::downloader::{ArchiveExtractor, CacheState, FileDownloader, ProgressThrottle};
use crate::http::HttpClient;
use crate::installer::{BinaryIndex, BinaryRegistry, PermissionFixer, Stager};
use crate::normalize::{LineEndingNormalizer, NormalizationReport};
use crate::{InstallError, Result};

/// Pipeline position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    ProbingSize,
    Downloading,
    SkippingDownload,
    Extracting,
    NormalizingLineEndings,
    Staging,
    Verifying,
    RefreshingIndex,
    FixingPermissions,
    CleaningUp,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::ProbingSize => "probing remote size",
            Stage::Downloading => "downloading",
            Stage::SkippingDownload => "reusing cached archive",
            Stage::Extracting => "extracting",
            Stage::NormalizingLineEndings => "normalizing line endings",
            Stage::Staging => "staging",
            Stage::Verifying => "verifying",
            Stage::RefreshingIndex => "refreshing binary index",
            Stage::FixingPermissions => "fixing permissions",
            Stage::CleaningUp => "cleaning up",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

/// How the archive got into the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The cached copy matched the remote size
    Reused { size_bytes: u64 },
    Downloaded { size_bytes: u64 },
}

impl FetchOutcome {
    pub fn is_reused(&self) -> bool {
        matches!(self, FetchOutcome::Reused { .. })
    }
}

/// Summary of a successful install
#[derive(Debug)]
pub struct InstallReport {
    pub fetch: FetchOutcome,
    pub normalization: NormalizationReport,
    pub files_staged: u64,
    pub bin_dir: PathBuf,
    pub binaries: BinaryIndex,
    /// Launchers whose executable bit had to be restored
    pub fixed_permissions: Vec<PathBuf>,
    /// Set when the scratch directory could not be removed
    pub cleanup_warning: Option<String>,
}

/// Runs the install pipeline for one [`InstallConfig`]
pub struct SdkInstaller {
    config: InstallConfig,
    downloader: FileDownloader,
    output: Output,
    progress: ProgressManager,
    stage: Cell<Stage>,
}

impl SdkInstaller {
    pub fn new(config: InstallConfig, output: Output) -> Result<Self> {
        let http_client = HttpClient::with_config(config.http.clone())
            .map_err(|e| InstallError::Config(format!("cannot create HTTP client: {}", e)))?;

        Ok(Self::with_http_client(config, Arc::new(http_client), output))
    }

    pub fn with_http_client(config: InstallConfig, http_client: Arc<HttpClient>, output: Output) -> Self {
        let progress = ProgressManager::new(config.progress && !output.is_quiet());
        Self {
            downloader: FileDownloader::new(http_client),
            progress,
            output,
            config,
            stage: Cell::new(Stage::Idle),
        }
    }

    pub fn config(&self) -> &InstallConfig {
        &self.config
    }

    pub fn output(&self) -> &Output {
        &self.output
    }

    /// The stage currently running, or the one a failed run stopped in
    pub fn stage(&self) -> Stage {
        self.stage.get()
    }

    fn enter(&self, stage: Stage) {
        log::debug!("Stage: {} -> {}", self.stage.get(), stage);
        self.stage.set(stage);
    }

    /// Run every stage in order
    pub async fn run(&self) -> Result<InstallReport> {
        let artifact = &self.config.artifact;

        let fetch = self.fetch().await?;

        self.enter(Stage::Extracting);
        self.output.info("Extracting contents from the archive...");
        let spinner = self.progress.create_spinner("Extracting...");
        let extraction = ArchiveExtractor::new(self.config.strip_components)
            .extract(&artifact.cached_file, &artifact.scratch_dir);
        spinner.finish_and_clear();

        self.enter(Stage::NormalizingLineEndings);
        let normalization = LineEndingNormalizer::new(&self.config.diagnostic_log)
            .run(extraction, &artifact.scratch_dir)?;
        if normalization.has_errors() {
            self.output.warning(&format!(
                "There were errors during the line ending conversion. Check \"{}\" for more details!",
                self.config.diagnostic_log.display()
            ));
        }
        self.output.verbose(&format!(
            "Line ending conversion stats: {}",
            serde_json::to_string(&normalization.stats)?
        ));

        self.enter(Stage::Staging);
        let stager = Stager::new(&artifact.scratch_dir, &artifact.install_dir);
        let files_staged = stager.stage().await?;

        self.enter(Stage::Verifying);
        stager.verify().await?;

        self.enter(Stage::RefreshingIndex);
        let mut registry = BinaryRegistry::new(&artifact.install_dir, self.config.platform);
        let binaries = registry.refresh()?.clone();

        self.enter(Stage::FixingPermissions);
        let fixed_permissions = PermissionFixer::new(self.config.platform).fix(&binaries).await?;
        for path in &fixed_permissions {
            self.output.writeln(&format!("Fixing file permissions for: {}", path.display()));
        }

        self.output.success(&format!(
            "The Flex SDK binaries are available at:\n  {}",
            registry.bin_dir().display()
        ));

        self.enter(Stage::CleaningUp);
        let cleanup_warning = match tokio::fs::remove_dir_all(&artifact.scratch_dir).await {
            Ok(()) => None,
            Err(e) => {
                self.output.warning(&format!(
                    "Could not delete the temporary directory but that is OK.\n\
                     The next install will take care of that!\nRoot cause: {}",
                    e
                ));
                Some(e.to_string())
            }
        };

        self.enter(Stage::Done);

        Ok(InstallReport {
            fetch,
            normalization,
            files_staged,
            bin_dir: registry.bin_dir().to_path_buf(),
            binaries,
            fixed_permissions,
            cleanup_warning,
        })
    }

    /// Reuse the cached archive when its size matches the remote one,
    /// otherwise download it
    async fn fetch(&self) -> Result<FetchOutcome> {
        let artifact = &self.config.artifact;

        self.enter(Stage::ProbingSize);
        let cache = CacheState::inspect(&artifact.cached_file);

        if let CacheState::Present { size_bytes } = cache {
            self.output.info("It appears that the desired archive is already downloaded. Verifying file size...");

            match self.downloader.remote_size(&artifact.remote_url).await {
                Ok(remote_size) if cache.matches(remote_size) => {
                    self.output.info(&format!(
                        "The local file size matched the remote file size (both: {})! Skipping download.",
                        size_bytes
                    ));
                    self.enter(Stage::SkippingDownload);
                    return Ok(FetchOutcome::Reused { size_bytes });
                }
                Ok(remote_size) => {
                    let remote = remote_size.map_or_else(|| "unknown".to_string(), |size| size.to_string());
                    self.output.info(&format!(
                        "The local file size ({}) did not match the remote file size ({}). Proceeding to download...",
                        size_bytes, remote
                    ));
                }
                Err(e) => {
                    log::warn!("Size check for {} failed: {}", artifact.remote_url, e);
                    self.output.info("Could not determine the remote file size. Proceeding to download...");
                }
            }
        }

        self.enter(Stage::Downloading);
        self.download().await
    }

    async fn download(&self) -> Result<FetchOutcome> {
        let artifact = &self.config.artifact;

        self.output.info(&format!("Requesting {}", artifact.remote_url));

        let file_name = artifact
            .cached_file
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        let bar = self.progress.create_download_bar(&file_name, None);
        let throttle = ProgressThrottle::new();
        let text_progress = !self.progress.is_enabled();
        let output = &self.output;

        let result = self
            .downloader
            .download(
                &artifact.remote_url,
                &artifact.cached_file,
                Some(|received: u64, _total: Option<u64>| {
                    bar.set_position(received);
                    if let Some(kb) = throttle.observe(received) {
                        if text_progress {
                            output.writeln(&format!("Received {}KB...", kb));
                        }
                    }
                }),
            )
            .await;
        bar.finish_and_clear();

        let size_bytes = result?;
        self.output.info(&format!("Received {}KB total!", size_bytes / 1024));

        Ok(FetchOutcome::Downloaded { size_bytes })
    }
}
