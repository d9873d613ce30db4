pub mod cli;
pub mod config;
pub mod downloader;
pub mod error;
pub mod http;
pub mod installer;
pub mod normalize;
pub mod pipeline;
pub mod platform;

pub use error::{InstallError, Result};
pub use config::{ArtifactReference, InstallConfig};
pub use downloader::{ArchiveExtractor, CacheState, FileDownloader};
pub use installer::{BinaryIndex, BinaryRegistry, PermissionFixer, Stager};
pub use normalize::{LineEndingNormalizer, NormalizationError, NormalizationReport, NormalizationStats};
pub use pipeline::{FetchOutcome, InstallReport, SdkInstaller, Stage};
pub use platform::Platform;
