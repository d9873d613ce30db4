use std::path::PathBuf;

use thiserror::Error;

use crate::http::HttpError;

#[derive(Error, Debug)]
pub enum InstallError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Network errors
    #[error("Download failed for {url}: {source}")]
    DownloadFailed {
        url: String,
        #[source]
        source: HttpError,
    },

    // Archive errors
    #[error("Error extracting archive {}: {reason}", .archive.display())]
    Extraction { archive: PathBuf, reason: String },

    // Normalization errors
    #[error("Critical error while fixing line endings: {reason}")]
    Normalization {
        reason: String,
        /// Diagnostic log holding the non-fatal errors gathered before the abort
        log_file: Option<PathBuf>,
    },

    // Staging errors
    #[error("Temporary files not copied to their final destination: {0}")]
    StagingCopy(String),

    #[error("Cannot verify that temporary files were copied to {}: {source}", .path.display())]
    StagingVerify {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Temporary files were not copied to their final destination: {} is empty", .0.display())]
    EmptyInstall(PathBuf),

    // Registry errors
    #[error("Binary index has not been refreshed since the last install")]
    StaleIndex,

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize diagnostics: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, InstallError>;
