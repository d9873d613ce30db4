//! Archive downloading and extraction.
//!
//! This module fetches the SDK archive into the download cache (reusing a
//! cached copy whose size matches the remote one) and unpacks it into the
//! scratch extraction directory.

mod archive;
mod file;

pub use archive::{ArchiveExtractor, ArchiveType};
pub use file::{CacheState, FileDownloader, ProgressThrottle, PROGRESS_REPORT_INTERVAL};
