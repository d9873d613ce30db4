//! CR-LF → LF normalization of an extracted tree.
//!
//! Every entry matching `**/*` below the extraction root is visited. Text
//! files containing CR-LF pairs are rewritten in place; files that look
//! binary are left untouched. Per-file failures are collected in order and
//! written to a JSON diagnostic log instead of aborting the walk.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::{InstallError, Result};

/// Leading bytes inspected for a NUL when deciding whether a file is binary
const BINARY_SNIFF_LEN: usize = 8192;

/// Where in the walk a non-fatal error happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorPhase {
    /// Rewriting a file failed
    #[serde(rename = "convert.error")]
    Convert,
    /// Reading a file or walking a directory failed
    #[serde(rename = "processing.error")]
    Process,
}

/// A non-fatal error recorded during normalization
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizationError {
    pub path: PathBuf,
    #[serde(rename = "type")]
    pub phase: ErrorPhase,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizationStats {
    pub directories: usize,
    pub processed: usize,
    pub converted: usize,
    pub skipped_binary: usize,
}

/// Outcome of one normalization run
#[derive(Debug, Clone, Default)]
pub struct NormalizationReport {
    pub stats: NormalizationStats,
    pub errors: Vec<NormalizationError>,
}

impl NormalizationReport {
    fn record(&mut self, path: &Path, phase: ErrorPhase, message: impl ToString) {
        log::debug!("{:?} error on {}", phase, path.display());
        self.errors.push(NormalizationError {
            path: path.to_path_buf(),
            phase,
            message: message.to_string(),
        });
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Rewrites DOS line endings to UNIX ones under an extraction directory
#[derive(Clone)]
pub struct LineEndingNormalizer {
    log_file: PathBuf,
    write: fn(&Path, &[u8]) -> std::io::Result<()>,
}

impl std::fmt::Debug for LineEndingNormalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineEndingNormalizer")
            .field("log_file", &self.log_file)
            .finish_non_exhaustive()
    }
}

impl LineEndingNormalizer {
    /// `log_file` receives the accumulated errors when there are any
    pub fn new(log_file: impl Into<PathBuf>) -> Self {
        Self {
            log_file: log_file.into(),
            write: |path, content| std::fs::write(path, content),
        }
    }

    /// Replace the function rewriting converted files
    #[cfg(test)]
    fn with_writer(mut self, write: fn(&Path, &[u8]) -> std::io::Result<()>) -> Self {
        self.write = write;
        self
    }

    pub fn log_file(&self) -> &Path {
        &self.log_file
    }

    /// Normalize `root` after an extraction attempt.
    ///
    /// A failed `extraction` is returned as-is before anything is touched.
    /// Non-fatal errors are logged to [`Self::log_file`] and the report is
    /// returned; a critical error flushes the log and fails the run. A log
    /// left by an earlier run is removed first.
    pub fn run<T>(&self, extraction: Result<T>, root: &Path) -> Result<NormalizationReport> {
        extraction?;
        self.remove_stale_log()?;

        let mut report = NormalizationReport::default();
        let walk = self.walk(root, &mut report);
        self.conclude(report, walk)
    }

    /// Persist accumulated errors and turn a critical walk error into a failure
    fn conclude(
        &self,
        report: NormalizationReport,
        walk: std::result::Result<(), String>,
    ) -> Result<NormalizationReport> {
        let log_file = if report.has_errors() {
            self.write_log(&report.errors)?;
            log::warn!(
                "{} errors during line ending conversion, see {}",
                report.errors.len(),
                self.log_file.display()
            );
            Some(self.log_file.clone())
        } else {
            None
        };

        match walk {
            Ok(()) => Ok(report),
            Err(reason) => Err(InstallError::Normalization { reason, log_file }),
        }
    }

    /// Visit every entry under `root`. `Err` carries a critical error.
    fn walk(&self, root: &Path, report: &mut NormalizationReport) -> std::result::Result<(), String> {
        let metadata = std::fs::metadata(root)
            .map_err(|e| format!("cannot read {}: {}", root.display(), e))?;
        if !metadata.is_dir() {
            return Err(format!("{} is not a directory", root.display()));
        }

        let root_str = root
            .to_str()
            .ok_or_else(|| format!("{} is not valid UTF-8", root.display()))?;
        let pattern = format!("{}/**/*", glob::Pattern::escape(root_str));

        let entries = glob::glob(&pattern).map_err(|e| format!("invalid pattern {}: {}", pattern, e))?;

        for entry in entries {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    if e.path() == root {
                        return Err(format!("cannot walk {}: {}", root.display(), e.error()));
                    }
                    report.record(e.path(), ErrorPhase::Process, e.error());
                    continue;
                }
            };

            let metadata = match std::fs::symlink_metadata(&path) {
                Ok(metadata) => metadata,
                Err(e) => {
                    report.record(&path, ErrorPhase::Process, e);
                    continue;
                }
            };

            if metadata.is_dir() {
                report.stats.directories += 1;
            } else if metadata.is_file() {
                report.stats.processed += 1;
                self.convert_file(&path, report)?;
            }
        }

        Ok(())
    }

    fn convert_file(&self, path: &Path, report: &mut NormalizationReport) -> std::result::Result<(), String> {
        let content = match std::fs::read(path) {
            Ok(content) => content,
            Err(e) => {
                report.record(path, ErrorPhase::Process, e);
                return Ok(());
            }
        };

        if is_binary(&content) {
            report.stats.skipped_binary += 1;
            return Ok(());
        }

        let Some(converted) = crlf_to_lf(&content) else {
            return Ok(());
        };

        match (self.write)(path, &converted) {
            Ok(()) => {
                report.stats.converted += 1;
                Ok(())
            }
            Err(e) if is_unrecoverable(&e) => {
                Err(format!("cannot write {}: {}", path.display(), e))
            }
            Err(e) => {
                report.record(path, ErrorPhase::Convert, e);
                Ok(())
            }
        }
    }

    fn remove_stale_log(&self) -> Result<()> {
        match std::fs::remove_file(&self.log_file) {
            Ok(()) => {
                log::debug!("Removed stale {}", self.log_file.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_log(&self, errors: &[NormalizationError]) -> Result<()> {
        if let Some(parent) = self.log_file.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.log_file, serde_json::to_string_pretty(errors)?)?;
        Ok(())
    }
}

/// Errors after which no further file can be converted
fn is_unrecoverable(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::StorageFull | ErrorKind::ReadOnlyFilesystem | ErrorKind::OutOfMemory
    )
}

fn is_binary(content: &[u8]) -> bool {
    content[..content.len().min(BINARY_SNIFF_LEN)].contains(&0)
}

/// Replace every CR-LF pair with LF. `None` when there is nothing to replace.
pub fn crlf_to_lf(content: &[u8]) -> Option<Vec<u8>> {
    if !content.windows(2).any(|pair| pair == b"\r\n") {
        return None;
    }

    let mut out = Vec::with_capacity(content.len());
    let mut bytes = content.iter().peekable();
    while let Some(&byte) = bytes.next() {
        if byte == b'\r' && bytes.peek() == Some(&&b'\n') {
            continue;
        }
        out.push(byte);
    }

    Some(out)
}
