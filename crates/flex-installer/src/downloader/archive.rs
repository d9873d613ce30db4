//! Archive extraction (zip, tar, tar.gz, tar.bz2, tar.xz).

use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Component, Path, PathBuf};

use crate::{InstallError, Result};

/// Supported archive types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveType {
    Zip,
    Tar,
    TarGz,
    TarBz2,
    TarXz,
}

impl ArchiveType {
    /// Detect archive type from file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let path_str = path.to_string_lossy().to_lowercase();

        if path_str.ends_with(".zip") {
            Some(ArchiveType::Zip)
        } else if path_str.ends_with(".tar.gz") || path_str.ends_with(".tgz") {
            Some(ArchiveType::TarGz)
        } else if path_str.ends_with(".tar.bz2") || path_str.ends_with(".tbz2") {
            Some(ArchiveType::TarBz2)
        } else if path_str.ends_with(".tar.xz") || path_str.ends_with(".txz") {
            Some(ArchiveType::TarXz)
        } else if path_str.ends_with(".tar") {
            Some(ArchiveType::Tar)
        } else {
            None
        }
    }
}

/// Extracts the downloaded SDK archive into a scratch directory.
///
/// The destination is always wiped before extraction, so entries from an
/// earlier (possibly partial) run are never merged with the new ones.
#[derive(Debug, Clone, Default)]
pub struct ArchiveExtractor {
    /// Leading path components dropped from every entry
    strip_components: usize,
}

impl ArchiveExtractor {
    pub fn new(strip_components: usize) -> Self {
        Self { strip_components }
    }

    /// Wipe `dest_dir`, then extract `archive_path` into it.
    ///
    /// Returns the number of entries written. Every failure, including IO
    /// errors, is reported as [`InstallError::Extraction`].
    pub fn extract(&self, archive_path: &Path, dest_dir: &Path) -> Result<usize> {
        let result = Self::prepare_destination(dest_dir).and_then(|()| {
            let archive_type = ArchiveType::from_path(archive_path)
                .ok_or_else(|| extraction_error(archive_path, "unknown archive type"))?;
            self.extract_with_type(archive_path, dest_dir, archive_type)
        });

        result.map_err(|e| match e {
            e @ InstallError::Extraction { .. } => e,
            other => extraction_error(archive_path, other.to_string()),
        })
    }

    /// Remove any previous extraction and recreate the directory empty
    fn prepare_destination(dest_dir: &Path) -> Result<()> {
        if dest_dir.exists() {
            std::fs::remove_dir_all(dest_dir)?;
        }
        std::fs::create_dir_all(dest_dir)?;
        Ok(())
    }

    fn extract_with_type(
        &self,
        archive_path: &Path,
        dest_dir: &Path,
        archive_type: ArchiveType,
    ) -> Result<usize> {
        log::debug!("Extracting {} ({:?}) into {}", archive_path.display(), archive_type, dest_dir.display());

        match archive_type {
            ArchiveType::Zip => self.extract_zip(archive_path, dest_dir),
            ArchiveType::Tar => {
                let reader = BufReader::new(File::open(archive_path)?);
                self.extract_tar_reader(reader, archive_path, dest_dir)
            }
            ArchiveType::TarGz => {
                let reader = BufReader::new(File::open(archive_path)?);
                self.extract_tar_reader(GzDecoder::new(reader), archive_path, dest_dir)
            }
            ArchiveType::TarBz2 => {
                use bzip2::read::BzDecoder;

                let reader = BufReader::new(File::open(archive_path)?);
                self.extract_tar_reader(BzDecoder::new(reader), archive_path, dest_dir)
            }
            ArchiveType::TarXz => {
                use xz2::read::XzDecoder;

                let reader = BufReader::new(File::open(archive_path)?);
                self.extract_tar_reader(XzDecoder::new(reader), archive_path, dest_dir)
            }
        }
    }

    /// Extract a zip archive
    fn extract_zip(&self, archive_path: &Path, dest_dir: &Path) -> Result<usize> {
        let file = File::open(archive_path)?;
        let reader = BufReader::new(file);
        let mut archive = zip::ZipArchive::new(reader)
            .map_err(|e| extraction_error(archive_path, format!("failed to open zip: {}", e)))?;
        let dest_canonical = dest_dir.canonicalize()?;

        let mut written = 0;

        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)
                .map_err(|e| extraction_error(archive_path, format!("failed to read zip entry: {}", e)))?;

            // `enclosed_name` rejects absolute paths and `..` escapes
            let name = entry.enclosed_name().ok_or_else(|| {
                extraction_error(archive_path, format!("path traversal detected in archive: {}", entry.name()))
            })?;

            let Some(relative_path) = self.relative_path(archive_path, &name)? else {
                continue;
            };
            let outpath = dest_dir.join(&relative_path);
            ensure_inside(archive_path, &dest_canonical, &outpath)?;

            if entry.is_dir() {
                std::fs::create_dir_all(&outpath)?;
                continue;
            }

            if let Some(parent) = outpath.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let mut outfile = File::create(&outpath)?;
            std::io::copy(&mut entry, &mut outfile)?;
            written += 1;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Some(mode) = entry.unix_mode() {
                    std::fs::set_permissions(&outpath, std::fs::Permissions::from_mode(mode & 0o7777))?;
                }
            }
        }

        Ok(written)
    }

    /// Extract from a tar reader (common implementation)
    fn extract_tar_reader<R: Read>(&self, reader: R, archive_path: &Path, dest_dir: &Path) -> Result<usize> {
        let mut archive = tar::Archive::new(reader);
        let dest_canonical = dest_dir.canonicalize()?;
        let mut written = 0;

        for entry in archive.entries()
            .map_err(|e| extraction_error(archive_path, format!("failed to read tar: {}", e)))?
        {
            let mut entry = entry
                .map_err(|e| extraction_error(archive_path, format!("failed to read tar entry: {}", e)))?;

            let path = entry.path()
                .map_err(|e| extraction_error(archive_path, format!("invalid path in tar: {}", e)))?
                .into_owned();

            let Some(relative_path) = self.relative_path(archive_path, &path)? else {
                continue;
            };
            let outpath = dest_dir.join(&relative_path);
            ensure_inside(archive_path, &dest_canonical, &outpath)?;

            if entry.header().entry_type().is_dir() {
                std::fs::create_dir_all(&outpath)?;
                continue;
            }

            if let Some(parent) = outpath.parent() {
                std::fs::create_dir_all(parent)?;
            }

            entry.unpack(&outpath)
                .map_err(|e| extraction_error(archive_path, format!("failed to extract {}: {}", relative_path.display(), e)))?;
            written += 1;
        }

        Ok(written)
    }

    /// Entry path relative to the destination, after stripping.
    ///
    /// `Ok(None)` means the entry lies entirely inside the stripped prefix.
    fn relative_path(&self, archive_path: &Path, entry_path: &Path) -> Result<Option<PathBuf>> {
        let mut components = Vec::new();

        for component in entry_path.components() {
            match component {
                Component::Normal(part) => components.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(extraction_error(
                        archive_path,
                        format!("path traversal detected in archive: {}", entry_path.display()),
                    ));
                }
            }
        }

        if components.len() <= self.strip_components {
            return Ok(None);
        }

        Ok(Some(components[self.strip_components..].iter().collect()))
    }
}

/// Reject `outpath` when its closest existing ancestor resolves outside
/// `dest_canonical`, e.g. through a symlink unpacked earlier.
///
/// Checked before any directory is created, so nothing is written through
/// an escaping link.
fn ensure_inside(archive_path: &Path, dest_canonical: &Path, outpath: &Path) -> Result<()> {
    let existing = outpath
        .ancestors()
        .find(|ancestor| std::fs::symlink_metadata(ancestor).is_ok())
        .unwrap_or(outpath);

    let inside = match existing.canonicalize() {
        Ok(resolved) => resolved.starts_with(dest_canonical),
        // Dangling symlink
        Err(_) => false,
    };

    if !inside {
        return Err(extraction_error(
            archive_path,
            format!("path traversal detected in archive: {} escapes the destination", outpath.display()),
        ));
    }

    Ok(())
}

fn extraction_error(archive: &Path, reason: impl Into<String>) -> InstallError {
    InstallError::Extraction {
        archive: archive.to_path_buf(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(content).unwrap();
        }
        let bytes = writer.finish().unwrap().into_inner();
        std::fs::write(path, bytes).unwrap();
    }

    #[test]
    fn test_archive_type_from_path() {
        assert_eq!(
            ArchiveType::from_path(Path::new("flex_sdk_4.6.zip")),
            Some(ArchiveType::Zip)
        );
        assert_eq!(
            ArchiveType::from_path(Path::new("sdk.tar.gz")),
            Some(ArchiveType::TarGz)
        );
        assert_eq!(
            ArchiveType::from_path(Path::new("sdk.tgz")),
            Some(ArchiveType::TarGz)
        );
        assert_eq!(
            ArchiveType::from_path(Path::new("sdk.tar.bz2")),
            Some(ArchiveType::TarBz2)
        );
        assert_eq!(
            ArchiveType::from_path(Path::new("sdk.TAR.XZ")),
            Some(ArchiveType::TarXz)
        );
        assert_eq!(
            ArchiveType::from_path(Path::new("sdk.tar")),
            Some(ArchiveType::Tar)
        );
        assert_eq!(ArchiveType::from_path(Path::new("sdk.txt")), None);
    }

    #[test]
    fn test_extract_zip_layout() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("sdk.zip");
        write_zip(&archive, &[("a.txt", b"hello\r\n"), ("sub/b.bin", &[0, 1, 2])]);

        let dest = temp_dir.path().join("out");
        let written = ArchiveExtractor::default().extract(&archive, &dest).unwrap();

        assert_eq!(written, 2);
        assert_eq!(std::fs::read(dest.join("a.txt")).unwrap(), b"hello\r\n");
        assert_eq!(std::fs::read(dest.join("sub/b.bin")).unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_extract_discards_previous_contents() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("sdk.zip");
        write_zip(&archive, &[("fresh.txt", b"new")]);

        let dest = temp_dir.path().join("out");
        std::fs::create_dir_all(&dest).unwrap();
        std::fs::write(dest.join("stale.txt"), b"old").unwrap();

        ArchiveExtractor::default().extract(&archive, &dest).unwrap();

        assert!(dest.join("fresh.txt").exists());
        assert!(!dest.join("stale.txt").exists());
    }

    #[test]
    fn test_extract_strip_components() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("sdk.zip");
        write_zip(&archive, &[("flex_sdk/bin/mxmlc", b"#!/bin/sh\n")]);

        let dest = temp_dir.path().join("out");
        ArchiveExtractor::new(1).extract(&archive, &dest).unwrap();

        assert!(dest.join("bin/mxmlc").exists());
    }

    #[test]
    fn test_extract_corrupt_zip() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("sdk.zip");
        std::fs::write(&archive, b"definitely not a zip file").unwrap();

        let err = ArchiveExtractor::default()
            .extract(&archive, &temp_dir.path().join("out"))
            .unwrap_err();

        assert!(matches!(err, InstallError::Extraction { .. }));
    }

    #[test]
    fn test_extract_missing_archive_is_extraction_error() {
        let temp_dir = TempDir::new().unwrap();
        let err = ArchiveExtractor::default()
            .extract(&temp_dir.path().join("missing.zip"), &temp_dir.path().join("out"))
            .unwrap_err();

        assert!(matches!(err, InstallError::Extraction { .. }));
    }

    #[test]
    fn test_extract_unknown_type() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("sdk.rar");
        std::fs::write(&archive, b"whatever").unwrap();

        let err = ArchiveExtractor::default()
            .extract(&archive, &temp_dir.path().join("out"))
            .unwrap_err();

        assert!(err.to_string().contains("unknown archive type"));
    }

    #[test]
    fn test_extract_tar_gz() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("sdk.tar.gz");

        let encoder = flate2::write::GzEncoder::new(File::create(&archive).unwrap(), flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        let content = b"line\r\n";
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, "docs/readme.txt", &content[..]).unwrap();
        builder.into_inner().unwrap().finish().unwrap();

        let dest = temp_dir.path().join("out");
        let written = ArchiveExtractor::default().extract(&archive, &dest).unwrap();

        assert_eq!(written, 1);
        assert_eq!(std::fs::read(dest.join("docs/readme.txt")).unwrap(), content);
    }

    #[test]
    fn test_extract_unknown_type_still_wipes_destination() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("sdk.rar");
        std::fs::write(&archive, b"whatever").unwrap();
        let dest = temp_dir.path().join("out");
        std::fs::create_dir_all(&dest).unwrap();
        std::fs::write(dest.join("stale.txt"), b"old").unwrap();

        assert!(ArchiveExtractor::default().extract(&archive, &dest).is_err());
        assert!(dest.is_dir());
        assert!(!dest.join("stale.txt").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_extract_tar_rejects_write_through_symlink() {
        let temp_dir = TempDir::new().unwrap();
        let outside = temp_dir.path().join("outside");
        std::fs::create_dir_all(&outside).unwrap();
        let archive = temp_dir.path().join("sdk.tar");

        let mut builder = tar::Builder::new(File::create(&archive).unwrap());
        let mut link = tar::Header::new_gnu();
        link.set_entry_type(tar::EntryType::Symlink);
        link.set_size(0);
        link.set_mode(0o777);
        builder.append_link(&mut link, "evil", &outside).unwrap();

        let content = b"owned";
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, "evil/pwned.txt", &content[..]).unwrap();
        builder.into_inner().unwrap();

        let err = ArchiveExtractor::default()
            .extract(&archive, &temp_dir.path().join("out"))
            .unwrap_err();

        assert!(matches!(err, InstallError::Extraction { .. }));
        assert!(err.to_string().contains("escapes the destination"));
        assert!(!outside.join("pwned.txt").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_extract_tar_rejects_dangling_symlink_parent() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("not-there");
        let archive = temp_dir.path().join("sdk.tar");

        let mut builder = tar::Builder::new(File::create(&archive).unwrap());
        let mut link = tar::Header::new_gnu();
        link.set_entry_type(tar::EntryType::Symlink);
        link.set_size(0);
        link.set_mode(0o777);
        builder.append_link(&mut link, "evil", &missing).unwrap();

        let content = b"owned";
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, "evil/sub/pwned.txt", &content[..]).unwrap();
        builder.into_inner().unwrap();

        assert!(ArchiveExtractor::default()
            .extract(&archive, &temp_dir.path().join("out"))
            .is_err());
        assert!(!missing.exists());
    }

    #[test]
    fn test_relative_path_rejects_parent_dir() {
        let extractor = ArchiveExtractor::default();
        let result = extractor.relative_path(Path::new("sdk.tar"), Path::new("../evil"));
        assert!(result.is_err());
    }

    #[test]
    fn test_relative_path_inside_stripped_prefix() {
        let extractor = ArchiveExtractor::new(1);
        let result = extractor.relative_path(Path::new("sdk.tar"), Path::new("flex_sdk/")).unwrap();
        assert!(result.is_none());
    }
}
