//! Stager - replaces the installation directory with the extracted tree.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::{InstallError, Result};

/// Copies a normalized scratch tree over the installation directory.
///
/// There are no merge semantics: the installation directory is deleted and
/// recreated before the copy.
#[derive(Debug, Clone)]
pub struct Stager {
    scratch_dir: PathBuf,
    install_dir: PathBuf,
}

impl Stager {
    pub fn new(scratch_dir: impl Into<PathBuf>, install_dir: impl Into<PathBuf>) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
            install_dir: install_dir.into(),
        }
    }

    /// Wipe the installation directory and copy the scratch tree into it.
    ///
    /// Returns the number of files copied. Call [`Stager::verify`] afterwards.
    pub async fn stage(&self) -> Result<u64> {
        self.reset_install_dir()?;
        let copied = self.copy().await?;
        log::debug!("Copied {} files into {}", copied, self.install_dir.display());
        Ok(copied)
    }

    fn reset_install_dir(&self) -> Result<()> {
        if self.install_dir.exists() {
            std::fs::remove_dir_all(&self.install_dir).map_err(|e| {
                InstallError::StagingCopy(format!("cannot remove {}: {}", self.install_dir.display(), e))
            })?;
        }
        std::fs::create_dir_all(&self.install_dir)?;
        Ok(())
    }

    async fn copy(&self) -> Result<u64> {
        let src = self.scratch_dir.clone();
        let dst = self.install_dir.clone();

        tokio::task::spawn_blocking(move || copy_tree(&src, &dst))
            .await
            .map_err(|e| InstallError::StagingCopy(e.to_string()))?
            .map_err(|e| InstallError::StagingCopy(e.to_string()))
    }

    /// List the installation directory; it must hold at least one entry
    pub async fn verify(&self) -> Result<usize> {
        let verify_error = |source| InstallError::StagingVerify {
            path: self.install_dir.clone(),
            source,
        };

        let mut entries = tokio::fs::read_dir(&self.install_dir).await.map_err(verify_error)?;
        let mut count = 0;
        while entries.next_entry().await.map_err(verify_error)?.is_some() {
            count += 1;
        }

        if count == 0 {
            return Err(InstallError::EmptyInstall(self.install_dir.clone()));
        }

        Ok(count)
    }
}

/// Recursively copy the contents of `src` into `dst`, returning the file count
pub fn copy_tree(src: &Path, dst: &Path) -> std::io::Result<u64> {
    let mut copied = 0;

    for entry in WalkDir::new(src).min_depth(1) {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        let target = dst.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            std::fs::create_dir_all(&target)?;
            continue;
        }

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }

        #[cfg(unix)]
        if file_type.is_symlink() {
            let link = std::fs::read_link(entry.path())?;
            std::os::unix::fs::symlink(link, &target)?;
            copied += 1;
            continue;
        }

        std::fs::copy(entry.path(), &target)?;
        copied += 1;
    }

    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn scratch_with(files: &[(&str, &[u8])]) -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        let scratch = temp_dir.path().join("extractions");
        std::fs::create_dir_all(&scratch).unwrap();
        for (name, content) in files {
            let path = scratch.join(name);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }
        temp_dir
    }

    #[tokio::test]
    async fn test_stage_copies_tree() {
        let temp_dir = scratch_with(&[("bin/mxmlc", b"#!/bin/sh\n"), ("frameworks/flex-config.xml", b"<xml/>")]);
        let install = temp_dir.path().join("lib/flex_sdk");
        let stager = Stager::new(temp_dir.path().join("extractions"), &install);

        let copied = stager.stage().await.unwrap();

        assert_eq!(copied, 2);
        assert_eq!(stager.verify().await.unwrap(), 2);
        assert_eq!(std::fs::read(install.join("bin/mxmlc")).unwrap(), b"#!/bin/sh\n");
        assert!(install.join("frameworks/flex-config.xml").exists());
    }

    #[tokio::test]
    async fn test_stage_removes_previous_install() {
        let temp_dir = scratch_with(&[("bin/mxmlc", b"new")]);
        let install = temp_dir.path().join("lib/flex_sdk");
        std::fs::create_dir_all(install.join("old")).unwrap();
        std::fs::write(install.join("old/leftover.txt"), b"stale").unwrap();

        Stager::new(temp_dir.path().join("extractions"), &install)
            .stage()
            .await
            .unwrap();

        assert!(!install.join("old").exists());
        assert!(install.join("bin/mxmlc").exists());
    }

    #[tokio::test]
    async fn test_stage_empty_scratch_fails_verification() {
        let temp_dir = scratch_with(&[]);
        let install = temp_dir.path().join("lib/flex_sdk");

        let stager = Stager::new(temp_dir.path().join("extractions"), &install);

        assert_eq!(stager.stage().await.unwrap(), 0);
        let err = stager.verify().await.unwrap_err();
        assert!(matches!(err, InstallError::EmptyInstall(_)));
    }

    #[tokio::test]
    async fn test_stage_missing_scratch_is_copy_error() {
        let temp_dir = TempDir::new().unwrap();

        let err = Stager::new(temp_dir.path().join("missing"), temp_dir.path().join("install"))
            .stage()
            .await
            .unwrap_err();

        assert!(matches!(err, InstallError::StagingCopy(_)));
    }

    #[tokio::test]
    async fn test_verify_missing_install_dir() {
        let temp_dir = TempDir::new().unwrap();
        let stager = Stager::new(temp_dir.path(), temp_dir.path().join("nowhere"));

        assert!(matches!(
            stager.verify().await.unwrap_err(),
            InstallError::StagingVerify { .. }
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_tree_preserves_symlinks() {
        let temp_dir = scratch_with(&[("lib/real.jar", b"jar")]);
        let scratch = temp_dir.path().join("extractions");
        std::os::unix::fs::symlink("real.jar", scratch.join("lib/alias.jar")).unwrap();

        let dst = temp_dir.path().join("copy");
        let copied = copy_tree(&scratch, &dst).unwrap();

        assert_eq!(copied, 2);
        assert_eq!(std::fs::read_link(dst.join("lib/alias.jar")).unwrap(), Path::new("real.jar"));
    }
}
