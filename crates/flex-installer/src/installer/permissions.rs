//! Restores the executable bit on indexed launchers.
//!
//! Archive extraction does not always carry over file modes, so after the
//! index is refreshed every launcher lacking owner-execute gets `0o755`.

use std::path::{Path, PathBuf};

use crate::installer::BinaryIndex;
use crate::platform::Platform;
use crate::Result;

pub struct PermissionFixer {
    platform: Platform,
}

impl PermissionFixer {
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }

    /// Make every indexed binary owner-executable.
    ///
    /// Returns the paths whose mode was changed; empty on Windows.
    pub async fn fix(&self, index: &BinaryIndex) -> Result<Vec<PathBuf>> {
        if self.platform.is_windows() {
            return Ok(Vec::new());
        }

        let mut fixed = Vec::new();
        for path in index.values() {
            if Self::ensure_executable(path).await? {
                log::debug!("Fixed file permissions for {}", path.display());
                fixed.push(path.clone());
            }
        }

        Ok(fixed)
    }

    #[cfg(unix)]
    async fn ensure_executable(path: &Path) -> Result<bool> {
        use std::os::unix::fs::PermissionsExt;

        const OWNER_EXECUTE: u32 = 0o100;
        const EXECUTABLE_MODE: u32 = 0o755;

        let metadata = tokio::fs::metadata(path).await?;
        if metadata.permissions().mode() & OWNER_EXECUTE != 0 {
            return Ok(false);
        }

        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(EXECUTABLE_MODE)).await?;
        Ok(true)
    }

    #[cfg(not(unix))]
    async fn ensure_executable(_path: &Path) -> Result<bool> {
        Ok(false)
    }
}
