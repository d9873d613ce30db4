//! Binary registry - indexes the SDK launchers by logical name.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::platform::Platform;
use crate::{InstallError, Result};

/// Logical binary name (e.g. `mxmlc`) to absolute launcher path
pub type BinaryIndex = IndexMap<String, PathBuf>;

/// Index of the executables found under `<install_dir>/bin`.
///
/// The index is stale until [`BinaryRegistry::refresh`] has run; every
/// refresh rescans the directory and replaces the previous index.
#[derive(Debug)]
pub struct BinaryRegistry {
    bin_dir: PathBuf,
    platform: Platform,
    index: Option<BinaryIndex>,
}

impl BinaryRegistry {
    pub fn new(install_dir: impl AsRef<Path>, platform: Platform) -> Self {
        Self {
            bin_dir: install_dir.as_ref().join("bin"),
            platform,
            index: None,
        }
    }

    /// Directory holding the SDK launchers
    pub fn bin_dir(&self) -> &Path {
        &self.bin_dir
    }

    /// Rescan the bin directory and rebuild the index from scratch
    pub fn refresh(&mut self) -> Result<&BinaryIndex> {
        let index = self.scan()?;
        log::debug!("Indexed {} binaries in {}", index.len(), self.bin_dir.display());
        Ok(self.index.insert(index))
    }

    /// The current index; fails until the first refresh
    pub fn index(&self) -> Result<&BinaryIndex> {
        self.index.as_ref().ok_or(InstallError::StaleIndex)
    }

    /// Resolve a logical binary name
    pub fn get(&self, name: &str) -> Result<Option<&Path>> {
        Ok(self.index()?.get(name).map(PathBuf::as_path))
    }

    fn scan(&self) -> Result<BinaryIndex> {
        let mut index = BinaryIndex::new();

        if !self.bin_dir.is_dir() {
            return Ok(index);
        }

        let bin_dir = self.bin_dir.canonicalize()?;
        let mut entries: Vec<PathBuf> = std::fs::read_dir(&bin_dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect();
        entries.sort();

        let extensions = self.platform.executable_extensions();

        for path in entries {
            let Some(name) = path.file_stem().map(|stem| stem.to_string_lossy().to_string()) else {
                continue;
            };

            let is_launcher = match path.extension() {
                Some(ext) => extensions
                    .iter()
                    .any(|wanted| ext.to_string_lossy().eq_ignore_ascii_case(wanted)),
                None => extensions.is_empty(),
            };

            if is_launcher {
                index.entry(name).or_insert(path);
            }
        }

        Ok(index)
    }
}
