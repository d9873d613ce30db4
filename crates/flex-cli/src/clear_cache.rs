//! Clear-cache command - remove cached archives and leftover extractions.

use anyhow::{Context, Result};
use clap::Args;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use flex_installer::cli::{format_bytes, Output, Verbosity};

use crate::config::{FlexConfig, Overrides};

#[derive(Args, Debug)]
pub struct ClearCacheArgs {
    /// Only clear downloaded archives
    #[arg(long)]
    pub downloads: bool,

    /// Only clear the scratch extraction directory
    #[arg(long)]
    pub extractions: bool,

    /// Cache root to clear
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,
}

pub async fn execute(args: ClearCacheArgs, config: FlexConfig, verbosity: Verbosity) -> Result<i32> {
    let output = Output::new().with_verbosity(verbosity);
    let cwd = std::env::current_dir().context("Failed to determine the working directory")?;
    let overrides = Overrides {
        cache_dir: args.cache_dir,
        ..Overrides::default()
    };
    let cache_root = config.cache_root(&overrides, &config.package_root(&overrides, &cwd));

    if !cache_root.exists() {
        output.info(&format!("Cache directory does not exist: {}", cache_root.display()));
        return Ok(0);
    }

    let clear_all = !args.downloads && !args.extractions;
    let mut total_freed: u64 = 0;

    output.info(&format!("Clearing cache at {}...", cache_root.display()));

    if clear_all || args.downloads {
        total_freed += clear_cache_dir(&cache_root.join("downloads"), "downloads", &output).await?;
    }

    if clear_all || args.extractions {
        total_freed += clear_cache_dir(&cache_root.join("extractions"), "extractions", &output).await?;
    }

    output.success(&format!("Cache cleared. Freed {}", format_bytes(total_freed)));

    Ok(0)
}

/// Remove a cache directory, returning the bytes it held
async fn clear_cache_dir(path: &Path, name: &str, output: &Output) -> Result<u64> {
    if !path.exists() {
        output.writeln(&format!("  {}: not present", name));
        return Ok(0);
    }

    let size = dir_size(path);
    tokio::fs::remove_dir_all(path)
        .await
        .with_context(|| format!("Failed to clear {} cache", name))?;

    output.writeln(&format!("  {}: cleared ({})", name, format_bytes(size)));
    Ok(size)
}

fn dir_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|metadata| metadata.len())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn quiet() -> Output {
        Output::new().with_verbosity(Verbosity::Quiet)
    }

    #[test]
    fn test_dir_size() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir_all(temp_dir.path().join("nested")).unwrap();
        std::fs::write(temp_dir.path().join("a.zip"), vec![0u8; 100]).unwrap();
        std::fs::write(temp_dir.path().join("nested/b"), vec![0u8; 24]).unwrap();

        assert_eq!(dir_size(temp_dir.path()), 124);
    }

    #[tokio::test]
    async fn test_clear_cache_dir() {
        let temp_dir = TempDir::new().unwrap();
        let downloads = temp_dir.path().join("downloads");
        std::fs::create_dir_all(&downloads).unwrap();
        std::fs::write(downloads.join("flex_sdk_4.6.zip"), vec![0u8; 64]).unwrap();

        let freed = clear_cache_dir(&downloads, "downloads", &quiet()).await.unwrap();

        assert_eq!(freed, 64);
        assert!(!downloads.exists());
    }

    #[tokio::test]
    async fn test_clear_missing_cache_dir() {
        let temp_dir = TempDir::new().unwrap();

        let freed = clear_cache_dir(&temp_dir.path().join("extractions"), "extractions", &quiet())
            .await
            .unwrap();

        assert_eq!(freed, 0);
    }

    #[tokio::test]
    async fn test_execute_only_downloads() {
        let temp_dir = TempDir::new().unwrap();
        let cache_root = temp_dir.path().join("cache");
        std::fs::create_dir_all(cache_root.join("downloads")).unwrap();
        std::fs::create_dir_all(cache_root.join("extractions/bin")).unwrap();

        let args = ClearCacheArgs {
            downloads: true,
            extractions: false,
            cache_dir: Some(cache_root.clone()),
        };
        execute(args, FlexConfig::default(), Verbosity::Quiet).await.unwrap();

        assert!(!cache_root.join("downloads").exists());
        assert!(cache_root.join("extractions/bin").exists());
    }
}
