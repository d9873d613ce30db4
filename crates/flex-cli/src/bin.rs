//! Bin command - list the launchers of the installed SDK, or resolve one.

use anyhow::{bail, Context, Result};
use clap::Args;
use std::collections::BTreeMap;
use std::path::PathBuf;

use flex_installer::cli::{Output, Verbosity};
use flex_installer::{BinaryRegistry, Platform};

use crate::config::{FlexConfig, Overrides};

#[derive(Args, Debug)]
pub struct BinArgs {
    /// Print the path of this binary only
    pub name: Option<String>,

    /// Installation directory to inspect
    #[arg(long)]
    pub install_dir: Option<PathBuf>,

    /// Package root (default: current directory)
    #[arg(long)]
    pub package_root: Option<PathBuf>,

    /// Print the binary index as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn execute(args: BinArgs, config: FlexConfig, verbosity: Verbosity) -> Result<i32> {
    let cwd = std::env::current_dir().context("Failed to determine the working directory")?;
    let overrides = Overrides {
        install_dir: args.install_dir,
        package_root: args.package_root,
        ..Overrides::default()
    };
    let package_root = config.package_root(&overrides, &cwd);
    let install_dir = config.install_dir(&overrides, &package_root);

    if !install_dir.is_dir() {
        bail!(
            "The Flex SDK is not installed at {}. Run `flex-sdk install` first.",
            install_dir.display()
        );
    }

    let output = Output::new().with_verbosity(verbosity).with_json_mode(args.json);

    let mut registry = BinaryRegistry::new(&install_dir, Platform::current());
    let bin_dir = registry.bin_dir().to_path_buf();
    registry
        .refresh()
        .with_context(|| format!("Failed to index {}", install_dir.display()))?;

    if let Some(name) = &args.name {
        let Some(path) = registry.get(name)? else {
            bail!("No binary named '{}' in {}", name, bin_dir.display());
        };
        if output.is_json() {
            output.json(&BTreeMap::from([(name.as_str(), path)]));
        } else {
            println!("{}", path.display());
        }
        return Ok(0);
    }

    let index = registry.index()?;

    if output.is_json() {
        output.json(index);
        return Ok(0);
    }

    if index.is_empty() {
        output.warning(&format!("No binaries found in {}", bin_dir.display()));
        return Ok(0);
    }

    output.info(&format!("Binaries in {}:", bin_dir.display()));
    for (name, path) in index {
        output.list_item(name, &path.display().to_string());
    }

    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    fn installed_sdk() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        let bin_dir = temp_dir.path().join("bin");
        std::fs::create_dir_all(&bin_dir).unwrap();
        std::fs::write(bin_dir.join("mxmlc"), b"#!/bin/sh\n").unwrap();
        std::fs::write(bin_dir.join("mxmlc.bat"), b"@echo off\n").unwrap();
        temp_dir
    }

    fn args(install_dir: &Path, name: Option<&str>) -> BinArgs {
        BinArgs {
            name: name.map(str::to_string),
            install_dir: Some(install_dir.to_path_buf()),
            package_root: None,
            json: false,
        }
    }

    #[test]
    fn test_resolve_installed_binary() {
        let sdk = installed_sdk();

        let code = execute(args(sdk.path(), Some("mxmlc")), FlexConfig::default(), Verbosity::Quiet).unwrap();

        assert_eq!(code, 0);
    }

    #[test]
    fn test_resolve_unknown_binary_fails() {
        let sdk = installed_sdk();

        let err = execute(args(sdk.path(), Some("compc")), FlexConfig::default(), Verbosity::Quiet).unwrap_err();

        assert!(err.to_string().contains("No binary named 'compc'"));
    }

    #[test]
    fn test_missing_install_dir_fails() {
        let temp_dir = TempDir::new().unwrap();

        let err = execute(
            args(&temp_dir.path().join("lib/flex_sdk"), None),
            FlexConfig::default(),
            Verbosity::Quiet,
        )
        .unwrap_err();

        assert!(err.to_string().contains("not installed"));
    }
}
