//! Install command - download, normalize and stage the Flex SDK.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use flex_installer::cli::{Output, Verbosity};
use flex_installer::{InstallError, SdkInstaller};

use crate::config::{FlexConfig, Overrides};

#[derive(Args, Debug)]
pub struct InstallArgs {
    /// URL of the SDK archive
    #[arg(long)]
    pub url: Option<String>,

    /// Directory receiving the SDK (default: <package-root>/lib/flex_sdk)
    #[arg(long)]
    pub install_dir: Option<PathBuf>,

    /// Cache root for downloads and extractions
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Package root holding install.log (default: current directory)
    #[arg(long)]
    pub package_root: Option<PathBuf>,

    /// HTTP proxy for every request
    #[arg(long)]
    pub proxy: Option<String>,

    /// Drop this many leading path components from archive entries
    #[arg(long)]
    pub strip_components: Option<usize>,

    /// Disable progress output
    #[arg(long)]
    pub no_progress: bool,
}

impl InstallArgs {
    fn overrides(&self) -> Overrides {
        Overrides {
            url: self.url.clone(),
            package_root: self.package_root.clone(),
            install_dir: self.install_dir.clone(),
            cache_dir: self.cache_dir.clone(),
            proxy: self.proxy.clone(),
            strip_components: self.strip_components,
            no_progress: self.no_progress,
        }
    }
}

pub async fn execute(args: InstallArgs, config: FlexConfig, verbosity: Verbosity) -> Result<i32> {
    let cwd = std::env::current_dir().context("Failed to determine the working directory")?;
    let install_config = config.resolve(&args.overrides(), &cwd)?;

    log::debug!("Resolved install configuration: {:?}", install_config);

    let output = Output::new().with_verbosity(verbosity);
    let installer = SdkInstaller::new(install_config, output)?;

    let report = match installer.run().await {
        Ok(report) => report,
        Err(e) => {
            if let InstallError::Normalization { log_file: Some(log_file), .. } = &e {
                installer
                    .output()
                    .error(&format!("Check \"{}\" for more details!", log_file.display()));
            }
            return Err(e).with_context(|| format!("Flex SDK install failed while {}", installer.stage()));
        }
    };

    let output = installer.output();
    output.verbose(&format!(
        "{} files staged into {}",
        report.files_staged,
        installer.config().artifact.install_dir.display()
    ));
    for (name, path) in &report.binaries {
        output.verbose(&format!("  {} -> {}", name, path.display()));
    }

    Ok(0)
}
