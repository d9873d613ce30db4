mod bin;
mod clear_cache;
mod config;
mod install;

use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use std::process::ExitCode;

use config::FlexConfig;
use flex_installer::cli::Verbosity;

#[derive(Parser, Debug)]
#[command(name = "flex-sdk")]
#[command(about = "Download and install the Flex SDK")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Only print warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Increase verbosity (-v for details, -vv for debug logs)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Download the SDK archive and install it
    Install(install::InstallArgs),

    /// List the binaries of the installed SDK
    Bin(bin::BinArgs),

    /// Remove cached archives and extractions
    #[command(name = "clear-cache", alias = "clearcache")]
    ClearCache(clear_cache::ClearCacheArgs),
}

fn init_logging(verbosity: Verbosity) {
    let level = match verbosity {
        Verbosity::Debug => log::LevelFilter::Debug,
        Verbosity::Verbose => log::LevelFilter::Info,
        Verbosity::Normal | Verbosity::Quiet => log::LevelFilter::Warn,
    };

    // RUST_LOG, when set, overrides the flag-derived level
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();
}

fn run() -> Result<i32> {
    let args = Args::parse();
    let verbosity = Verbosity::from_flags(args.quiet, args.verbose);
    init_logging(verbosity);

    let config = FlexConfig::load_from_cwd()?.unwrap_or_default().with_env();
    if let Some(base_dir) = &config.base_dir {
        log::debug!("Using {} from {}", config::CONFIG_FILE_NAME, base_dir.display());
    }

    match args.command {
        Commands::Install(install_args) => {
            let rt = tokio::runtime::Runtime::new()
                .map_err(|e| anyhow::anyhow!("Failed to create async runtime: {}", e))?;
            rt.block_on(install::execute(install_args, config, verbosity))
        }
        Commands::Bin(bin_args) => bin::execute(bin_args, config, verbosity),
        Commands::ClearCache(clear_args) => {
            let rt = tokio::runtime::Runtime::new()
                .map_err(|e| anyhow::anyhow!("Failed to create async runtime: {}", e))?;
            rt.block_on(clear_cache::execute(clear_args, config, verbosity))
        }
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => ExitCode::from(code as u8),
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            for cause in e.chain().skip(1) {
                eprintln!("  Caused by: {}", cause);
            }
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_install_flags() {
        let args = Args::try_parse_from([
            "flex-sdk",
            "install",
            "--url",
            "http://example.com/flex_sdk.zip",
            "--no-progress",
            "-vv",
        ])
        .unwrap();

        assert_eq!(args.verbose, 2);
        match args.command {
            Commands::Install(install) => {
                assert_eq!(install.url.as_deref(), Some("http://example.com/flex_sdk.zip"));
                assert!(install.no_progress);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_bin_name() {
        let args = Args::try_parse_from(["flex-sdk", "bin", "mxmlc", "--json"]).unwrap();
        assert!(matches!(args.command, Commands::Bin(ref b) if b.name.as_deref() == Some("mxmlc") && b.json));
    }

    #[test]
    fn test_parse_clear_cache_alias() {
        let args = Args::try_parse_from(["flex-sdk", "clearcache", "--downloads"]).unwrap();
        assert!(matches!(args.command, Commands::ClearCache(ref c) if c.downloads));
    }
}
