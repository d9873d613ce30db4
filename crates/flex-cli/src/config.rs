use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use flex_installer::config::{default_cache_root, default_install_dir, ArtifactReference, InstallConfig};
use flex_installer::http::{HttpClientConfig, PROXY_ENV_VARS};

/// Name of the project configuration file
pub const CONFIG_FILE_NAME: &str = "flex-sdk.toml";

/// The flex-sdk.toml file structure
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FlexConfig {
    /// Where the SDK archive comes from
    pub sdk: SdkConfig,

    /// Filesystem layout
    pub paths: PathsConfig,

    /// Network settings
    pub http: HttpConfig,

    /// Terminal output
    pub output: OutputConfig,

    /// Directory holding the loaded config file
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SdkConfig {
    /// URL of the SDK archive
    pub url: Option<String>,

    /// Leading archive path components to drop
    pub strip_components: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Package root, relative to the config file
    pub package_root: Option<PathBuf>,

    /// Installation directory, relative to the package root
    pub install_dir: Option<PathBuf>,

    /// Cache root, relative to the package root
    pub cache_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub proxy: Option<String>,
    pub user_agent: Option<String>,
    /// PEM bundle of extra root certificates
    pub cafile: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Show progress bars (default: true)
    pub progress: Option<bool>,
}

/// Values given on the command line; they win over every other layer
#[derive(Debug, Default)]
pub struct Overrides {
    pub url: Option<String>,
    pub package_root: Option<PathBuf>,
    pub install_dir: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
    pub proxy: Option<String>,
    pub strip_components: Option<usize>,
    pub no_progress: bool,
}

impl FlexConfig {
    /// Load configuration from flex-sdk.toml, searching upward from the given directory
    pub fn load(start_dir: &Path) -> Result<Option<Self>> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(CONFIG_FILE_NAME);

            if config_path.exists() {
                let content = std::fs::read_to_string(&config_path)
                    .with_context(|| format!("Failed to read {}", config_path.display()))?;
                let mut config: FlexConfig = toml::from_str(&content)
                    .with_context(|| format!("Failed to parse {}", config_path.display()))?;
                config.base_dir = Some(current);
                return Ok(Some(config));
            }

            if !current.pop() {
                return Ok(None);
            }
        }
    }

    /// Load configuration by searching upward from the current working directory
    pub fn load_from_cwd() -> Result<Option<Self>> {
        let cwd = std::env::current_dir()?;
        Self::load(&cwd)
    }

    /// Apply the process environment on top of the file settings
    pub fn with_env(mut self) -> Self {
        self.apply_env(|name| std::env::var(name).ok());
        self
    }

    /// Apply environment overrides read through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(url) = lookup("FLEX_SDK_URL") {
            self.sdk.url = Some(url);
        }
        if let Some(cache_dir) = lookup("FLEX_SDK_CACHE_DIR") {
            self.paths.cache_dir = Some(PathBuf::from(cache_dir));
        }
        if let Some(install_dir) = lookup("FLEX_SDK_INSTALL_DIR") {
            self.paths.install_dir = Some(PathBuf::from(install_dir));
        }
        if let Some(proxy) = PROXY_ENV_VARS.iter().find_map(|name| lookup(*name)) {
            self.http.proxy = Some(proxy);
        }
    }

    /// Package root: the override, the configured one, or `cwd`
    pub fn package_root(&self, overrides: &Overrides, cwd: &Path) -> PathBuf {
        if let Some(root) = &overrides.package_root {
            return cwd.join(root);
        }

        match &self.paths.package_root {
            Some(root) => self.base_dir.as_deref().unwrap_or(cwd).join(root),
            None => cwd.to_path_buf(),
        }
    }

    pub fn install_dir(&self, overrides: &Overrides, package_root: &Path) -> PathBuf {
        overrides
            .install_dir
            .as_ref()
            .or(self.paths.install_dir.as_ref())
            .map(|dir| package_root.join(dir))
            .unwrap_or_else(|| default_install_dir(package_root))
    }

    pub fn cache_root(&self, overrides: &Overrides, package_root: &Path) -> PathBuf {
        overrides
            .cache_dir
            .as_ref()
            .or(self.paths.cache_dir.as_ref())
            .map(|dir| package_root.join(dir))
            .unwrap_or_else(default_cache_root)
    }

    fn http_config(&self, overrides: &Overrides) -> HttpClientConfig {
        let mut http = HttpClientConfig::new();

        if let Some(proxy) = overrides.proxy.as_ref().or(self.http.proxy.as_ref()) {
            http = http.with_proxy(proxy.clone());
        }
        if let Some(user_agent) = &self.http.user_agent {
            http = http.with_user_agent(user_agent.clone());
        }
        if let Some(cafile) = &self.http.cafile {
            http = http.with_cafile(cafile.clone());
        }

        http
    }

    /// Merge every layer into the immutable pipeline configuration
    pub fn resolve(&self, overrides: &Overrides, cwd: &Path) -> Result<InstallConfig> {
        let Some(url) = overrides.url.as_ref().or(self.sdk.url.as_ref()) else {
            bail!(
                "No Flex SDK URL configured. Pass --url, set FLEX_SDK_URL or add `url` to the [sdk] section of {}",
                CONFIG_FILE_NAME
            );
        };

        let package_root = self.package_root(overrides, cwd);
        let artifact = ArtifactReference::new(
            url.clone(),
            self.cache_root(overrides, &package_root),
            self.install_dir(overrides, &package_root),
        )?;

        let progress = !overrides.no_progress && self.output.progress.unwrap_or(true);
        let strip_components = overrides
            .strip_components
            .or(self.sdk.strip_components)
            .unwrap_or(0);

        Ok(InstallConfig::new(artifact, &package_root)
            .with_strip_components(strip_components)
            .with_http(self.http_config(overrides))
            .with_progress(progress))
    }
}
