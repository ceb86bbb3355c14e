//! Application configuration loading for CLI defaults.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use drivedl_core::{FailurePolicy, parse_byte_rate};
use serde::Deserialize;

/// TOML-backed file configuration. Every key is optional; CLI flags win.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// Cache root for `--cache` downloads.
    pub cache_dir: Option<PathBuf>,
    /// Default proxy URL.
    pub proxy: Option<String>,
    /// Default rate limit, e.g. `"10MB"`.
    pub speed: Option<String>,
    /// Keep cookies between requests of a download.
    pub use_cookies: Option<bool>,
    /// Verify TLS certificates.
    pub verify_tls: Option<bool>,
    /// Connect timeout in seconds.
    pub connect_timeout_secs: Option<u64>,
    /// Read timeout in seconds.
    pub read_timeout_secs: Option<u64>,
    /// Folder entry cap.
    pub max_files: Option<usize>,
    /// Folder per-file failure policy.
    pub on_folder_error: Option<FailurePolicy>,
    /// API key for the folder listing API; without one, public folder pages are read.
    pub api_key: Option<String>,
}

impl FileConfig {
    /// Validates config values against runtime and CLI constraints.
    pub fn validate(&self) -> Result<()> {
        validate_timeout_secs("connect_timeout_secs", self.connect_timeout_secs)?;
        validate_timeout_secs("read_timeout_secs", self.read_timeout_secs)?;

        if let Some(max_files) = self.max_files
            && !(1..=10_000).contains(&max_files)
        {
            bail!("Invalid config value for `max_files`: {max_files}. Expected range: 1..=10000");
        }

        if let Some(speed) = self.speed.as_deref() {
            parse_byte_rate(speed)
                .with_context(|| format!("Invalid config value for `speed`: '{speed}'"))?;
        }

        if let Some(proxy) = self.proxy.as_deref()
            && proxy.trim().is_empty()
        {
            bail!("Invalid config value for `proxy`: must not be empty");
        }

        Ok(())
    }
}

fn validate_timeout_secs(field: &str, value: Option<u64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=3600).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..=3600");
    }
    Ok(())
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/drivedl/config.toml`
/// 2. `$HOME/.config/drivedl/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("drivedl")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("drivedl")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads config from the default path, or an empty config if there is none.
pub fn load_default_file_config() -> Result<FileConfig> {
    match resolve_default_config_path() {
        Some(path) if path.exists() => load_file_config(&path),
        _ => Ok(FileConfig::default()),
    }
}

/// Loads and validates the config at `path`.
pub fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let config: FileConfig = toml::from_str(raw)?;
    config.validate()?;
    Ok(config)
}
