//! Configuration loading and data folder resolution
//!
//! Priority order for the data folder:
//! 1. Command-line argument (highest priority)
//! 2. `FIELDMAP_DATA_FOLDER` environment variable
//! 3. `data_folder` in the TOML config file
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing or unreadable TOML file never stops startup; it logs a warning
//! and falls back to defaults.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable overriding the data folder
pub const DATA_FOLDER_ENV: &str = "FIELDMAP_DATA_FOLDER";

/// Compiled fallback values used when nothing else is configured
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub data_folder: PathBuf,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
    pub bind_address: String,
    pub geocode_cooldown_ms: u64,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        Self {
            data_folder: default_data_folder(),
            log_level: "info".to_string(),
            log_file: None,
            bind_address: "127.0.0.1".to_string(),
            geocode_cooldown_ms: 250,
        }
    }
}

/// `[logging]` table of the TOML config
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

fn default_log_level() -> String {
    CompiledDefaults::for_current_platform().log_level
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::from_defaults(&CompiledDefaults::for_current_platform())
    }
}

impl LoggingConfig {
    pub fn from_defaults(defaults: &CompiledDefaults) -> Self {
        Self {
            level: defaults.log_level.clone(),
            file: defaults.log_file.clone(),
        }
    }
}

/// Contents of `fieldmap.toml`
///
/// Every field is optional so older files keep parsing as fields are added.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_folder: Option<PathBuf>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tomtom_api_key: Option<String>,
    /// Pause after every geocode request, in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geocode_cooldown_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind_address: Option<String>,
}

impl TomlConfig {
    /// Starter config spelling out every compiled default
    ///
    /// The API key is left unset; it has no default.
    pub fn from_defaults(defaults: &CompiledDefaults) -> Self {
        Self {
            data_folder: Some(defaults.data_folder.clone()),
            logging: LoggingConfig::from_defaults(defaults),
            tomtom_api_key: None,
            geocode_cooldown_ms: Some(defaults.geocode_cooldown_ms),
            bind_address: Some(defaults.bind_address.clone()),
        }
    }
}

/// Default location of the TOML config (`~/.config/fieldmap/fieldmap.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("fieldmap").join("fieldmap.toml"))
}

/// Read and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed ({}): {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))
}

/// Load the TOML config, degrading to defaults on any failure
pub fn load_toml_config_or_default(path: Option<&Path>) -> TomlConfig {
    let Some(path) = path else {
        debug!("No config path available, using defaults");
        return TomlConfig::default();
    };

    if !path.exists() {
        warn!("Config file not found: {} (using defaults)", path.display());
        return TomlConfig::default();
    }

    match load_toml_config(path) {
        Ok(config) => {
            info!("Loaded config from {}", path.display());
            config
        }
        Err(e) => {
            warn!("{} (using defaults)", e);
            TomlConfig::default()
        }
    }
}

/// Write the TOML config atomically (temp file + rename)
///
/// On Unix the file is restricted to 0600 since it may hold an API key.
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, content)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(0o600))?;
    }

    if let Err(e) = std::fs::rename(&temp_path, path) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(e.into());
    }

    debug!("Wrote config to {}", path.display());
    Ok(())
}

/// Write a starter config to `path` unless a file is already there
///
/// Returns `true` when a new file was written.
pub fn ensure_toml_config(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    let starter = TomlConfig::from_defaults(&CompiledDefaults::for_current_platform());
    write_toml_config(&starter, path)?;
    Ok(true)
}

/// Resolves the data folder from CLI, environment, TOML and compiled defaults
#[derive(Debug, Clone, Default)]
pub struct DataFolderResolver {
    cli_arg: Option<PathBuf>,
    toml_folder: Option<PathBuf>,
}

impl DataFolderResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cli_arg(mut self, cli_arg: Option<PathBuf>) -> Self {
        self.cli_arg = cli_arg;
        self
    }

    pub fn with_toml(mut self, config: &TomlConfig) -> Self {
        self.toml_folder = config.data_folder.clone();
        self
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            info!("Data folder from command line: {}", path.display());
            return path.clone();
        }

        if let Ok(path) = std::env::var(DATA_FOLDER_ENV) {
            if !path.trim().is_empty() {
                info!("Data folder from {}: {}", DATA_FOLDER_ENV, path);
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &self.toml_folder {
            info!("Data folder from TOML config: {}", path.display());
            return path.clone();
        }

        let path = CompiledDefaults::for_current_platform().data_folder;
        info!("Data folder from compiled default: {}", path.display());
        path
    }
}

/// Creates the data folder on first start
#[derive(Debug, Clone)]
pub struct DataFolderInitializer {
    data_folder: PathBuf,
}

impl DataFolderInitializer {
    pub fn new(data_folder: PathBuf) -> Self {
        Self { data_folder }
    }

    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.data_folder.exists() {
            info!("Creating data folder: {}", self.data_folder.display());
            std::fs::create_dir_all(&self.data_folder)?;
        }
        if !self.data_folder.is_dir() {
            return Err(Error::Config(format!(
                "Data folder is not a directory: {}",
                self.data_folder.display()
            )));
        }
        Ok(())
    }

    pub fn data_folder(&self) -> &Path {
        &self.data_folder
    }
}

/// OS-dependent default data folder
fn default_data_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("fieldmap"))
        .unwrap_or_else(|| PathBuf::from("./fieldmap_data"))
}
