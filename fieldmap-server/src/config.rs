//! Service configuration for fieldmap-server
//!
//! The TomTom API key resolves ENV → TOML. The data folder itself is resolved
//! by `fieldmap_common::config::DataFolderResolver`.

use fieldmap_common::config::{CompiledDefaults, TomlConfig};
use fieldmap_common::{Error, Result};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable holding the TomTom API key
pub const TOMTOM_API_KEY_ENV: &str = "FIELDMAP_TOMTOM_API_KEY";

/// Public TomTom API host
pub const TOMTOM_BASE_URL: &str = "https://api.tomtom.com";

/// Resolve the TomTom API key from 2-tier configuration
///
/// **Priority:** ENV → TOML
pub fn resolve_tomtom_api_key(toml_config: &TomlConfig) -> Result<String> {
    let env_key = std::env::var(TOMTOM_API_KEY_ENV)
        .ok()
        .filter(|key| is_valid_key(key));
    let toml_key = toml_config
        .tomtom_api_key
        .as_ref()
        .filter(|key| is_valid_key(key));

    if env_key.is_some() && toml_key.is_some() {
        warn!(
            "TomTom API key found in multiple sources: environment, TOML. Using environment (highest priority)."
        );
    }

    if let Some(key) = env_key {
        info!("TomTom API key loaded from environment variable");
        return Ok(key);
    }

    if let Some(key) = toml_key {
        info!("TomTom API key loaded from TOML config");
        return Ok(key.clone());
    }

    Err(Error::Config(format!(
        "TomTom API key not configured. Please configure using one of:\n\
         1. Environment: {}=your-key-here\n\
         2. TOML config: ~/.config/fieldmap/fieldmap.toml (tomtom_api_key = \"your-key\")",
        TOMTOM_API_KEY_ENV
    )))
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Runtime settings for the provider gateways and the reconciler
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    /// `None` leaves the server running; provider-backed routes then fail
    pub tomtom_api_key: Option<String>,
    pub tomtom_base_url: String,
    /// Pause after every geocode request
    pub geocode_cooldown: Duration,
}

impl ServiceSettings {
    pub fn from_toml(toml_config: &TomlConfig) -> Self {
        let tomtom_api_key = match resolve_tomtom_api_key(toml_config) {
            Ok(key) => Some(key),
            Err(e) => {
                warn!("{}", e);
                None
            }
        };

        let cooldown_ms = toml_config
            .geocode_cooldown_ms
            .unwrap_or(CompiledDefaults::for_current_platform().geocode_cooldown_ms);

        Self {
            tomtom_api_key,
            tomtom_base_url: TOMTOM_BASE_URL.to_string(),
            geocode_cooldown: Duration::from_millis(cooldown_ms),
        }
    }
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            tomtom_api_key: None,
            tomtom_base_url: TOMTOM_BASE_URL.to_string(),
            geocode_cooldown: Duration::from_millis(
                CompiledDefaults::for_current_platform().geocode_cooldown_ms,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_key() {
        assert!(is_valid_key("abc"));
        assert!(!is_valid_key(""));
        assert!(!is_valid_key("  \t"));
    }

    #[test]
    fn test_default_cooldown_is_250ms() {
        assert_eq!(ServiceSettings::default().geocode_cooldown, Duration::from_millis(250));
    }
}
