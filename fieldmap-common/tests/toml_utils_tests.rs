//! Unit tests for TOML atomic write utilities
//!
//! Covers atomic temp-file + rename writes, field preservation on
//! round-trip, 0600 permissions on Unix and starter config creation.

use fieldmap_common::config::{
    ensure_toml_config, load_toml_config, write_toml_config, CompiledDefaults, LoggingConfig,
    TomlConfig,
};
use std::path::PathBuf;
use tempfile::TempDir;

fn sample_config() -> TomlConfig {
    TomlConfig {
        data_folder: Some(PathBuf::from("/srv/fieldmap")),
        logging: LoggingConfig::default(),
        tomtom_api_key: Some("key123".to_string()),
        geocode_cooldown_ms: Some(500),
        bind_address: None,
    }
}

#[test]
fn test_atomic_write_leaves_no_temp_file() {
    let temp_dir = TempDir::new().unwrap();
    let target = temp_dir.path().join("fieldmap.toml");

    write_toml_config(&sample_config(), &target).unwrap();

    assert!(target.exists());
    assert!(!temp_dir.path().join("fieldmap.toml.tmp").exists());
}

#[test]
fn test_atomic_write_creates_parent_directories() {
    let temp_dir = TempDir::new().unwrap();
    let target = temp_dir.path().join("config").join("fieldmap").join("fieldmap.toml");

    write_toml_config(&sample_config(), &target).unwrap();
    assert!(target.exists());
}

#[test]
fn test_roundtrip_serialization_preserves_data() {
    let temp_dir = TempDir::new().unwrap();
    let target = temp_dir.path().join("fieldmap.toml");
    let config = sample_config();

    write_toml_config(&config, &target).unwrap();

    let content = std::fs::read_to_string(&target).unwrap();
    assert!(content.contains("tomtom_api_key"));
    assert!(!content.contains("bind_address"));

    let parsed = load_toml_config(&target).unwrap();
    assert_eq!(parsed, config);
}

#[test]
#[cfg(unix)]
fn test_atomic_write_sets_permissions_0600() {
    use std::os::unix::fs::PermissionsExt;

    let temp_dir = TempDir::new().unwrap();
    let target = temp_dir.path().join("fieldmap.toml");

    write_toml_config(&sample_config(), &target).unwrap();

    let mode = std::fs::metadata(&target).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}

#[test]
fn test_starter_config_written_when_missing() {
    let temp_dir = TempDir::new().unwrap();
    let target = temp_dir.path().join("fieldmap").join("fieldmap.toml");

    assert!(ensure_toml_config(&target).unwrap());

    let defaults = CompiledDefaults::for_current_platform();
    let parsed = load_toml_config(&target).unwrap();
    assert_eq!(parsed, TomlConfig::from_defaults(&defaults));
    assert_eq!(parsed.logging.level, defaults.log_level);
    assert_eq!(parsed.bind_address.as_deref(), Some("127.0.0.1"));
    assert_eq!(parsed.geocode_cooldown_ms, Some(250));
    assert!(parsed.tomtom_api_key.is_none());
}

#[test]
fn test_existing_config_is_left_alone() {
    let temp_dir = TempDir::new().unwrap();
    let target = temp_dir.path().join("fieldmap.toml");
    std::fs::write(&target, "tomtom_api_key = \"mine\"\n").unwrap();

    assert!(!ensure_toml_config(&target).unwrap());

    let content = std::fs::read_to_string(&target).unwrap();
    assert_eq!(content, "tomtom_api_key = \"mine\"\n");
}
