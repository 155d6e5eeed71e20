use super::*;
use std::collections::HashMap;
use std::fs;
use tempfile::TempDir;

fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn test_redirect_defaults() {
    let config = RedirectConfig::default();
    assert_eq!(config.initial_capacity, 1024);
    assert!(!config.flush_partial_on_shutdown);
    assert!(!config.strip_carriage_return);
    assert!(config.validate().is_ok());
}

#[test]
fn test_zero_capacity_is_rejected() {
    let config = RedirectConfig::default().with_initial_capacity(0);
    assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
}

#[test]
fn test_launcher_defaults_from_empty_toml() {
    let config = LauncherConfig::from_toml_str("").unwrap();
    assert_eq!(config, LauncherConfig::default());
    assert_eq!(config.log_file, PathBuf::from("logfile.txt"));
    assert_eq!(config.flush_interval(), Duration::from_secs(10));
    assert_eq!(config.capture, vec![Channel::Stderr, Channel::Log]);
}

#[test]
fn test_load_toml_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("linetap.toml");
    fs::write(
        &path,
        r#"
log_file = "out/capture.log"
flush_interval_secs = 2
capture = ["stdout", "log"]

[redirect]
initial_capacity = 64
flush_partial_on_shutdown = true
"#,
    )
    .unwrap();

    let config = LauncherConfig::load(&path).unwrap();
    assert_eq!(config.log_file, PathBuf::from("out/capture.log"));
    assert_eq!(config.flush_interval_secs, 2);
    assert_eq!(config.capture, vec![Channel::Stdout, Channel::Log]);
    assert_eq!(config.redirect.initial_capacity, 64);
    assert!(config.redirect.flush_partial_on_shutdown);
    assert!(!config.redirect.strip_carriage_return);
}

#[test]
fn test_load_missing_file_reports_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.toml");
    let err = LauncherConfig::load(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
    assert!(err.to_string().contains("absent.toml"));
}

#[test]
fn test_load_invalid_toml() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, "capture = [\"nowhere\"]").unwrap();
    assert!(matches!(
        LauncherConfig::load(&path),
        Err(ConfigError::Parse { .. })
    ));
}

#[test]
fn test_env_overrides() {
    let config = LauncherConfig::default()
        .apply_overrides_from(lookup_from(&[
            (ENV_LOG_FILE, "/tmp/other.log"),
            (ENV_FLUSH_INTERVAL_SECS, " 3 "),
            (ENV_INITIAL_CAPACITY, "4096"),
        ]))
        .unwrap();

    assert_eq!(config.log_file, PathBuf::from("/tmp/other.log"));
    assert_eq!(config.flush_interval_secs, 3);
    assert_eq!(config.redirect.initial_capacity, 4096);
}

#[test]
fn test_env_override_with_bad_number() {
    let err = LauncherConfig::default()
        .apply_overrides_from(lookup_from(&[(ENV_FLUSH_INTERVAL_SECS, "soon")]))
        .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == ENV_FLUSH_INTERVAL_SECS));
}

#[test]
fn test_launcher_validate() {
    let mut config = LauncherConfig::default();
    assert!(config.validate().is_ok());

    config.flush_interval_secs = 0;
    assert!(config.validate().is_err());
}
