//! Application settings.
//!
//! Settings come from an optional `config.toml` and are then overridden by
//! environment variables (a `.env` file is honoured via `dotenvy` in `main`).
//! Every field has a default, so an empty file or no file at all is valid.

use crate::config::database::DEFAULT_DATABASE_URL;
use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default period between scheduled backups
pub const DEFAULT_BACKUP_INTERVAL_SECS: u64 = 3600;

/// Default number of snapshot files kept on disk
pub const DEFAULT_BACKUP_MAX_FILES: usize = 168;

/// Operator label recorded when a caller does not name one
pub const DEFAULT_OPERATOR: &str = "admin";

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// `SeaORM` connection URL
    pub database_url: String,
    /// Operator recorded on audit records when none is supplied
    pub default_operator: String,
    /// Snapshot backup settings
    pub backup: BackupConfig,
}

/// The `[backup]` table
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    /// Directory holding snapshot files
    pub dir: PathBuf,
    /// Seconds between scheduled backups
    pub interval_secs: u64,
    /// Snapshot files kept after each backup, 0 keeps everything
    pub max_files: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            default_operator: DEFAULT_OPERATOR.to_string(),
            backup: BackupConfig::default(),
        }
    }
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("backups"),
            interval_secs: DEFAULT_BACKUP_INTERVAL_SECS,
            max_files: DEFAULT_BACKUP_MAX_FILES,
        }
    }
}

impl BackupConfig {
    /// Backup period as a [`Duration`], never shorter than one second
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

/// Loads settings from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    tracing::debug!("Loading configuration from {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path_ref.display()),
    })?;

    toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse {}: {e}", path_ref.display()),
    })
}

/// Loads the application settings.
///
/// Reads `CONFIG_PATH` (default `config.toml`) when that file exists, then
/// applies `DATABASE_URL`, `BACKUP_DIR`, `BACKUP_INTERVAL_SECS`,
/// `BACKUP_MAX_FILES` and `DEFAULT_OPERATOR` from the environment.
pub fn load_app_config() -> Result<AppConfig> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    let mut config = if Path::new(&path).exists() {
        load_config(&path)?
    } else {
        tracing::info!("No config file at {}, using defaults", path);
        AppConfig::default()
    };
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    Ok(config)
}

fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup("DATABASE_URL") {
        config.database_url = url;
    }
    if let Some(dir) = lookup("BACKUP_DIR") {
        config.backup.dir = PathBuf::from(dir);
    }
    if let Some(raw) = lookup("BACKUP_INTERVAL_SECS") {
        config.backup.interval_secs = parse_number("BACKUP_INTERVAL_SECS", &raw)?;
    }
    if let Some(raw) = lookup("BACKUP_MAX_FILES") {
        config.backup.max_files = parse_number("BACKUP_MAX_FILES", &raw)?;
    }
    if let Some(operator) = lookup("DEFAULT_OPERATOR") {
        config.default_operator = operator;
    }
    Ok(())
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim().parse().map_err(|_| Error::Config {
        message: format!("{key} must be a non-negative integer, got '{raw}'"),
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
            database_url = "sqlite://hall.sqlite?mode=rwc"
            default_operator = "front-desk"

            [backup]
            dir = "/var/lib/hall/backups"
            interval_secs = 600
            max_files = 10
        "#;

        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.database_url, "sqlite://hall.sqlite?mode=rwc");
        assert_eq!(config.default_operator, "front-desk");
        assert_eq!(config.backup.dir, PathBuf::from("/var/lib/hall/backups"));
        assert_eq!(config.backup.interval(), Duration::from_secs(600));
        assert_eq!(config.backup.max_files, 10);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.default_operator, DEFAULT_OPERATOR);
        assert_eq!(config.backup.interval_secs, DEFAULT_BACKUP_INTERVAL_SECS);
        assert_eq!(config.backup.max_files, DEFAULT_BACKUP_MAX_FILES);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("DATABASE_URL", "sqlite::memory:"),
            ("BACKUP_DIR", "snapshots"),
            ("BACKUP_INTERVAL_SECS", "30"),
            ("BACKUP_MAX_FILES", "0"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        apply_env_overrides(&mut config, |key| vars.get(key).map(ToString::to_string)).unwrap();

        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.backup.dir, PathBuf::from("snapshots"));
        assert_eq!(config.backup.interval_secs, 30);
        assert_eq!(config.backup.max_files, 0);
        assert_eq!(config.default_operator, DEFAULT_OPERATOR);
    }

    #[test]
    fn test_bad_env_number_is_config_error() {
        let mut config = AppConfig::default();
        let result = apply_env_overrides(&mut config, |key| {
            (key == "BACKUP_INTERVAL_SECS").then(|| "hourly".to_string())
        });
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config("/definitely/not/here.toml");
        assert!(matches!(result, Err(Error::Config { .. })));
    }
}
