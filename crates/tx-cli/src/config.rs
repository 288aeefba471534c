//! Configuration file management for `tx`.
//!
//! Provides a TOML config file at `~/.config/tx/config.toml` and the
//! resolution chain: CLI flag > env var > config file > platform default.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use tx_db::config::DbConfig;

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct ConfigFile {
    #[serde(default)]
    pub database: DatabaseSection,
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct DatabaseSection {
    pub path: Option<String>,
}

/// Always uses XDG layout: `$XDG_CONFIG_HOME/tx` or `~/.config/tx`. This
/// intentionally ignores the platform-specific `dirs::config_dir()`
/// (which returns `~/Library/Application Support` on macOS) to keep the
/// config file in the same place across platforms; the database's own
/// default path still uses `dirs::data_dir()`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("tx");
    }
    dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".config").join("tx")
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Load and parse the config file. `Ok(None)` if it doesn't exist;
/// malformed TOML is still a hard error.
pub fn load_config() -> Result<Option<ConfigFile>> {
    let path = config_path();
    match std::fs::read_to_string(&path) {
        Ok(contents) => {
            let config: ConfigFile = toml::from_str(&contents).context("failed to parse config file")?;
            Ok(Some(config))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("failed to read config file at {}", path.display())),
    }
}

pub fn save_config(config: &ConfigFile) -> Result<()> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir).with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents).with_context(|| format!("failed to write config file at {}", path.display()))?;
    Ok(())
}

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct TxConfig {
    pub db_config: DbConfig,
}

impl TxConfig {
    /// Resolution chain: `--db-path` flag > `TX_DB_PATH` env var >
    /// `~/.config/tx/config.toml`'s `[database] path` > platform default
    /// data directory (`dirs::data_dir()/tx/tx.db`).
    pub fn resolve(cli_db_path: Option<&str>) -> Result<Self> {
        if let Some(path) = cli_db_path {
            return Ok(Self {
                db_config: DbConfig::new(path),
            });
        }
        if std::env::var_os("TX_DB_PATH").is_some() {
            return Ok(Self {
                db_config: DbConfig::from_env(),
            });
        }
        if let Some(file_path) = load_config()?.and_then(|cfg| cfg.database.path) {
            return Ok(Self {
                db_config: DbConfig::new(file_path),
            });
        }
        Ok(Self {
            db_config: DbConfig::from_env(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_path_ends_with_expected_filename() {
        let path = config_path();
        assert!(path.ends_with("tx/config.toml"), "unexpected config path: {}", path.display());
    }

    #[test]
    fn resolve_with_cli_flag_wins() {
        let config = TxConfig::resolve(Some("/tmp/explicit-cli/tx.db")).unwrap();
        assert_eq!(config.db_config.database_path, PathBuf::from("/tmp/explicit-cli/tx.db"));
    }
}
