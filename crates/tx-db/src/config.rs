use std::env;
use std::path::PathBuf;

/// Database configuration.
///
/// Reads from the `TX_DB_PATH` environment variable, falling back to a
/// platform data directory when unset.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Filesystem path to the SQLite database file.
    pub database_path: PathBuf,
}

impl DbConfig {
    /// Build a config from the environment.
    ///
    /// Priority: `TX_DB_PATH` env var, then the platform data directory
    /// (`dirs::data_dir()/tx/tx.db`), then `./tx.db` if no data directory
    /// can be determined.
    pub fn from_env() -> Self {
        let database_path = env::var_os("TX_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(Self::default_path);
        Self { database_path }
    }

    /// Build a config from an explicit path (useful for tests and CLI flags).
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: database_path.into(),
        }
    }

    fn default_path() -> PathBuf {
        match dirs::data_dir() {
            Some(mut dir) => {
                dir.push("tx");
                dir.push("tx.db");
                dir
            }
            None => PathBuf::from("tx.db"),
        }
    }

    /// Return a `sqlite://` connection URL for this path, creating the file
    /// if it does not already exist.
    pub fn connection_url(&self) -> String {
        format!("sqlite://{}?mode=rwc", self.database_path.display())
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn explicit_new() {
        let cfg = DbConfig::new("/tmp/somewhere/tx.db");
        assert_eq!(cfg.database_path, PathBuf::from("/tmp/somewhere/tx.db"));
    }

    #[test]
    fn connection_url_formats_as_sqlite_rwc() {
        let cfg = DbConfig::new("/tmp/somewhere/tx.db");
        assert_eq!(cfg.connection_url(), "sqlite:///tmp/somewhere/tx.db?mode=rwc");
    }

    #[test]
    fn from_env_honors_tx_db_path() {
        let _guard = ENV_LOCK.lock().unwrap();
        unsafe {
            env::set_var("TX_DB_PATH", "/tmp/explicit/tx.db");
        }
        let cfg = DbConfig::from_env();
        unsafe {
            env::remove_var("TX_DB_PATH");
        }
        assert_eq!(cfg.database_path, PathBuf::from("/tmp/explicit/tx.db"));
    }

    #[test]
    fn from_env_falls_back_to_default_when_unset() {
        let _guard = ENV_LOCK.lock().unwrap();
        unsafe {
            env::remove_var("TX_DB_PATH");
        }
        let cfg = DbConfig::from_env();
        assert!(cfg.database_path.ends_with("tx.db"));
    }
}
