//! crackpool CLI configuration
//!
//! A TOML file layered over defaults. Every section is optional; missing keys
//! keep their default values.
//!
//! ```toml
//! [server]
//! listen_addr = "0.0.0.0:5555"
//! wordlist_dir = "wordlists"
//!
//! [worker]
//! server_addr = "127.0.0.1:5555"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crackpool_core::CrackpoolConfig;
use crackpool_tcp::{config::DEFAULT_LISTEN_ADDR, TcpConfig};

use crate::error::{CliError, Result};

// ----------------------------------------------------------------------------
// Application Configuration
// ----------------------------------------------------------------------------

/// Complete configuration for the crackpool binary
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Scheduler timing, round sizing and channel capacities
    pub core: CrackpoolConfig,
    pub server: ServerConfig,
    pub worker: WorkerConfig,
}

/// Settings for `crackpool serve`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    #[serde(flatten)]
    pub tcp: TcpConfig,
    /// Corpus root; without one only bruteforce jobs are scheduled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wordlist_dir: Option<PathBuf>,
}

/// Settings for `crackpool worker` and `crackpool submit`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub server_addr: String,
    /// Local copy of the scheduler's corpus, needed for wordlist jobs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wordlist_dir: Option<PathBuf>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            server_addr: DEFAULT_LISTEN_ADDR.to_string(),
            wordlist_dir: None,
        }
    }
}

// ----------------------------------------------------------------------------
// Loading and Saving
// ----------------------------------------------------------------------------

impl AppConfig {
    /// Load and validate a configuration file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_toml(&contents)?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path.as_ref(), toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.core.validate().map_err(CliError::Config)?;
        self.server.tcp.validate().map_err(CliError::Config)?;
        if self.worker.server_addr.is_empty() {
            return Err(CliError::Config(
                "Worker server address must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Example configuration file content
    pub fn example_config() -> String {
        let example = AppConfig {
            server: ServerConfig {
                tcp: TcpConfig::default().with_listen_addr("0.0.0.0:5555"),
                wordlist_dir: Some(PathBuf::from("wordlists")),
            },
            worker: WorkerConfig {
                wordlist_dir: Some(PathBuf::from("wordlists")),
                ..WorkerConfig::default()
            },
            ..AppConfig::default()
        };
        toml::to_string_pretty(&example)
            .unwrap_or_else(|_| "# Failed to generate example config".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_example_config_loads_back() {
        let example = AppConfig::example_config();
        let loaded = AppConfig::from_toml(&example).unwrap();
        assert_eq!(loaded.server.tcp.listen_addr, "0.0.0.0:5555");
        assert_eq!(loaded.worker.wordlist_dir, Some(PathBuf::from("wordlists")));
        assert_eq!(loaded.core, CrackpoolConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let loaded = AppConfig::from_toml(
            r#"
            [server]
            listen_addr = "0.0.0.0:6000"
            "#,
        )
        .unwrap();
        assert_eq!(loaded.server.tcp.listen_addr, "0.0.0.0:6000");
        assert_eq!(loaded.server.tcp.write_queue_size, TcpConfig::default().write_queue_size);
        assert_eq!(loaded.worker, WorkerConfig::default());
        assert_eq!(loaded.core.scheduler.job_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        assert!(matches!(
            AppConfig::from_toml("[worker]\nserver_addr = \"\"\n"),
            Err(CliError::Config(_))
        ));
        assert!(matches!(
            AppConfig::from_toml("[server]\nwrite_queue_size = 0\n"),
            Err(CliError::Config(_))
        ));
        assert!(matches!(
            AppConfig::from_toml("[server\n"),
            Err(CliError::TomlParsing(_))
        ));
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = std::env::temp_dir().join(format!("crackpool-config-{}", std::process::id()));
        let path = dir.join("crackpool.toml");

        let mut config = AppConfig::default();
        config.worker.server_addr = "10.0.0.2:5555".to_string();
        config.save_to_file(&path).unwrap();

        let loaded = AppConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);

        std::fs::remove_dir_all(dir).unwrap();
    }
}
