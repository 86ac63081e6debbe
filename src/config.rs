//! Configuration loaded from a TOML file.
//!
//! Every field has a default, so an empty file (or no file at all) gives a
//! working setup against the public portal.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::{Error, Result};

pub const DEFAULT_CONCURRENCY_LIMIT: usize = 20;
pub const DEFAULT_OUTAGE_THRESHOLD: usize = 3;
pub const DEFAULT_START: u32 = 1;
pub const DEFAULT_END: u32 = 1000;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub portal: PortalConfig,
    pub batch: BatchConfig,
    pub logging: LoggingConfig,
    pub export: ExportConfig,
}

/// Where the portal lives and how to talk to it.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    pub base_url: String,
    /// Page requested first to obtain a session cookie.
    pub session_path: String,
    /// Endpoint the process query is posted to.
    pub query_path: String,
    /// Form field carrying the canonical identifier.
    pub query_field: String,
    pub session_timeout_secs: u64,
    /// The portal gets slow under load, so the query gets more time than the session.
    pub query_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: "https://protocolo.prefeitura.example.gov.br".to_string(),
            session_path: "/consulta".to_string(),
            query_path: "/consulta/processo".to_string(),
            query_field: "processo".to_string(),
            session_timeout_secs: 10,
            query_timeout_secs: 30,
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl PortalConfig {
    pub fn session_url(&self) -> String {
        join_url(&self.base_url, &self.session_path)
    }

    pub fn query_url(&self) -> String {
        join_url(&self.base_url, &self.query_path)
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub concurrency_limit: usize,
    /// Consecutive connection failures that declare the origin down.
    pub outage_threshold: usize,
    pub default_start: u32,
    pub default_end: u32,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: DEFAULT_CONCURRENCY_LIMIT,
            outage_threshold: DEFAULT_OUTAGE_THRESHOLD,
            default_start: DEFAULT_START,
            default_end: DEFAULT_END,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub output_dir: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(Error::Config(msg.to_string()));
        if self.portal.base_url.trim().is_empty() {
            return invalid("portal.base_url must not be empty");
        }
        if self.portal.query_field.trim().is_empty() {
            return invalid("portal.query_field must not be empty");
        }
        if self.portal.session_timeout_secs == 0 || self.portal.query_timeout_secs == 0 {
            return invalid("portal timeouts must be greater than zero");
        }
        if self.batch.concurrency_limit == 0 {
            return invalid("batch.concurrency_limit must be greater than zero");
        }
        if self.batch.outage_threshold == 0 {
            return invalid("batch.outage_threshold must be greater than zero");
        }
        if self.batch.default_start > self.batch.default_end {
            return invalid("batch.default_start must not exceed batch.default_end");
        }
        Ok(())
    }
}

/// Reads, parses and validates a config file.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(Error::Config(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }
    let contents = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.batch.concurrency_limit, 20);
        assert_eq!(config.batch.outage_threshold, 3);
        assert_eq!(config.batch.default_start, 1);
        assert_eq!(config.batch.default_end, 1000);
        assert_eq!(config.portal.session_timeout(), Duration::from_secs(10));
        assert_eq!(config.portal.query_timeout(), Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[portal]
base_url = "http://localhost:8080/"
query_timeout_secs = 5

[batch]
concurrency_limit = 4

[logging]
json = true
"#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.portal.query_url(), "http://localhost:8080/consulta/processo");
        assert_eq!(config.portal.session_url(), "http://localhost:8080/consulta");
        assert_eq!(config.portal.query_timeout(), Duration::from_secs(5));
        assert_eq!(config.batch.concurrency_limit, 4);
        assert_eq!(config.batch.outage_threshold, 3);
        assert!(config.logging.json);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = load_config("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[batch]\nconcurrency_limit = 0").unwrap();
        assert!(matches!(load_config(file.path()), Err(Error::Config(_))));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[batch]\ndefault_start = 10\ndefault_end = 2").unwrap();
        assert!(matches!(load_config(file.path()), Err(Error::Config(_))));
    }

    #[test]
    fn test_malformed_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[batch\nconcurrency_limit = ").unwrap();
        assert!(matches!(load_config(file.path()), Err(Error::Toml(_))));
    }
}
