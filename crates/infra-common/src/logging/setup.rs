use serde::Deserialize;
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

use crate::errors::types::{Error, Result};

/// Subscriber settings, usually the `[logging]` table of a config file
///
/// `filter` takes `tracing-subscriber` directives such as
/// `"info,sipmedia_media_core=debug"`. A non-empty `RUST_LOG` replaces it.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub filter: String,
    pub json: bool,
    pub file_info: bool,
    /// Name reported in the startup line
    pub app_name: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: Level::INFO.to_string().to_lowercase(),
            json: false,
            file_info: false,
            app_name: "sipmedia".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Log everything at `level` and above
    pub fn new(level: Level, app_name: impl Into<String>) -> Self {
        Self {
            filter: level.to_string().to_lowercase(),
            app_name: app_name.into(),
            ..Default::default()
        }
    }

    /// Replace the filter directives
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    pub fn with_json(mut self) -> Self {
        self.json = true;
        self
    }

    pub fn with_file_info(mut self) -> Self {
        self.file_info = true;
        self
    }

    /// Filter the subscriber will use, `RUST_LOG` first
    pub fn env_filter(&self) -> Result<EnvFilter> {
        let directives = std::env::var(EnvFilter::DEFAULT_ENV)
            .ok()
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| self.filter.clone());

        EnvFilter::try_new(&directives)
            .map_err(|e| Error::Config(format!("invalid log filter {:?}: {}", directives, e)))
    }
}

/// Install the global subscriber described by `config`
///
/// Fails with [`Error::LoggingInit`] when a subscriber is already installed.
pub fn setup_logging(config: &LoggingConfig) -> Result<()> {
    let builder = fmt::Subscriber::builder()
        .with_env_filter(config.env_filter()?)
        .with_file(config.file_info)
        .with_line_number(config.file_info);

    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| Error::LoggingInit(e.to_string()))?;

    tracing::info!("{} v{} logging to stdout", config.app_name, env!("CARGO_PKG_VERSION"));
    Ok(())
}

/// Like [`setup_logging`] but tolerates an existing subscriber
///
/// Returns whether this call installed the subscriber.
pub fn try_setup_logging(config: &LoggingConfig) -> bool {
    setup_logging(config).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_becomes_filter() {
        let config = LoggingConfig::new(Level::DEBUG, "media-test").with_json();
        assert_eq!(config.filter, "debug");
        assert_eq!(config.app_name, "media-test");
        assert!(config.json);
        assert!(!config.file_info);
    }

    #[test]
    fn test_bad_filter_is_config_error() {
        // Only meaningful when RUST_LOG does not override the filter
        if std::env::var(EnvFilter::DEFAULT_ENV).is_ok() {
            return;
        }
        let config = LoggingConfig::default().with_filter("sipmedia=loud");
        assert!(matches!(config.env_filter(), Err(Error::Config(_))));
        assert!(LoggingConfig::default()
            .with_filter("warn,sipmedia_media_core=trace")
            .env_filter()
            .is_ok());
    }

    #[test]
    fn test_deserialize_partial_table() {
        let config: LoggingConfig =
            crate::config::from_toml_str("filter = \"warn\"\nfile_info = true").unwrap();
        assert_eq!(config.filter, "warn");
        assert!(config.file_info);
        assert!(!config.json);
        assert_eq!(config.app_name, "sipmedia");
    }
}
