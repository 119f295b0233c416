//! Server configuration loaded from `streamview.yaml`.
//!
//! Every section and field has a default, so an empty document (or no file
//! at all) yields a runnable configuration. `STREAMVIEW_HOST` and
//! `STREAMVIEW_PORT` override the listen address after parsing.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use streamview_core::ActorConfig;
use streamview_wire::DEFAULT_SIGNALS_KEY;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StreamviewConfig {
    /// Listen address and page title.
    #[serde(default)]
    pub server: ServerConfig,
    /// Live session tunables.
    #[serde(default)]
    pub live: LiveConfig,
    /// Log output.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl StreamviewConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.server.apply_env_overrides();
        Ok(config)
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    /// Bind address.
    #[serde(default = "default_host")]
    pub host: String,
    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// `<title>` of the page shell.
    #[serde(default = "default_title")]
    pub title: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            title: default_title(),
        }
    }
}

impl ServerConfig {
    /// Apply environment variable overrides.
    ///
    /// An unparseable `STREAMVIEW_PORT` is ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("STREAMVIEW_HOST") {
            self.host = val;
        }
        if let Ok(val) = std::env::var("STREAMVIEW_PORT") {
            if let Ok(port) = val.parse() {
                self.port = port;
            }
        }
    }
}

/// Live session settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LiveConfig {
    /// Seconds of stream silence before a keepalive comment is sent.
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,
    /// How long a persistent session survives a lost stream, in
    /// milliseconds. Zero tears down immediately.
    #[serde(default)]
    pub reconnect_grace_ms: u64,
    /// How long a loaded page's session waits for its stream, in
    /// milliseconds. Zero waits forever.
    #[serde(default = "default_attach_timeout_ms")]
    pub attach_timeout_ms: u64,
    /// Query parameter (and body wrapper key) carrying client signals.
    #[serde(default = "default_signals_param")]
    pub signals_param: String,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            keepalive_secs: default_keepalive_secs(),
            reconnect_grace_ms: 0,
            attach_timeout_ms: default_attach_timeout_ms(),
            signals_param: default_signals_param(),
        }
    }
}

impl LiveConfig {
    /// Keepalive interval. Never zero.
    pub fn keepalive(&self) -> Duration {
        Duration::from_secs(self.keepalive_secs.max(1))
    }

    /// Actor tunables derived from this section.
    pub const fn actor_config(&self) -> ActorConfig {
        ActorConfig {
            reconnect_grace: Duration::from_millis(self.reconnect_grace_ms),
            attach_timeout: Duration::from_millis(self.attach_timeout_ms),
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_host() -> String {
    String::from("0.0.0.0")
}

const fn default_port() -> u16 {
    4000
}

fn default_title() -> String {
    String::from("Streamview")
}

const fn default_keepalive_secs() -> u64 {
    30
}

const fn default_attach_timeout_ms() -> u64 {
    10_000
}

fn default_signals_param() -> String {
    String::from(DEFAULT_SIGNALS_KEY)
}

fn default_log_level() -> String {
    String::from("info")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_sections() {
        let config = StreamviewConfig::parse("live:\n  keepalive_secs: 5\n").unwrap();
        assert_eq!(config.live.keepalive(), Duration::from_secs(5));
        assert_eq!(config.live.signals_param, "datastar");
        assert_eq!(config.live.actor_config(), ActorConfig::default());
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
    }

    #[test]
    fn empty_document_is_default() {
        let config = StreamviewConfig::parse("").unwrap();
        assert_eq!(config.live, LiveConfig::default());
        assert_eq!(config.server.title, "Streamview");
    }

    #[test]
    fn grace_converts_to_actor_config() {
        let config = StreamviewConfig::parse("live:\n  reconnect_grace_ms: 1500\n").unwrap();
        assert_eq!(
            config.live.actor_config().reconnect_grace,
            Duration::from_millis(1500)
        );
    }

    #[test]
    fn attach_timeout_converts_to_actor_config() {
        let config = StreamviewConfig::parse("live:\n  attach_timeout_ms: 250\n").unwrap();
        assert_eq!(
            config.live.actor_config().attach_timeout,
            Duration::from_millis(250)
        );
        assert_eq!(
            LiveConfig::default().actor_config().attach_timeout,
            streamview_core::DEFAULT_ATTACH_TIMEOUT
        );
    }

    #[test]
    fn zero_keepalive_is_clamped() {
        let live = LiveConfig {
            keepalive_secs: 0,
            ..LiveConfig::default()
        };
        assert_eq!(live.keepalive(), Duration::from_secs(1));
    }

    #[test]
    fn invalid_yaml_is_rejected() {
        let err = StreamviewConfig::parse("server: [unclosed").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml { .. }));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = StreamviewConfig::from_file(Path::new("/nonexistent/streamview.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
