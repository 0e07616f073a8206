//! Configuration types.
//!
//! Sources, later ones overriding earlier ones:
//! 1. `config.yaml` in the working directory (optional)
//! 2. explicit path passed to [`Config::load`]
//! 3. file named by `BROKERLINK_CONFIG`
//! 4. `BROKERLINK__SECTION__KEY` environment variables

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Default config file name.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// Environment variable for config file path.
pub const CONFIG_ENV_VAR: &str = "BROKERLINK_CONFIG";

/// Environment variable prefix for config overrides.
pub const CONFIG_ENV_PREFIX: &str = "BROKERLINK";

/// Environment variable for log level.
pub const LOG_ENV_VAR: &str = "BROKERLINK_LOG";

/// Page size used when the caller does not pin a window.
pub const DEFAULT_PAGE_SIZE: u64 = 50;

/// Deadline applied to an exchange when the caller passes none.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Broker connection settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    /// MQTT client id. Also names this client's inbound topics.
    pub client_id: String,
    /// Session token sent with every query and command.
    pub token: String,
    pub keep_alive_secs: u64,
    pub tls: TlsConfig,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            client_id: "brokerlink".to_string(),
            token: String::new(),
            keep_alive_secs: 30,
            tls: TlsConfig::default(),
        }
    }
}

impl BrokerConfig {
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }
}

/// TLS material. TLS is on when `ca_path` is set; the client certificate
/// and key are only used together.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    pub ca_path: Option<PathBuf>,
    pub cert_path: Option<PathBuf>,
    pub key_path: Option<PathBuf>,
}

impl TlsConfig {
    pub fn is_enabled(&self) -> bool {
        self.ca_path.is_some()
    }

    /// Client certificate and key, when both are configured.
    pub fn client_auth(&self) -> Option<(&PathBuf, &PathBuf)> {
        self.cert_path.as_ref().zip(self.key_path.as_ref())
    }
}

/// Query settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Values ≤ 0 are ignored when applied.
    pub page_size: i64,
    pub timeout_ms: u64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE as i64,
            timeout_ms: DEFAULT_TIMEOUT.as_millis() as u64,
        }
    }
}

impl QueryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Command settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CommandConfig {
    pub timeout_ms: u64,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT.as_millis() as u64,
        }
    }
}

impl CommandConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Main configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub broker: BrokerConfig,
    pub query: QueryConfig,
    pub command: CommandConfig,
}

impl Config {
    /// Load configuration from file and environment.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a YAML document, without file or environment layering.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Config =
            serde_yaml::from_str(yaml).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.broker.client_id.is_empty() {
            return Err(ConfigError::Invalid("broker.client_id is empty".to_string()));
        }
        if self.broker.cert_path_without_key() {
            return Err(ConfigError::Invalid(
                "broker.tls.cert_path and broker.tls.key_path must be set together".to_string(),
            ));
        }
        Ok(())
    }

    /// Create a config for testing.
    pub fn for_test() -> Self {
        Self::default()
    }
}

impl BrokerConfig {
    fn cert_path_without_key(&self) -> bool {
        self.tls.cert_path.is_some() != self.tls.key_path.is_some()
    }
}
