use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::smartgen_api::models::credentials::Credentials;
use crate::smartgen_api::variant::ApiVariantKind;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unable to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("required setting `{0}` is missing or empty")]
    Missing(&'static str),
    #[error("setting `{field}` is invalid: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    pub fn is_missing_file(&self) -> bool {
        matches!(self, ConfigError::Read { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

/// A string that must never show up in logs.
#[derive(Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl Debug for Secret {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("***")
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    pub smartgen: SmartGenConfig,
    #[serde(default)]
    pub mqtt: MqttConfig,
    #[serde(default)]
    pub intervals: IntervalConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    /// Per-level rolling files are only written when this is set.
    pub directory: Option<String>,
    pub debug_file: String,
    pub info_file: String,
    pub warn_file: String,
    pub error_file: String,
    pub console_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: None,
            debug_file: "smartgen_debug.log".to_string(),
            info_file: "smartgen_info.log".to_string(),
            warn_file: "smartgen_warn.log".to_string(),
            error_file: "smartgen_error.log".to_string(),
            console_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SmartGenConfig {
    #[serde(default)]
    pub variant: ApiVariantKind,
    #[serde(default)]
    pub api_base: Option<String>,
    #[serde(default)]
    pub token: Secret,
    #[serde(default)]
    pub utoken: Secret,
    #[serde(default)]
    pub genset_address: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub cookie: Option<Secret>,
    #[serde(default)]
    pub sign_secret: Option<Secret>,
}

fn default_language() -> String {
    "en-US".to_string()
}

fn default_timezone() -> String {
    "UTC".to_string()
}

impl SmartGenConfig {
    pub fn credentials(&self) -> Credentials {
        Credentials {
            token: self.token.clone(),
            utoken: self.utoken.clone(),
            address: self.genset_address.trim().to_string(),
            language: self.language.clone(),
            timezone: self.timezone.clone(),
            cookie: self.cookie.clone().filter(|c| !c.is_empty()),
            sign_secret: self.sign_secret.clone().filter(|s| !s.is_empty()),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<Secret>,
    pub client_id: String,
    pub keep_alive_seconds: u64,
    pub base_topic: String,
    pub discovery_prefix: String,
    pub publish_flat_topics: bool,
    pub use_supervisor: bool,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "core-mosquitto".to_string(),
            port: 1883,
            username: None,
            password: None,
            client_id: "smartgen-bridge".to_string(),
            keep_alive_seconds: 60,
            base_topic: "smartgen".to_string(),
            discovery_prefix: "homeassistant".to_string(),
            publish_flat_topics: true,
            use_supervisor: true,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct IntervalConfig {
    pub poll_interval_seconds: u64,
    pub request_timeout_seconds: u64,
    pub backoff_base_seconds: u64,
    pub backoff_max_seconds: u64,
    pub reconnect_delay_seconds: u64,
    pub refresh_after_command: bool,
}

impl Default for IntervalConfig {
    fn default() -> Self {
        Self {
            poll_interval_seconds: 30,
            request_timeout_seconds: 10,
            backoff_base_seconds: 5,
            backoff_max_seconds: 300,
            reconnect_delay_seconds: 5,
            refresh_after_command: true,
        }
    }
}

impl IntervalConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_seconds)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct LimitsConfig {
    /// Consecutive failed polls before availability flips to offline.
    pub failure_threshold: u32,
    pub mqtt_queue_size: usize,
    pub command_channel_size: usize,
    pub broker_connect_retries: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            mqtt_queue_size: 100,
            command_channel_size: 10,
            broker_connect_retries: 5,
        }
    }
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.smartgen.token.is_empty() {
            return Err(ConfigError::Missing("smartgen.token"));
        }
        if self.smartgen.utoken.is_empty() {
            return Err(ConfigError::Missing("smartgen.utoken"));
        }
        if self.smartgen.genset_address.trim().is_empty() {
            return Err(ConfigError::Missing("smartgen.genset_address"));
        }
        if self.mqtt.base_topic.trim().is_empty() {
            return Err(ConfigError::Missing("mqtt.base_topic"));
        }
        if self.intervals.poll_interval_seconds == 0 {
            return Err(ConfigError::Invalid {
                field: "intervals.poll_interval_seconds",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.intervals.backoff_base_seconds == 0
            || self.intervals.backoff_max_seconds < self.intervals.backoff_base_seconds
        {
            return Err(ConfigError::Invalid {
                field: "intervals.backoff_max_seconds",
                reason: "backoff base must be non-zero and not exceed the maximum".to_string(),
            });
        }
        if self.limits.failure_threshold == 0 {
            return Err(ConfigError::Invalid {
                field: "limits.failure_threshold",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn save_example(path: impl AsRef<Path>) -> anyhow::Result<()> {
        let example_config = Config {
            logging: LoggingConfig {
                directory: Some("./logs".to_string()),
                console_level: "info".to_string(),
                ..LoggingConfig::default()
            },
            smartgen: SmartGenConfig {
                variant: ApiVariantKind::Mobile,
                api_base: None,
                token: Secret::new("REPLACE_WITH_YOUR_SMARTGEN_TOKEN"),
                utoken: Secret::new("REPLACE_WITH_YOUR_SMARTGEN_UTOKEN"),
                genset_address: "REPLACE_WITH_YOUR_GENSET_ADDRESS".to_string(),
                language: default_language(),
                timezone: default_timezone(),
                cookie: None,
                sign_secret: None,
            },
            mqtt: MqttConfig {
                host: "192.168.1.40".to_string(),
                username: Some("homeassistant".to_string()),
                password: Some(Secret::new("REPLACE_WITH_YOUR_MQTT_PASSWORD")),
                ..MqttConfig::default()
            },
            intervals: IntervalConfig::default(),
            limits: LimitsConfig::default(),
        };

        let toml_content = toml::to_string_pretty(&example_config)?;
        fs::write(path, toml_content)?;
        Ok(())
    }
}
