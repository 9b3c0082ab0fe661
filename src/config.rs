use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;

/// 默认配置文件路径，可以用 REGISTRY_CONFIG 覆盖
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid environment override: {0}")]
    Env(#[from] envy::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub registry: RegistryConfig,
    pub health_check: HealthCheckConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub accept_http1: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:50051".to_string(),
            accept_http1: true,
        }
    }
}

// 过期清理配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub reap_interval_secs: u64,
    pub max_age_ms: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            reap_interval_secs: 30,
            max_age_ms: 90_000,
        }
    }
}

// 主动健康探测配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    pub enabled: bool,
    pub interval_secs: u64,
    pub timeout_ms: u64,
    pub path: String,
    pub failure_threshold: u32,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: 15,
            timeout_ms: 2_000,
            path: "/health".to_string(),
            failure_threshold: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// REGISTRY_ 前缀的环境变量覆盖
#[derive(Debug, Default, Deserialize)]
struct EnvOverrides {
    listen_addr: Option<String>,
    accept_http1: Option<bool>,
    reap_interval_secs: Option<u64>,
    max_age_ms: Option<u64>,
    health_check_enabled: Option<bool>,
    health_check_interval_secs: Option<u64>,
    health_check_timeout_ms: Option<u64>,
    health_check_path: Option<String>,
    health_check_failure_threshold: Option<u32>,
    log_level: Option<String>,
}

impl Config {
    /// 读取配置文件并应用环境变量覆盖
    pub fn load() -> Result<Self, ConfigError> {
        let path =
            std::env::var("REGISTRY_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = Self::from_file_or_default(&path)?;
        let overrides = envy::prefixed("REGISTRY_").from_env::<EnvOverrides>()?;
        config.apply(overrides);
        config.validate()?;
        Ok(config)
    }

    pub fn from_file_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        let config_str = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&config_str)
    }

    pub fn from_toml(config_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(config_str)?)
    }

    fn apply(&mut self, overrides: EnvOverrides) {
        if let Some(v) = overrides.listen_addr {
            self.server.listen_addr = v;
        }
        if let Some(v) = overrides.accept_http1 {
            self.server.accept_http1 = v;
        }
        if let Some(v) = overrides.reap_interval_secs {
            self.registry.reap_interval_secs = v;
        }
        if let Some(v) = overrides.max_age_ms {
            self.registry.max_age_ms = v;
        }
        if let Some(v) = overrides.health_check_enabled {
            self.health_check.enabled = v;
        }
        if let Some(v) = overrides.health_check_interval_secs {
            self.health_check.interval_secs = v;
        }
        if let Some(v) = overrides.health_check_timeout_ms {
            self.health_check.timeout_ms = v;
        }
        if let Some(v) = overrides.health_check_path {
            self.health_check.path = v;
        }
        if let Some(v) = overrides.health_check_failure_threshold {
            self.health_check.failure_threshold = v;
        }
        if let Some(v) = overrides.log_level {
            self.logging.level = v;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.listen_addr()?;
        if self.registry.reap_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "registry.reap_interval_secs must be greater than 0".to_string(),
            ));
        }
        if self.health_check.interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "health_check.interval_secs must be greater than 0".to_string(),
            ));
        }
        if self.health_check.timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "health_check.timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.health_check.failure_threshold == 0 {
            return Err(ConfigError::Invalid(
                "health_check.failure_threshold must be greater than 0".to_string(),
            ));
        }
        if !self.health_check.path.starts_with('/') {
            return Err(ConfigError::Invalid(
                "health_check.path must start with '/'".to_string(),
            ));
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.server.listen_addr.parse().map_err(|e| {
            ConfigError::Invalid(format!(
                "invalid listen address '{}': {e}",
                self.server.listen_addr
            ))
        })
    }
}
