use std::env;

use crate::error::{ArkError, Result};

/// Service identity, reported by the health endpoints.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub name: String,
    pub version: String,
    pub environment: String,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

/// Connection settings for the Ark image-generation provider.
#[derive(Debug, Clone)]
pub struct ArkConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub default_size: String,
    /// Bound on total call duration in seconds, applied to the outbound
    /// HTTP client and to each spawned generation task.
    pub timeout_secs: u64,
    /// Loaded for parity with the deployed configuration surface; no retry
    /// loop consults it. See DESIGN.md.
    pub max_retries: u32,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: String,
    pub format: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub server: ServerConfig,
    pub ark: ArkConfig,
    pub log: LogConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            name: "arkgen-image-service".to_string(),
            version: "1.0.0".to_string(),
            environment: "development".to_string(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig { port: 8080 }
    }
}

impl Default for ArkConfig {
    fn default() -> Self {
        ArkConfig {
            api_key: String::new(),
            base_url: "https://ark.cn-beijing.volces.com".to_string(),
            model: "doubao-seedream-4-0-250828".to_string(),
            default_size: "2K".to_string(),
            timeout_secs: 300,
            max_retries: 3,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: "info".to_string(),
            format: "json".to_string(),
        }
    }
}

impl ArkConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        ArkConfig {
            api_key: get_env_string("IMAGE_API_KEY", ""),
            base_url: get_env_string("IMAGE_BASE_URL", "https://ark.cn-beijing.volces.com"),
            model: get_env_string("IMAGE_MODEL", "doubao-seedream-4-0-250828"),
            default_size: get_env_string("IMAGE_DEFAULT_SIZE", "2K"),
            timeout_secs: get_env_parsed("IMAGE_TIMEOUT", 300),
            max_retries: get_env_parsed("IMAGE_MAX_RETRIES", 3),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_default_size(mut self, size: impl Into<String>) -> Self {
        self.default_size = size.into();
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

impl Config {
    pub fn new() -> Self {
        Config {
            app: AppConfig::default(),
            server: ServerConfig::default(),
            ark: ArkConfig::default(),
            log: LogConfig::default(),
        }
    }

    /// Build the full configuration from environment variables, falling back
    /// to defaults for anything unset, then validate it.
    pub fn load() -> Result<Self> {
        let config = Config {
            app: AppConfig {
                name: get_env_string("APP_NAME", "arkgen-image-service"),
                version: get_env_string("APP_VERSION", "1.0.0"),
                environment: get_env_string("APP_ENVIRONMENT", "development"),
            },
            server: ServerConfig {
                port: get_env_parsed("HTTP_PORT", 8080),
            },
            ark: ArkConfig::from_env(),
            log: LogConfig {
                level: get_env_string("LOG_LEVEL", "info"),
                format: get_env_string("LOG_FORMAT", "json"),
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn with_ark(mut self, ark: ArkConfig) -> Self {
        self.ark = ark;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.server.port = port;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.ark.api_key.is_empty() {
            return Err(ArkError::ConfigError("IMAGE_API_KEY is required".into()));
        }

        if self.server.port == 0 {
            return Err(ArkError::ConfigError(format!(
                "invalid HTTP_PORT: {}",
                self.server.port
            )));
        }

        const VALID_LEVELS: [&str; 4] = ["debug", "info", "warn", "error"];
        if !VALID_LEVELS.contains(&self.log.level.as_str()) {
            return Err(ArkError::ConfigError(format!(
                "invalid LOG_LEVEL: {}, must be one of {:?}",
                self.log.level, VALID_LEVELS
            )));
        }

        const VALID_FORMATS: [&str; 2] = ["json", "text"];
        if !VALID_FORMATS.contains(&self.log.format.as_str()) {
            return Err(ArkError::ConfigError(format!(
                "invalid LOG_FORMAT: {}, must be one of {:?}",
                self.log.format, VALID_FORMATS
            )));
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

fn get_env_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn get_env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}
