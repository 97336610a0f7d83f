use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub log_level: String,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(skip_serializing)]
    pub url: String,
    pub max_connections: u32,
    /// Seconds to wait for a pooled connection
    pub connection_timeout: u64,
    /// Upper bound for a single statement, in milliseconds
    pub statement_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
    pub max_request_size_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    /// Empty means permissive CORS
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub api_url: String,
    #[serde(skip_serializing)]
    pub token: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
}

impl AppConfig {
    /// Load configuration for the HTTP server. All secrets are required.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self::load()?;
        config.require_database_url()?;
        config.require_jwt_secret()?;
        config.require_blob_token()?;
        Ok(config)
    }

    /// Load presets and overrides without insisting on any secret, for tools
    /// that only need part of the configuration.
    pub fn load() -> Result<Self, ConfigError> {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        let mut config = match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        };

        // Secrets have no defaults in any environment
        config.database.url = env::var("DATABASE_URL").unwrap_or_default();
        config.security.jwt_secret = env::var("JWT_SECRET").unwrap_or_default();
        config.storage.token = env::var("BLOB_READ_WRITE_TOKEN").unwrap_or_default();

        config.with_env_overrides()
    }

    pub fn require_database_url(&self) -> Result<&str, ConfigError> {
        required("DATABASE_URL", &self.database.url)
    }

    pub fn require_jwt_secret(&self) -> Result<&str, ConfigError> {
        required("JWT_SECRET", &self.security.jwt_secret)
    }

    pub fn require_blob_token(&self) -> Result<&str, ConfigError> {
        required("BLOB_READ_WRITE_TOKEN", &self.storage.token)
    }

    fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Ok(v) = env::var("MARKER_API_PORT").or_else(|_| env::var("PORT")) {
            self.api.port = parse("MARKER_API_PORT", &v)?;
        }
        if let Ok(v) = env::var("API_MAX_REQUEST_SIZE_BYTES") {
            self.api.max_request_size_bytes = parse("API_MAX_REQUEST_SIZE_BYTES", &v)?;
        }
        if let Ok(v) = env::var("LOG_LEVEL") {
            self.log_level = v;
        }

        // Database overrides
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse("DATABASE_MAX_CONNECTIONS", &v)?;
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = parse("DATABASE_CONNECTION_TIMEOUT", &v)?;
        }
        if let Ok(v) = env::var("DATABASE_STATEMENT_TIMEOUT_MS") {
            self.database.statement_timeout_ms = parse("DATABASE_STATEMENT_TIMEOUT_MS", &v)?;
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Ok(v) = env::var("SECURITY_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = parse("SECURITY_JWT_EXPIRY_HOURS", &v)?;
        }

        // Blob storage overrides
        if let Ok(v) = env::var("BLOB_API_URL") {
            url::Url::parse(&v).map_err(|_| ConfigError::Invalid {
                name: "BLOB_API_URL",
                value: v.clone(),
            })?;
            self.storage.api_url = v.trim_end_matches('/').to_string();
        }
        if let Ok(v) = env::var("BLOB_TIMEOUT_SECS") {
            self.storage.timeout_secs = parse("BLOB_TIMEOUT_SECS", &v)?;
        }
        if let Ok(v) = env::var("BLOB_MAX_RETRIES") {
            self.storage.max_retries = parse("BLOB_MAX_RETRIES", &v)?;
        }

        Ok(self)
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            log_level: "debug".to_string(),
            database: DatabaseConfig {
                url: String::new(),
                max_connections: 5,
                connection_timeout: 30,
                statement_timeout_ms: 10_000,
            },
            api: ApiConfig {
                port: 3000,
                max_request_size_bytes: 25 * 1024 * 1024, // 25MB
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 24 * 7, // 1 week
                cors_origins: Vec::new(),
            },
            storage: StorageConfig {
                api_url: "https://blob.vercel-storage.com".to_string(),
                token: String::new(),
                timeout_secs: 60,
                max_retries: 3,
                retry_base_delay_ms: 250,
            },
        }
    }

    pub fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            log_level: "info".to_string(),
            database: DatabaseConfig {
                url: String::new(),
                max_connections: 10,
                connection_timeout: 10,
                statement_timeout_ms: 5_000,
            },
            api: ApiConfig {
                port: 3000,
                max_request_size_bytes: 20 * 1024 * 1024, // 20MB
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
                cors_origins: Vec::new(),
            },
            storage: StorageConfig {
                api_url: "https://blob.vercel-storage.com".to_string(),
                token: String::new(),
                timeout_secs: 30,
                max_retries: 3,
                retry_base_delay_ms: 500,
            },
        }
    }

    pub fn production() -> Self {
        Self {
            environment: Environment::Production,
            log_level: "info".to_string(),
            database: DatabaseConfig {
                url: String::new(),
                max_connections: 20,
                connection_timeout: 5,
                statement_timeout_ms: 5_000,
            },
            api: ApiConfig {
                port: 3000,
                max_request_size_bytes: 20 * 1024 * 1024, // 20MB
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 24 * 30,
                cors_origins: Vec::new(),
            },
            storage: StorageConfig {
                api_url: "https://blob.vercel-storage.com".to_string(),
                token: String::new(),
                timeout_secs: 30,
                max_retries: 4,
                retry_base_delay_ms: 500,
            },
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}

fn required<'a>(name: &'static str, value: &'a str) -> Result<&'a str, ConfigError> {
    if value.trim().is_empty() {
        Err(ConfigError::Missing(name))
    } else {
        Ok(value)
    }
}

fn parse<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        name,
        value: value.to_string(),
    })
}
