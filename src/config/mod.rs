use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::types::Role;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub log_level: String,
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    File,
    Postgres,
}

impl std::str::FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "mem" => Ok(StoreBackend::Memory),
            "file" | "json" => Ok(StoreBackend::File),
            "postgres" | "postgresql" | "pg" => Ok(StoreBackend::Postgres),
            other => Err(format!("unknown store backend '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Directory holding one JSON file per collection (file backend)
    pub data_dir: PathBuf,
    /// Connection string (postgres backend); DATABASE_URL wins when set
    #[serde(skip_serializing)]
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub enable_request_logging: bool,
    pub max_request_size_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_expiry_hours: u64,
    pub jwt_leeway_secs: u64,
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
    /// Login directory consumed by POST /auth/login
    pub accounts: Vec<AccountConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    pub username: String,
    /// bcrypt hash of the password (`crud token hash-password`)
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    /// Subject placed in issued tokens; defaults to the username
    pub subject_id: Option<String>,
}

impl AccountConfig {
    pub fn subject(&self) -> &str {
        self.subject_id.as_deref().unwrap_or(&self.username)
    }
}

/// Shape of a YAML config file. Whole sections are optional; a missing one is
/// taken from the preset named by `environment`, not from development.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    environment: Option<Environment>,
    log_level: Option<String>,
    server: Option<ServerConfig>,
    store: Option<StoreConfig>,
    api: Option<ApiConfig>,
    security: Option<SecurityConfig>,
}

impl ConfigFile {
    fn into_config(self) -> AppConfig {
        let preset = AppConfig::preset(self.environment.unwrap_or(Environment::Development));
        AppConfig {
            environment: preset.environment,
            log_level: self.log_level.unwrap_or(preset.log_level),
            server: self.server.unwrap_or(preset.server),
            store: self.store.unwrap_or(preset.store),
            api: self.api.unwrap_or(preset.api),
            security: self.security.unwrap_or(preset.security),
        }
    }
}

impl AppConfig {
    /// Environment preset plus individual env var overrides
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        Self::preset(environment).with_env_overrides()
    }

    pub fn preset(environment: Environment) -> Self {
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
    }

    /// Like `from_env`, but a YAML file named by APP_CONFIG_FILE replaces the preset
    pub fn load() -> Result<Self, ConfigError> {
        match env::var("APP_CONFIG_FILE") {
            Ok(path) if !path.trim().is_empty() => {
                Ok(Self::from_yaml_file(Path::new(path.trim()))?.with_env_overrides())
            }
            _ => Ok(Self::from_env()),
        }
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&raw).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str::<ConfigFile>(raw).map(ConfigFile::into_config)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = env::var("LOG_LEVEL") {
            self.log_level = v;
        }

        // Server overrides
        if let Ok(v) = env::var("HOST") {
            self.server.host = v;
        }
        if let Some(port) = env::var("CRUD_API_PORT")
            .ok()
            .or_else(|| env::var("PORT").ok())
            .and_then(|s| s.parse::<u16>().ok())
        {
            self.server.port = port;
        }

        // Store overrides
        if let Ok(v) = env::var("STORE_BACKEND") {
            self.store.backend = v.parse().unwrap_or(self.store.backend);
        }
        if let Ok(v) = env::var("DATA_DIR") {
            self.store.data_dir = PathBuf::from(v);
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            self.store.database_url = Some(v);
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.store.max_connections = v.parse().unwrap_or(self.store.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.store.connection_timeout = v.parse().unwrap_or(self.store.connection_timeout);
        }

        // API overrides
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }
        if let Ok(v) = env::var("API_MAX_REQUEST_SIZE_BYTES") {
            self.api.max_request_size_bytes = v.parse().unwrap_or(self.api.max_request_size_bytes);
        }

        // Security overrides
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_JWT_ISSUER") {
            self.security.jwt_issuer = v;
        }
        if let Ok(v) = env::var("SECURITY_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }

        self
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            log_level: "debug".to_string(),
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
            },
            store: StoreConfig {
                backend: StoreBackend::Memory,
                data_dir: PathBuf::from("data"),
                database_url: None,
                max_connections: 5,
                connection_timeout: 30,
            },
            api: ApiConfig {
                enable_request_logging: true,
                max_request_size_bytes: 1024 * 1024, // 1MB
            },
            security: SecurityConfig {
                jwt_secret: "development-secret-change-me".to_string(),
                jwt_issuer: "crud-api-rust".to_string(),
                jwt_expiry_hours: 24 * 7,
                jwt_leeway_secs: 60,
                enable_cors: true,
                cors_origins: Vec::new(),
                accounts: vec![
                    AccountConfig {
                        username: "admin".to_string(),
                        // admin-password
                        password_hash: "$2b$10$2M5BWfKDobztuQQqEtvXEudeCy7jHFoPQMtR6jUPsVLMoZa0v.OQu".to_string(),
                        role: Role::Admin,
                        subject_id: Some("1".to_string()),
                    },
                    AccountConfig {
                        username: "user".to_string(),
                        // user-password
                        password_hash: "$2b$10$NWzRiiOWDLIQLlUzQpw0.uszLuACGYMBFaTAVFHCkXsgX/1aNxcUm".to_string(),
                        role: Role::User,
                        subject_id: Some("2".to_string()),
                    },
                ],
            },
        }
    }

    pub fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            log_level: "info".to_string(),
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            store: StoreConfig {
                backend: StoreBackend::File,
                data_dir: PathBuf::from("data"),
                database_url: None,
                max_connections: 10,
                connection_timeout: 10,
            },
            api: ApiConfig {
                enable_request_logging: true,
                max_request_size_bytes: 512 * 1024,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_issuer: "crud-api-rust".to_string(),
                jwt_expiry_hours: 24,
                jwt_leeway_secs: 30,
                enable_cors: true,
                cors_origins: vec!["https://staging.example.com".to_string()],
                accounts: Vec::new(),
            },
        }
    }

    pub fn production() -> Self {
        Self {
            environment: Environment::Production,
            log_level: "info".to_string(),
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            store: StoreConfig {
                backend: StoreBackend::Postgres,
                data_dir: PathBuf::from("data"),
                database_url: None,
                max_connections: 20,
                connection_timeout: 5,
            },
            api: ApiConfig {
                enable_request_logging: false,
                max_request_size_bytes: 256 * 1024,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_issuer: "crud-api-rust".to_string(),
                jwt_expiry_hours: 4,
                jwt_leeway_secs: 30,
                enable_cors: true,
                cors_origins: vec!["https://app.example.com".to_string()],
                accounts: Vec::new(),
            },
        }
    }
}

static CONFIG: OnceCell<AppConfig> = OnceCell::new();

/// Install the process-wide config; the first call wins
pub fn init(config: AppConfig) -> &'static AppConfig {
    CONFIG.get_or_init(|| config)
}

/// Process-wide config, falling back to `AppConfig::from_env` when never initialized
pub fn config() -> &'static AppConfig {
    CONFIG.get_or_init(AppConfig::from_env)
}
