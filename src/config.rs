use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{AppError, AppResult};
use crate::models::Post;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub import: ImportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Full connection URL; when set it wins over the discrete fields
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: String,
    pub ssl: bool,
    pub ssl_reject_unauthorized: bool,
    pub max_connections: u32,
    pub connection_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Validated posts buffered before a flush
    pub batch_size: usize,
    /// Upper bound on posts per upsert statement
    pub sub_batch_size: usize,
    /// Upper bound on legislators or topics per upsert statement
    pub reference_batch_size: usize,
    /// Bound-parameter ceiling of the storage engine
    pub param_limit: usize,
    /// Records between progress log lines
    pub log_interval: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: "localhost".to_string(),
            port: 5432,
            name: "civicwatch".to_string(),
            user: "postgres".to_string(),
            password: "postgres".to_string(),
            ssl: false,
            ssl_reject_unauthorized: true,
            max_connections: 5,
            connection_timeout_ms: 10_000,
        }
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            batch_size: 10_000,
            sub_batch_size: 5_000,
            reference_batch_size: 10_000,
            param_limit: 65_535,
            log_interval: 100_000,
        }
    }
}

impl Config {
    pub fn from_env() -> AppResult<Self> {
        let db_defaults = DatabaseConfig::default();
        let import_defaults = ImportConfig::default();

        let config = Self {
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").ok().filter(|url| !url.trim().is_empty()),
                host: env::var("DB_HOST").unwrap_or(db_defaults.host),
                port: env_parse("DB_PORT", db_defaults.port)?,
                name: env::var("DB_NAME").unwrap_or(db_defaults.name),
                user: env::var("DB_USER").unwrap_or(db_defaults.user),
                password: env::var("DB_PASSWORD").unwrap_or(db_defaults.password),
                ssl: env_parse("DB_SSL", db_defaults.ssl)?,
                ssl_reject_unauthorized: env_parse(
                    "DB_SSL_REJECT_UNAUTHORIZED",
                    db_defaults.ssl_reject_unauthorized,
                )?,
                max_connections: env_parse("DB_MAX_CONNECTIONS", db_defaults.max_connections)?,
                connection_timeout_ms: env_parse(
                    "DB_CONNECTION_TIMEOUT",
                    db_defaults.connection_timeout_ms,
                )?,
            },
            import: ImportConfig {
                batch_size: env_parse("IMPORT_BATCH_SIZE", import_defaults.batch_size)?,
                sub_batch_size: env_parse("IMPORT_SUB_BATCH_SIZE", import_defaults.sub_batch_size)?,
                reference_batch_size: env_parse(
                    "IMPORT_REFERENCE_BATCH_SIZE",
                    import_defaults.reference_batch_size,
                )?,
                param_limit: env_parse("IMPORT_PARAM_LIMIT", import_defaults.param_limit)?,
                log_interval: env_parse("IMPORT_LOG_INTERVAL", import_defaults.log_interval)?,
            },
        };
        config.import.validate()?;
        Ok(config)
    }
}

impl DatabaseConfig {
    /// Connection options for sqlx, honoring `DATABASE_URL` when present.
    pub fn connect_options(&self) -> AppResult<PgConnectOptions> {
        if let Some(url) = &self.url {
            return PgConnectOptions::from_str(url).map_err(|e| {
                AppError::ConfigurationError(format!("Invalid DATABASE_URL: {}", e))
            });
        }

        let ssl_mode = match (self.ssl, self.ssl_reject_unauthorized) {
            (false, _) => PgSslMode::Disable,
            (true, true) => PgSslMode::VerifyFull,
            (true, false) => PgSslMode::Require,
        };

        Ok(PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.name)
            .username(&self.user)
            .password(&self.password)
            .ssl_mode(ssl_mode))
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    /// Connection target without credentials, for log lines.
    pub fn display_target(&self) -> String {
        match &self.url {
            Some(_) => "DATABASE_URL".to_string(),
            None => format!("{}:{}/{}", self.host, self.port, self.name),
        }
    }
}

impl ImportConfig {
    pub fn validate(&self) -> AppResult<()> {
        let sizes = [
            ("batch_size", self.batch_size),
            ("sub_batch_size", self.sub_batch_size),
            ("reference_batch_size", self.reference_batch_size),
            ("param_limit", self.param_limit),
        ];
        for (name, value) in sizes {
            if value == 0 {
                return Err(AppError::ConfigurationError(format!(
                    "{} must be at least 1",
                    name
                )));
            }
        }
        // The widest statement binds one parameter per post column
        if self.param_limit < Post::COLUMNS.len() {
            return Err(AppError::ConfigurationError(format!(
                "param_limit must be at least {} (one post row), got {}",
                Post::COLUMNS.len(),
                self.param_limit
            )));
        }
        if self.log_interval == 0 {
            return Err(AppError::ConfigurationError(
                "log_interval must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> AppResult<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw.trim().parse().map_err(|e| {
            AppError::ConfigurationError(format!("Invalid value for {}: {} ({})", key, raw, e))
        }),
        _ => Ok(default),
    }
}
