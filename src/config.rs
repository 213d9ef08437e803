use std::time::Duration;

use tracing::debug;

use crate::shared::AppError;

/// Runtime configuration, read once at startup and injected into the app state
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub secret_key: String,
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
    pub public_base_url: String,
    pub frontend_url: String,
    pub cors_origins: Vec<String>,
    pub cookie_secure: bool,
    pub worker: WorkerConfig,
    pub mail: MailConfig,
}

/// Background worker settings
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub queue: String,
    pub concurrency: usize,
    pub max_retry: u32,
    pub poll_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            queue: "default".to_string(),
            concurrency: 10,
            max_retry: 3,
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// Sender identity used on outgoing mail
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub from_name: String,
    pub from_address: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            from_name: "Rental Listing".to_string(),
            from_address: "no-reply@localhost".to_string(),
        }
    }
}

impl AppConfig {
    /// Builds the configuration from process environment variables.
    ///
    /// `SECRET_KEY` is mandatory; everything else falls back to a development default.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret_key = lookup("SECRET_KEY")
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| AppError::Config("SECRET_KEY must be set".to_string()))?;

        let defaults = WorkerConfig::default();
        let worker = WorkerConfig {
            queue: lookup("TASK_QUEUE").unwrap_or(defaults.queue),
            concurrency: parse_or(&lookup, "WORKER_CONCURRENCY", defaults.concurrency)?,
            max_retry: parse_or(&lookup, "WORKER_MAX_RETRY", defaults.max_retry)?,
            poll_interval: defaults.poll_interval,
        };
        if worker.concurrency == 0 {
            return Err(AppError::Config(
                "WORKER_CONCURRENCY must be at least 1".to_string(),
            ));
        }

        let mail_defaults = MailConfig::default();
        let mail = MailConfig {
            from_name: lookup("MAIL_FROM_NAME").unwrap_or(mail_defaults.from_name),
            from_address: lookup("MAIL_FROM_ADDRESS").unwrap_or(mail_defaults.from_address),
        };

        let cors_origins = lookup("CORS_ORIGINS")
            .unwrap_or_else(|| "http://localhost:3000".to_string())
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        let config = Self {
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8000".to_string()),
            secret_key,
            database_url: lookup("DATABASE_URL").filter(|s| !s.is_empty()),
            redis_url: lookup("REDIS_URL").filter(|s| !s.is_empty()),
            public_base_url: lookup("PUBLIC_BASE_URL")
                .unwrap_or_else(|| "http://localhost:8000".to_string())
                .trim_end_matches('/')
                .to_string(),
            frontend_url: lookup("FRONTEND_URL")
                .unwrap_or_else(|| "http://localhost:5173".to_string())
                .trim_end_matches('/')
                .to_string(),
            cors_origins,
            cookie_secure: parse_or(&lookup, "COOKIE_SECURE", false)?,
            worker,
            mail,
        };

        debug!(
            bind_addr = %config.bind_addr,
            postgres = config.database_url.is_some(),
            redis = config.redis_url.is_some(),
            queue = %config.worker.queue,
            concurrency = config.worker.concurrency,
            "Configuration loaded"
        );

        Ok(config)
    }

    /// Configuration for tests: fixed secret, no external services
    pub fn for_tests() -> Self {
        Self {
            bind_addr: "127.0.0.1:0".to_string(),
            secret_key: "test-secret-key".to_string(),
            database_url: None,
            redis_url: None,
            public_base_url: "http://localhost:8000".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            cors_origins: vec!["http://localhost:3000".to_string()],
            cookie_secure: false,
            worker: WorkerConfig::default(),
            mail: MailConfig::default(),
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{key} has an invalid value: {raw}"))),
        None => Ok(default),
    }
}
