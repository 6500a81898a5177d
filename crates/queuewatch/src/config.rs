use crate::error::ConfigError;

/// Runtime configuration, loaded from environment variables.
#[derive(Clone, Debug)]
pub struct Config {
    pub server_url: String,
    pub api_token: Option<String>,
    pub database_path: String,
    pub poll_interval_secs: u64,
    pub http_timeout_secs: u64,
    pub metric_retention_days: i64,
    pub maintenance_interval_secs: u64,
    pub persist_metrics: bool,
    pub backoff_enabled: bool,
    pub migrate_on_startup: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let server_url = env_or_fallback("QUEUEWATCH_SERVER_URL", "SERVER_URL")
            .ok_or(ConfigError::Missing("QUEUEWATCH_SERVER_URL"))?;

        let api_token = env_or_fallback("QUEUEWATCH_API_TOKEN", "API_TOKEN");

        let database_path = env_or_fallback("QUEUEWATCH_DB_PATH", "DB_PATH")
            .unwrap_or_else(|| "queuewatch.db".to_string());

        let poll_interval_secs =
            parse_env("QUEUEWATCH_POLL_INTERVAL_SECS", "POLL_INTERVAL_SECS", 5)?;
        if poll_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "QUEUEWATCH_POLL_INTERVAL_SECS",
                value: "0".to_string(),
            });
        }

        let http_timeout_secs = parse_env("QUEUEWATCH_HTTP_TIMEOUT_SECS", "HTTP_TIMEOUT_SECS", 10)?;

        let metric_retention_days =
            parse_env("QUEUEWATCH_METRIC_RETENTION_DAYS", "METRIC_RETENTION_DAYS", 30)?;

        let maintenance_interval_secs = parse_env(
            "QUEUEWATCH_MAINTENANCE_INTERVAL_SECS",
            "MAINTENANCE_INTERVAL_SECS",
            3600,
        )?;

        let persist_metrics = env_bool("QUEUEWATCH_PERSIST_METRICS").unwrap_or(true);
        let backoff_enabled = env_bool("QUEUEWATCH_FETCH_BACKOFF").unwrap_or(false);
        let migrate_on_startup = env_bool("QUEUEWATCH_MIGRATE_ON_STARTUP").unwrap_or(true);

        Ok(Self {
            server_url,
            api_token,
            database_path,
            poll_interval_secs,
            http_timeout_secs,
            metric_retention_days,
            maintenance_interval_secs,
            persist_metrics,
            backoff_enabled,
            migrate_on_startup,
        })
    }
}

fn env_or_fallback(primary: &str, fallback: &str) -> Option<String> {
    std::env::var(primary)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .or_else(|| std::env::var(fallback).ok().filter(|s| !s.trim().is_empty()))
}

fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

fn parse_env<T: std::str::FromStr>(
    primary: &'static str,
    fallback: &str,
    default: T,
) -> Result<T, ConfigError> {
    match env_or_fallback(primary, fallback) {
        Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
            key: primary,
            value: raw,
        }),
        None => Ok(default),
    }
}
