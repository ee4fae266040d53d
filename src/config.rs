//! Runtime configuration loaded from the environment.
//!
//! Every setting has a `DEFAULT_*` constant so the service starts with no
//! environment at all. A `.env` file in the working directory is honoured
//! (see `main.rs`). Values that are present but malformed are a startup error.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;

/// Default port if not specified via environment variable.
pub const DEFAULT_PORT: u16 = 3001;

/// Default database path if not specified via environment variable.
pub const DEFAULT_DB_URL: &str = "sqlite:worldstats.db?mode=rwc";

pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379/0";

/// Cache lifetimes, in seconds.
pub const DEFAULT_TTL_COUNTRY: u64 = 21_600;
pub const DEFAULT_TTL_CHARTS: u64 = 43_200;
pub const DEFAULT_TTL_COMPARISON: u64 = 3_600;
pub const DEFAULT_TTL_AI_SUMMARY: u64 = 86_400;

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Daily at 03:00 UTC (seconds field first, as the `cron` crate expects).
pub const DEFAULT_SYNC_CRON: &str = "0 0 3 * * *";

pub const DEFAULT_PAYLOAD_TTL_HOURS: u64 = 24;
pub const DEFAULT_HEARTBEAT_SECS: u64 = 30;
pub const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 900;
pub const DEFAULT_RATE_LIMIT_MAX_REQUESTS: u32 = 100;
pub const DEFAULT_CORS_ORIGINS: &str = "http://localhost:5173,http://localhost:3000";

/// Deployment environment. Controls error detail in API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    pub fn is_development(self) -> bool {
        self == Environment::Development
    }
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            "test" => Ok(Environment::Test),
            other => anyhow::bail!("unknown environment '{other}'"),
        }
    }
}

/// Time-to-live for each family of cached views.
#[derive(Debug, Clone, Copy)]
pub struct CacheTtl {
    pub country: Duration,
    pub charts: Duration,
    pub comparison: Duration,
    pub ai_summary: Duration,
}

impl Default for CacheTtl {
    fn default() -> Self {
        Self {
            country: Duration::from_secs(DEFAULT_TTL_COUNTRY),
            charts: Duration::from_secs(DEFAULT_TTL_CHARTS),
            comparison: Duration::from_secs(DEFAULT_TTL_COMPARISON),
            ai_summary: Duration::from_secs(DEFAULT_TTL_AI_SUMMARY),
        }
    }
}

/// Settings for the language-model summary endpoint.
#[derive(Debug, Clone)]
pub struct SummaryModelConfig {
    /// No key means summaries always use the local fallback.
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub window: Duration,
    pub max_requests: u32,
}

/// Full service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    pub port: u16,
    pub database_url: String,
    /// `None` when the remote cache is disabled.
    pub redis_url: Option<String>,
    pub cache_ttl: CacheTtl,
    pub summary_model: SummaryModelConfig,
    pub sync_cron: String,
    pub sync_on_startup: bool,
    /// `None` disables the provider payload cache.
    pub payload_ttl: Option<Duration>,
    pub heartbeat_interval: Duration,
    pub rate_limit: RateLimitConfig,
    pub cors_origins: Vec<String>,
}

impl Config {
    /// Build the configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        let environment = env_or("WORLDSTATS_ENV", Environment::Development)?;
        let redis_enabled = env_or("REDIS_ENABLED", true)?;
        let payload_hours: u64 = env_or("PROVIDER_PAYLOAD_TTL_HOURS", DEFAULT_PAYLOAD_TTL_HOURS)?;

        Ok(Self {
            environment,
            port: env_or("WORLDSTATS_PORT", DEFAULT_PORT)?,
            database_url: env_string("WORLDSTATS_DATABASE_URL", DEFAULT_DB_URL),
            redis_url: redis_enabled.then(|| env_string("REDIS_URL", DEFAULT_REDIS_URL)),
            cache_ttl: CacheTtl {
                country: secs("CACHE_TTL_COUNTRY", DEFAULT_TTL_COUNTRY)?,
                charts: secs("CACHE_TTL_CHARTS", DEFAULT_TTL_CHARTS)?,
                comparison: secs("CACHE_TTL_COMPARISON", DEFAULT_TTL_COMPARISON)?,
                ai_summary: secs("CACHE_TTL_AI_SUMMARY", DEFAULT_TTL_AI_SUMMARY)?,
            },
            summary_model: SummaryModelConfig {
                api_key: env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty()),
                model: env_string("OPENAI_MODEL", DEFAULT_OPENAI_MODEL),
                base_url: env_string("OPENAI_BASE_URL", DEFAULT_OPENAI_BASE_URL),
            },
            sync_cron: env_string("SYNC_CRON", DEFAULT_SYNC_CRON),
            sync_on_startup: env_or("SYNC_ON_STARTUP", true)?,
            payload_ttl: (payload_hours > 0).then(|| Duration::from_secs(payload_hours * 3600)),
            heartbeat_interval: secs("WS_HEARTBEAT_SECS", DEFAULT_HEARTBEAT_SECS)?,
            rate_limit: RateLimitConfig {
                window: secs("RATE_LIMIT_WINDOW_SECS", DEFAULT_RATE_LIMIT_WINDOW_SECS)?,
                max_requests: env_or("RATE_LIMIT_MAX_REQUESTS", DEFAULT_RATE_LIMIT_MAX_REQUESTS)?,
            },
            cors_origins: parse_list(&env_string("CORS_ORIGINS", DEFAULT_CORS_ORIGINS)),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            port: DEFAULT_PORT,
            database_url: DEFAULT_DB_URL.to_string(),
            redis_url: None,
            cache_ttl: CacheTtl::default(),
            summary_model: SummaryModelConfig {
                api_key: None,
                model: DEFAULT_OPENAI_MODEL.to_string(),
                base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            },
            sync_cron: DEFAULT_SYNC_CRON.to_string(),
            sync_on_startup: false,
            payload_ttl: None,
            heartbeat_interval: Duration::from_secs(DEFAULT_HEARTBEAT_SECS),
            rate_limit: RateLimitConfig {
                window: Duration::from_secs(DEFAULT_RATE_LIMIT_WINDOW_SECS),
                max_requests: DEFAULT_RATE_LIMIT_MAX_REQUESTS,
            },
            cors_origins: parse_list(DEFAULT_CORS_ORIGINS),
        }
    }
}

fn env_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => parse_value(key, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| anyhow::anyhow!("{e}"))
        .with_context(|| format!("invalid value for {key}: '{raw}'"))
}

fn secs(key: &str, default: u64) -> anyhow::Result<Duration> {
    env_or(key, default).map(Duration::from_secs)
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_value_reports_variable_name() {
        let err = parse_value::<u16>("WORLDSTATS_PORT", "eighty").unwrap_err();
        assert!(format!("{err:#}").contains("WORLDSTATS_PORT"));
    }

    #[test]
    fn test_parse_value_trims() {
        let port: u16 = parse_value("WORLDSTATS_PORT", " 8080 ").unwrap();
        assert_eq!(port, 8080);
    }

    #[test]
    fn test_environment_from_str() {
        assert_eq!("production".parse::<Environment>().unwrap(), Environment::Production);
        assert_eq!("DEV".parse::<Environment>().unwrap(), Environment::Development);
        assert!("staging".parse::<Environment>().is_err());
    }

    #[test]
    fn test_parse_list_skips_blanks() {
        assert_eq!(
            parse_list("http://a, ,http://b,"),
            vec!["http://a".to_string(), "http://b".to_string()]
        );
    }

    #[test]
    fn test_default_cache_ttls() {
        let ttl = CacheTtl::default();
        assert_eq!(ttl.country, Duration::from_secs(6 * 3600));
        assert_eq!(ttl.charts, Duration::from_secs(12 * 3600));
        assert_eq!(ttl.comparison, Duration::from_secs(3600));
        assert_eq!(ttl.ai_summary, Duration::from_secs(24 * 3600));
    }
}
