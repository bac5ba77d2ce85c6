use std::{env, str::FromStr, time::Duration};

use thiserror::Error;

/// Errors found while interpreting the configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} is not set; {needed_by} is disabled")]
    Missing {
        key: &'static str,
        needed_by: &'static str,
    },
}

/// Schedule of one worker as read from the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSettings {
    pub enabled: bool,
    pub interval_secs: u64,
    pub run_on_start: bool,
}

impl WorkerSettings {
    fn from_env(enabled_key: &str, prefix: &str, default_interval_secs: u64) -> Self {
        Self {
            enabled: env_bool(enabled_key, true),
            interval_secs: env_parse(&format!("{}_INTERVAL_SECS", prefix), default_interval_secs)
                .max(1),
            run_on_start: env_bool(&format!("{}_RUN_ON_START", prefix), true),
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to SQLite database file (default: "orbitsync.db")
    pub sqlite_path: String,
    /// Redis connection URL (default: "redis://localhost:6379")
    /// Note: Only used when the `redis` feature is enabled.
    #[allow(dead_code)]
    pub redis_url: String,
    /// Maximum number of in-memory cache entries (default: 10,000)
    pub cache_max_entries: usize,

    pub iss: WorkerSettings,
    pub nasa: WorkerSettings,
    pub feed: WorkerSettings,
    pub telemetry: WorkerSettings,

    pub iss_url: String,
    pub nasa_api_key: Option<String>,
    pub nasa_osdr_url: String,
    pub nasa_osdr_items_path: String,
    pub nasa_apod_url: String,
    pub nasa_neo_url: String,
    pub jwst_host: String,
    pub jwst_api_key: Option<String>,
    pub jwst_email: Option<String>,
    pub jwst_items_path: String,
    pub astro_url: String,
    pub astro_app_id: Option<String>,
    pub astro_app_secret: Option<String>,
    pub astro_items_path: String,

    /// Samples generated per telemetry tick (default: 100)
    pub telemetry_batch_size: usize,
    /// Days of telemetry kept; 0 disables the sweep (default: 30)
    pub telemetry_retention_days: u32,

    /// Bound on scheduler shutdown (default: 10)
    pub shutdown_timeout_secs: u64,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `SQLITE_PATH` - SQLite database path (default: "orbitsync.db")
    /// - `REDIS_URL` - Redis connection URL (default: "redis://localhost:6379")
    /// - `CACHE_MAX_ENTRIES` - Maximum cache entries (default: 10,000)
    /// - `ISS_ENABLED`, `WORKER_ISS_INTERVAL_SECS` (120), `WORKER_ISS_RUN_ON_START`
    /// - `NASA_ENABLED`, `WORKER_NASA_INTERVAL_SECS` (3600), `WORKER_NASA_RUN_ON_START`
    /// - `FEED_ENABLED`, `WORKER_FEED_INTERVAL_SECS` (3600), `WORKER_FEED_RUN_ON_START`
    /// - `TELEMETRY_ENABLED`, `WORKER_TELEMETRY_INTERVAL_SECS` (300), `WORKER_TELEMETRY_RUN_ON_START`
    /// - `ISS_URL`, `NASA_API_KEY`, `NASA_OSDR_URL`, `NASA_OSDR_ITEMS_PATH` ("items"),
    ///   `NASA_APOD_URL`, `NASA_NEO_URL`, `JWST_HOST`, `JWST_API_KEY`, `JWST_EMAIL`,
    ///   `JWST_ITEMS_PATH` ("body")
    /// - `ASTRO_BASE_URL`, `ASTRO_APP_ID`, `ASTRO_APP_SECRET`, `ASTRO_ITEMS_PATH` ("data.events")
    /// - `TELEMETRY_BATCH_SIZE` (100), `TELEMETRY_RETENTION_DAYS` (30)
    /// - `SCHEDULER_SHUTDOWN_TIMEOUT_SECS` (10)
    pub fn from_env() -> Self {
        Self {
            sqlite_path: env_string("SQLITE_PATH", "orbitsync.db"),
            redis_url: env_string("REDIS_URL", "redis://localhost:6379"),
            cache_max_entries: env_parse("CACHE_MAX_ENTRIES", 10_000),

            iss: WorkerSettings::from_env("ISS_ENABLED", "WORKER_ISS", 120),
            nasa: WorkerSettings::from_env("NASA_ENABLED", "WORKER_NASA", 3600),
            feed: WorkerSettings::from_env("FEED_ENABLED", "WORKER_FEED", 3600),
            telemetry: WorkerSettings::from_env("TELEMETRY_ENABLED", "WORKER_TELEMETRY", 300),

            iss_url: env_string("ISS_URL", orbitsync_sources::client::iss::DEFAULT_ISS_URL),
            nasa_api_key: env_optional("NASA_API_KEY"),
            nasa_osdr_url: env_string(
                "NASA_OSDR_URL",
                orbitsync_sources::client::nasa::DEFAULT_OSDR_URL,
            ),
            nasa_osdr_items_path: env_string(
                "NASA_OSDR_ITEMS_PATH",
                crate::sync::catalog::DEFAULT_ITEMS_PATH,
            ),
            nasa_apod_url: env_string(
                "NASA_APOD_URL",
                orbitsync_sources::client::nasa::DEFAULT_APOD_URL,
            ),
            nasa_neo_url: env_string("NASA_NEO_URL", orbitsync_sources::client::nasa::DEFAULT_NEO_URL),
            jwst_host: env_string("JWST_HOST", orbitsync_sources::client::jwst::DEFAULT_JWST_HOST),
            jwst_api_key: env_optional("JWST_API_KEY"),
            jwst_email: env_optional("JWST_EMAIL"),
            jwst_items_path: env_string(
                "JWST_ITEMS_PATH",
                crate::sync::feed::DEFAULT_JWST_ITEMS_PATH,
            ),
            astro_url: env_string(
                "ASTRO_BASE_URL",
                orbitsync_sources::client::astro::DEFAULT_ASTRO_URL,
            ),
            astro_app_id: env_optional("ASTRO_APP_ID"),
            astro_app_secret: env_optional("ASTRO_APP_SECRET"),
            astro_items_path: env_string("ASTRO_ITEMS_PATH", crate::sync::astro::DEFAULT_ITEMS_PATH),

            telemetry_batch_size: env_parse("TELEMETRY_BATCH_SIZE", 100),
            telemetry_retention_days: env_parse("TELEMETRY_RETENTION_DAYS", 30),

            shutdown_timeout_secs: env_parse("SCHEDULER_SHUTDOWN_TIMEOUT_SECS", 10),
        }
    }

    /// NASA key used by the APOD and NEO channels.
    pub fn require_nasa_api_key(&self, needed_by: &'static str) -> Result<&str, ConfigError> {
        self.nasa_api_key.as_deref().ok_or(ConfigError::Missing {
            key: "NASA_API_KEY",
            needed_by,
        })
    }

    /// JWST key used by the JWST channel.
    pub fn require_jwst_api_key(&self) -> Result<&str, ConfigError> {
        self.jwst_api_key.as_deref().ok_or(ConfigError::Missing {
            key: "JWST_API_KEY",
            needed_by: "feed channel jwst",
        })
    }

    /// AstronomyAPI application id and secret.
    pub fn require_astro_credentials(&self) -> Result<(&str, &str), ConfigError> {
        let needed_by = "astronomy events";
        let app_id = self.astro_app_id.as_deref().ok_or(ConfigError::Missing {
            key: "ASTRO_APP_ID",
            needed_by,
        })?;
        let secret = self.astro_app_secret.as_deref().ok_or(ConfigError::Missing {
            key: "ASTRO_APP_SECRET",
            needed_by,
        })?;
        Ok((app_id, secret))
    }

    /// Telemetry retention, or `None` when the sweep is disabled.
    pub fn telemetry_retention(&self) -> Option<chrono::Duration> {
        (self.telemetry_retention_days > 0)
            .then(|| chrono::Duration::days(self.telemetry_retention_days as i64))
    }

    /// Get scheduler shutdown timeout as a Duration.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

fn env_string(key: &str, default: &str) -> String {
    env_optional(key).unwrap_or_else(|| default.to_string())
}

/// Unset and blank values both read as absent.
fn env_optional(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .and_then(|v| parse_bool(&v))
        .unwrap_or(default)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(interval_secs: u64) -> WorkerSettings {
        WorkerSettings {
            enabled: true,
            interval_secs,
            run_on_start: true,
        }
    }

    #[test]
    fn test_interval_conversion() {
        assert_eq!(settings(120).interval(), Duration::from_secs(120));
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool(" off "), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_default_values() {
        // Clear environment variables to test defaults
        for key in [
            "SQLITE_PATH",
            "CACHE_MAX_ENTRIES",
            "WORKER_ISS_INTERVAL_SECS",
            "WORKER_NASA_INTERVAL_SECS",
            "TELEMETRY_RETENTION_DAYS",
            "NASA_OSDR_ITEMS_PATH",
            "JWST_ITEMS_PATH",
            "NASA_API_KEY",
        ] {
            env::remove_var(key);
        }

        let config = Config::from_env();

        assert_eq!(config.sqlite_path, "orbitsync.db");
        assert_eq!(config.cache_max_entries, 10_000);
        assert_eq!(config.iss.interval(), Duration::from_secs(120));
        assert_eq!(config.nasa.interval(), Duration::from_secs(3600));
        assert_eq!(config.nasa_osdr_items_path, "items");
        assert_eq!(config.jwst_items_path, "body");
        assert_eq!(config.telemetry_retention(), Some(chrono::Duration::days(30)));
        assert_eq!(
            config.require_nasa_api_key("feed channel apod"),
            Err(ConfigError::Missing {
                key: "NASA_API_KEY",
                needed_by: "feed channel apod"
            })
        );
    }

    #[test]
    fn test_astro_credentials_need_both_halves() {
        let mut config = Config::from_env();
        config.astro_app_id = Some("app".to_string());
        config.astro_app_secret = None;
        assert_eq!(
            config.require_astro_credentials(),
            Err(ConfigError::Missing {
                key: "ASTRO_APP_SECRET",
                needed_by: "astronomy events"
            })
        );

        config.astro_app_secret = Some("secret".to_string());
        assert_eq!(config.require_astro_credentials(), Ok(("app", "secret")));
    }

    #[test]
    fn test_zero_retention_disables_sweep() {
        let mut config = Config::from_env();
        config.telemetry_retention_days = 0;
        assert_eq!(config.telemetry_retention(), None);
    }
}
