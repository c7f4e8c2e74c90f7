use chrono::Weekday;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse TOML from config file at {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("Failed to load config from environment: {0}")]
    Environment(#[from] envy::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Runtime configuration of the check-cycle engine and the daemon around it.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    pub database_url: String,
    pub log_dir: String,

    pub telegram_bot_token: String,
    pub telegram_api_base: String,
    pub user_agent: String,

    pub check_interval_seconds: u64,
    pub probe_timeout_seconds: u64,
    pub guard_timeout_seconds: u64,
    pub worker_pool_size: usize,
    pub batch_size: usize,
    pub cycle_listing_limit: Option<usize>,

    pub strong_failure_threshold: u32,
    pub weak_failure_threshold: u32,
    pub systemic_failure_ratio: f64,
    pub quarantine_minutes: i64,

    pub deadline_days: i64,
    pub warning_window_days: i64,
    pub weekly_digest_weekday: Weekday,
    pub weekly_digest_hour: u32,

    pub connectivity_endpoints: Vec<String>,
    pub platform_endpoints: Vec<String>,
}

// Partial config for layering
#[derive(Deserialize, Default, Debug)]
pub struct PartialMonitorConfig {
    pub database_url: Option<String>,
    pub log_dir: Option<String>,
    pub telegram_bot_token: Option<String>,
    pub telegram_api_base: Option<String>,
    pub user_agent: Option<String>,
    pub check_interval_seconds: Option<u64>,
    pub probe_timeout_seconds: Option<u64>,
    pub guard_timeout_seconds: Option<u64>,
    pub worker_pool_size: Option<usize>,
    pub batch_size: Option<usize>,
    pub cycle_listing_limit: Option<usize>,
    pub strong_failure_threshold: Option<u32>,
    pub weak_failure_threshold: Option<u32>,
    pub systemic_failure_ratio: Option<f64>,
    pub quarantine_minutes: Option<i64>,
    pub deadline_days: Option<i64>,
    pub warning_window_days: Option<i64>,
    pub weekly_digest_weekday: Option<String>,
    pub weekly_digest_hour: Option<u32>,
    pub connectivity_endpoints: Option<Vec<String>>,
    pub platform_endpoints: Option<Vec<String>>,
}

fn default_database_url() -> String {
    "sqlite://data/listing_watch.db?mode=rwc".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_telegram_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36".to_string()
}

fn default_connectivity_endpoints() -> Vec<String> {
    vec![
        "https://www.google.com".to_string(),
        "https://www.cloudflare.com".to_string(),
        "https://1.1.1.1".to_string(),
    ]
}

fn default_platform_endpoints() -> Vec<String> {
    vec![
        "https://www.kavak.com/br".to_string(),
        "https://www.kavak.com".to_string(),
    ]
}

impl Default for MonitorConfig {
    fn default() -> Self {
        MonitorConfig {
            database_url: default_database_url(),
            log_dir: default_log_dir(),
            telegram_bot_token: String::new(),
            telegram_api_base: default_telegram_api_base(),
            user_agent: default_user_agent(),
            check_interval_seconds: 600,
            probe_timeout_seconds: 5,
            guard_timeout_seconds: 10,
            worker_pool_size: 5,
            batch_size: 50,
            cycle_listing_limit: None,
            strong_failure_threshold: 3,
            weak_failure_threshold: 4,
            systemic_failure_ratio: 0.70,
            quarantine_minutes: 30,
            deadline_days: 45,
            warning_window_days: 5,
            weekly_digest_weekday: Weekday::Fri,
            weekly_digest_hour: 10,
            connectivity_endpoints: default_connectivity_endpoints(),
            platform_endpoints: default_platform_endpoints(),
        }
    }
}

impl MonitorConfig {
    /// Loads configuration from an optional TOML file and the environment.
    /// Environment variables override file values; both override defaults.
    pub fn load(config_path: Option<&str>) -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        // 1. Load from file (optional)
        let file_config: PartialMonitorConfig = match config_path {
            Some(path_str) if Path::new(path_str).exists() => Self::read_file(path_str)?,
            _ => PartialMonitorConfig::default(),
        };

        // 2. Load from environment variables
        let env_config: PartialMonitorConfig = envy::from_env::<PartialMonitorConfig>()?;

        // 3. Merge: environment overrides file
        let config = Self::merge(env_config, file_config)?;
        config.validate()?;
        Ok(config)
    }

    fn read_file(path_str: &str) -> Result<PartialMonitorConfig, ConfigError> {
        let contents = fs::read_to_string(path_str).map_err(|source| ConfigError::Read {
            path: path_str.to_string(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path_str.to_string(),
            source,
        })
    }

    /// Merges two partial layers over the defaults, `primary` winning over `fallback`.
    pub fn merge(
        primary: PartialMonitorConfig,
        fallback: PartialMonitorConfig,
    ) -> Result<Self, ConfigError> {
        let defaults = MonitorConfig::default();

        let weekly_digest_weekday = match primary
            .weekly_digest_weekday
            .or(fallback.weekly_digest_weekday)
        {
            Some(day) => day.parse::<Weekday>().map_err(|_| {
                ConfigError::Invalid(format!("unknown weekly_digest_weekday '{day}'"))
            })?,
            None => defaults.weekly_digest_weekday,
        };

        Ok(MonitorConfig {
            database_url: primary
                .database_url
                .or(fallback.database_url)
                .unwrap_or(defaults.database_url),
            log_dir: primary.log_dir.or(fallback.log_dir).unwrap_or(defaults.log_dir),
            telegram_bot_token: primary
                .telegram_bot_token
                .or(fallback.telegram_bot_token)
                .unwrap_or(defaults.telegram_bot_token),
            telegram_api_base: primary
                .telegram_api_base
                .or(fallback.telegram_api_base)
                .unwrap_or(defaults.telegram_api_base),
            user_agent: primary
                .user_agent
                .or(fallback.user_agent)
                .unwrap_or(defaults.user_agent),
            check_interval_seconds: primary
                .check_interval_seconds
                .or(fallback.check_interval_seconds)
                .unwrap_or(defaults.check_interval_seconds),
            probe_timeout_seconds: primary
                .probe_timeout_seconds
                .or(fallback.probe_timeout_seconds)
                .unwrap_or(defaults.probe_timeout_seconds),
            guard_timeout_seconds: primary
                .guard_timeout_seconds
                .or(fallback.guard_timeout_seconds)
                .unwrap_or(defaults.guard_timeout_seconds),
            worker_pool_size: primary
                .worker_pool_size
                .or(fallback.worker_pool_size)
                .unwrap_or(defaults.worker_pool_size),
            batch_size: primary
                .batch_size
                .or(fallback.batch_size)
                .unwrap_or(defaults.batch_size),
            cycle_listing_limit: primary
                .cycle_listing_limit
                .or(fallback.cycle_listing_limit)
                .or(defaults.cycle_listing_limit),
            strong_failure_threshold: primary
                .strong_failure_threshold
                .or(fallback.strong_failure_threshold)
                .unwrap_or(defaults.strong_failure_threshold),
            weak_failure_threshold: primary
                .weak_failure_threshold
                .or(fallback.weak_failure_threshold)
                .unwrap_or(defaults.weak_failure_threshold),
            systemic_failure_ratio: primary
                .systemic_failure_ratio
                .or(fallback.systemic_failure_ratio)
                .unwrap_or(defaults.systemic_failure_ratio),
            quarantine_minutes: primary
                .quarantine_minutes
                .or(fallback.quarantine_minutes)
                .unwrap_or(defaults.quarantine_minutes),
            deadline_days: primary
                .deadline_days
                .or(fallback.deadline_days)
                .unwrap_or(defaults.deadline_days),
            warning_window_days: primary
                .warning_window_days
                .or(fallback.warning_window_days)
                .unwrap_or(defaults.warning_window_days),
            weekly_digest_weekday,
            weekly_digest_hour: primary
                .weekly_digest_hour
                .or(fallback.weekly_digest_hour)
                .unwrap_or(defaults.weekly_digest_hour),
            connectivity_endpoints: primary
                .connectivity_endpoints
                .or(fallback.connectivity_endpoints)
                .unwrap_or(defaults.connectivity_endpoints),
            platform_endpoints: primary
                .platform_endpoints
                .or(fallback.platform_endpoints)
                .unwrap_or(defaults.platform_endpoints),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.strong_failure_threshold == 0 {
            return invalid("strong_failure_threshold must be at least 1");
        }
        if self.weak_failure_threshold <= self.strong_failure_threshold {
            return invalid("weak_failure_threshold must be greater than strong_failure_threshold");
        }
        if !(self.systemic_failure_ratio > 0.0 && self.systemic_failure_ratio <= 1.0) {
            return invalid("systemic_failure_ratio must be in (0, 1]");
        }
        if self.worker_pool_size == 0 || self.batch_size == 0 {
            return invalid("worker_pool_size and batch_size must be non-zero");
        }
        if self.cycle_listing_limit == Some(0) {
            return invalid("cycle_listing_limit must be non-zero when set");
        }
        if self.check_interval_seconds == 0
            || self.probe_timeout_seconds == 0
            || self.guard_timeout_seconds == 0
        {
            return invalid("intervals and timeouts must be non-zero");
        }
        if self.quarantine_minutes <= 0 {
            return invalid("quarantine_minutes must be positive");
        }
        if self.deadline_days <= 0 {
            return invalid("deadline_days must be positive");
        }
        if self.warning_window_days < 0 || self.warning_window_days >= self.deadline_days {
            return invalid("warning_window_days must be within [0, deadline_days)");
        }
        if self.weekly_digest_hour >= 24 {
            return invalid("weekly_digest_hour must be below 24");
        }
        if self.connectivity_endpoints.len() < 2 || self.platform_endpoints.len() < 2 {
            return invalid("at least two connectivity and two platform endpoints are required");
        }
        Ok(())
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_seconds)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_seconds)
    }

    pub fn guard_timeout(&self) -> Duration {
        Duration::from_secs(self.guard_timeout_seconds)
    }

    pub fn quarantine_duration(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.quarantine_minutes)
    }
}
