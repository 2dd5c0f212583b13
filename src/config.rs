use std::env;
use std::time::Duration;

use crate::error::AppError;

/// How many deliveries a rider may carry at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiderCapacity {
    Unlimited,
    Limited(u32),
}

impl RiderCapacity {
    /// `0` means no limit.
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0 => Self::Unlimited,
            n => Self::Limited(n),
        }
    }

    pub fn is_full(self, active: u32) -> bool {
        match self {
            Self::Unlimited => false,
            Self::Limited(max) => active >= max,
        }
    }

    /// Load ratio in [0, 1]; unlimited riders report zero.
    pub fn utilization(self, active: u32) -> f64 {
        match self {
            Self::Unlimited => 0.0,
            Self::Limited(max) => (f64::from(active) / f64::from(max)).clamp(0.0, 1.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

/// Knobs the core consults at runtime.
#[derive(Debug, Clone)]
pub struct Settings {
    pub rider_capacity: RiderCapacity,
    pub auto_assign: bool,
    pub auto_assign_retry: Duration,
    pub priority_medium_after: chrono::Duration,
    pub priority_high_after: chrono::Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            rider_capacity: RiderCapacity::Unlimited,
            auto_assign: false,
            auto_assign_retry: Duration::from_millis(500),
            priority_medium_after: chrono::Duration::minutes(10),
            priority_high_after: chrono::Duration::minutes(20),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub event_buffer_size: usize,
    pub dispatch_queue_size: usize,
    pub request_timeout: Duration,
    pub landing_stats_interval: Duration,
    pub static_dir: String,
    pub settings: Settings,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let log_format = match lookup("LOG_FORMAT").as_deref() {
            None | Some("compact") => LogFormat::Compact,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(AppError::Internal(format!(
                    "invalid LOG_FORMAT: {other}, expected compact or json"
                )));
            }
        };

        let medium_minutes: i64 = parse_or_default(&lookup, "PRIORITY_MEDIUM_MINUTES", 10)?;
        let high_minutes: i64 = parse_or_default(&lookup, "PRIORITY_HIGH_MINUTES", 20)?;
        if medium_minutes < 0 || high_minutes < medium_minutes {
            return Err(AppError::Internal(format!(
                "priority thresholds must satisfy 0 <= medium ({medium_minutes}) <= high ({high_minutes})"
            )));
        }

        let event_buffer_size = parse_or_default(&lookup, "EVENT_BUFFER_SIZE", 1024)?;
        let dispatch_queue_size = parse_or_default(&lookup, "DISPATCH_QUEUE_SIZE", 1024)?;
        if event_buffer_size == 0 || dispatch_queue_size == 0 {
            return Err(AppError::Internal(
                "EVENT_BUFFER_SIZE and DISPATCH_QUEUE_SIZE must be > 0".to_string(),
            ));
        }

        Ok(Self {
            http_port: parse_or_default(&lookup, "HTTP_PORT", 3000)?,
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            log_format,
            event_buffer_size,
            dispatch_queue_size,
            request_timeout: Duration::from_millis(parse_or_default(
                &lookup,
                "REQUEST_TIMEOUT_MS",
                5000,
            )?),
            landing_stats_interval: Duration::from_secs(
                parse_or_default::<u64, _>(&lookup, "LANDING_STATS_INTERVAL_SECS", 10)?.max(1),
            ),
            static_dir: lookup("STATIC_DIR").unwrap_or_else(|| "static".to_string()),
            settings: Settings {
                rider_capacity: RiderCapacity::from_raw(parse_or_default(
                    &lookup,
                    "RIDER_CAPACITY",
                    0,
                )?),
                auto_assign: parse_or_default(&lookup, "AUTO_ASSIGN", false)?,
                auto_assign_retry: Duration::from_millis(parse_or_default(
                    &lookup,
                    "AUTO_ASSIGN_RETRY_MS",
                    500,
                )?),
                priority_medium_after: chrono::Duration::minutes(medium_minutes),
                priority_high_after: chrono::Duration::minutes(high_minutes),
            },
        })
    }
}

fn parse_or_default<T, F>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use super::{Config, LogFormat, RiderCapacity};

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, crate::error::AppError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.http_port, 3000);
        assert_eq!(config.log_format, LogFormat::Compact);
        assert_eq!(config.settings.rider_capacity, RiderCapacity::Unlimited);
        assert!(!config.settings.auto_assign);
        assert_eq!(config.request_timeout, Duration::from_millis(5000));
    }

    #[test]
    fn reads_capacity_and_auto_assign() {
        let config = config_from(&[("RIDER_CAPACITY", "2"), ("AUTO_ASSIGN", "true")]).unwrap();
        assert_eq!(config.settings.rider_capacity, RiderCapacity::Limited(2));
        assert!(config.settings.auto_assign);
    }

    #[test]
    fn rejects_garbage_port() {
        assert!(config_from(&[("HTTP_PORT", "eighty")]).is_err());
    }

    #[test]
    fn rejects_inverted_priority_thresholds() {
        let result = config_from(&[
            ("PRIORITY_MEDIUM_MINUTES", "30"),
            ("PRIORITY_HIGH_MINUTES", "5"),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn capacity_utilization() {
        assert_eq!(RiderCapacity::Limited(4).utilization(1), 0.25);
        assert_eq!(RiderCapacity::Unlimited.utilization(7), 0.0);
        assert!(RiderCapacity::Limited(1).is_full(1));
        assert!(!RiderCapacity::Unlimited.is_full(u32::MAX));
    }
}
