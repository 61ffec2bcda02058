use chrono_tz::Tz;

/// Server configuration — all marketplace engine settings
///
/// # Environment variables
///
/// Every setting can be overridden through the environment:
///
/// | Variable | Default | Description |
/// |----------|---------|-------------|
/// | WORK_DIR | /var/lib/market | Working directory (logs) |
/// | BUSINESS_TZ | America/Chicago | Business timezone for day boundaries |
/// | LOG_LEVEL | info | Tracing level filter |
/// | LOG_DIR | (unset) | Daily-rolling log file directory |
/// | REMINDER_INTERVAL_SECS | 3600 | Upcoming-delivery reminder scan interval |
/// | UPCOMING_DAYS_DEFAULT | 7 | Default window for upcoming queries |
///
/// # Example
///
/// ```ignore
/// BUSINESS_TZ=Europe/Madrid LOG_LEVEL=debug cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Working directory for logs and local state
    pub work_dir: String,
    /// Business timezone; day boundaries for due/avoid-date arithmetic
    pub business_tz: Tz,
    /// Tracing level filter: trace | debug | info | warn | error
    pub log_level: String,
    /// Optional directory for daily-rolling log files
    pub log_dir: Option<String>,
    /// Interval between upcoming-delivery reminder scans (seconds)
    pub reminder_interval_secs: u64,
    /// Default look-ahead window for upcoming-delivery queries (days)
    pub upcoming_days_default: i64,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Unset variables fall back to their defaults. An unparseable
    /// BUSINESS_TZ falls back to the default timezone with a warning.
    pub fn from_env() -> Self {
        let business_tz = std::env::var("BUSINESS_TZ")
            .ok()
            .and_then(|name| match name.parse::<Tz>() {
                Ok(tz) => Some(tz),
                Err(_) => {
                    tracing::warn!(tz = %name, "Unknown BUSINESS_TZ, falling back to default");
                    None
                }
            })
            .unwrap_or(chrono_tz::America::Chicago);

        Self {
            work_dir: std::env::var("WORK_DIR").unwrap_or_else(|_| "/var/lib/market".into()),
            business_tz,
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_dir: std::env::var("LOG_DIR").ok(),
            reminder_interval_secs: std::env::var("REMINDER_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3600),
            upcoming_days_default: std::env::var("UPCOMING_DAYS_DEFAULT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(7),
        }
    }

    /// Override selected settings, keeping the rest from the environment
    ///
    /// Mostly used in tests.
    pub fn with_overrides(work_dir: impl Into<String>, business_tz: Tz) -> Self {
        let mut config = Self::from_env();
        config.work_dir = work_dir.into();
        config.business_tz = business_tz;
        config
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            work_dir: "/var/lib/market".into(),
            business_tz: chrono_tz::America::Chicago,
            log_level: "info".into(),
            log_dir: None,
            reminder_interval_secs: 3600,
            upcoming_days_default: 7,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.business_tz, chrono_tz::America::Chicago);
        assert_eq!(config.reminder_interval_secs, 3600);
        assert_eq!(config.upcoming_days_default, 7);
    }

    #[test]
    fn test_with_overrides() {
        let config = Config::with_overrides("/tmp/market-test", chrono_tz::Europe::Madrid);
        assert_eq!(config.work_dir, "/tmp/market-test");
        assert_eq!(config.business_tz, chrono_tz::Europe::Madrid);
    }
}
