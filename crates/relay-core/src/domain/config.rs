//! Dispatch engine configuration with validation.

use crate::domain::command::CommandKind;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main dispatch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Per-kind reply deadlines
    pub timeouts: TimeoutConfig,
    /// Fan-out behaviour
    pub broadcast: BroadcastMode,
    /// Background sweep of abandoned requests
    pub reaper: ReaperConfig,
    /// Hard ceiling on any request's lifetime; per-kind timeouts are capped to it
    #[serde(with = "humantime_serde")]
    pub max_request_age: Duration,
    /// How many resolved ids to remember for late-completion detection
    pub tombstone_capacity: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            timeouts: TimeoutConfig::default(),
            broadcast: BroadcastMode::default(),
            reaper: ReaperConfig::default(),
            max_request_age: Duration::from_secs(120),
            tombstone_capacity: 1024,
        }
    }
}

impl DispatchConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        for kind in CommandKind::ALL {
            let timeout = self.timeouts.for_kind(kind);
            if timeout.is_zero() {
                return Err(ConfigError::InvalidTimeout(format!(
                    "{} timeout cannot be 0",
                    kind
                )));
            }
            if timeout > self.max_request_age {
                return Err(ConfigError::InvalidTimeout(format!(
                    "{} timeout {}ms exceeds max_request_age {}ms",
                    kind,
                    timeout.as_millis(),
                    self.max_request_age.as_millis()
                )));
            }
        }

        if self.reaper.interval.is_zero() {
            return Err(ConfigError::InvalidReaper(
                "interval cannot be 0".into(),
            ));
        }

        Ok(())
    }

    /// Reply deadline for a kind, capped at the hard ceiling
    pub fn timeout_for(&self, kind: CommandKind) -> Duration {
        self.timeouts.for_kind(kind).min(self.max_request_age)
    }
}

/// Per-kind timeout configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    #[serde(with = "humantime_serde")]
    pub execute: Duration,
    #[serde(with = "humantime_serde")]
    pub capture_dom: Duration,
    #[serde(with = "humantime_serde")]
    pub capture_screenshot: Duration,
    /// Page loads are the slowest thing an executor does
    #[serde(with = "humantime_serde")]
    pub navigate: Duration,
    #[serde(with = "humantime_serde")]
    pub create_post: Duration,
    #[serde(with = "humantime_serde")]
    pub show_alert: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            execute: Duration::from_secs(30),
            capture_dom: Duration::from_secs(15),
            capture_screenshot: Duration::from_secs(15),
            navigate: Duration::from_secs(30),
            create_post: Duration::from_secs(20),
            show_alert: Duration::from_secs(10),
        }
    }
}

impl TimeoutConfig {
    pub fn for_kind(&self, kind: CommandKind) -> Duration {
        match kind {
            CommandKind::Execute => self.execute,
            CommandKind::CaptureDom => self.capture_dom,
            CommandKind::CaptureScreenshot => self.capture_screenshot,
            CommandKind::Navigate => self.navigate,
            CommandKind::CreatePost => self.create_post,
            CommandKind::ShowAlert => self.show_alert,
        }
    }

    /// Same timeout for every kind (handy in tests)
    pub fn uniform(timeout: Duration) -> Self {
        Self {
            execute: timeout,
            capture_dom: timeout,
            capture_screenshot: timeout,
            navigate: timeout,
            create_post: timeout,
            show_alert: timeout,
        }
    }
}

/// Which executors receive a dispatched command
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BroadcastMode {
    /// Every channel open at dispatch time
    #[default]
    All,
    /// Only the most recently connected channel
    Latest,
}

/// Reaper configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaperConfig {
    /// Sweep period
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    /// Slack past the deadline before the reaper steps in, so per-request
    /// timers normally win
    #[serde(with = "humantime_serde")]
    pub grace: Duration,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            grace: Duration::from_secs(5),
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
    #[error("invalid reaper settings: {0}")]
    InvalidReaper(String),
}

/// Human-readable `Duration` serialization ("250ms", "30s", "2m")
pub mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_millis() == 0 {
            serializer.serialize_str(&format!("{}s", duration.as_secs()))
        } else {
            serializer.serialize_str(&format!("{}ms", duration.as_millis()))
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    pub fn parse_duration(s: &str) -> Result<Duration, &'static str> {
        let s = s.trim();
        // "ms" before "s" and "m"
        if let Some(ms) = s.strip_suffix("ms") {
            ms.trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| "invalid milliseconds")
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| "invalid seconds")
        } else if let Some(mins) = s.strip_suffix('m') {
            let m = mins.trim().parse::<u64>().map_err(|_| "invalid minutes")?;
            m.checked_mul(60)
                .map(Duration::from_secs)
                .ok_or("minutes out of range")
        } else {
            s.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| "invalid duration format")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DispatchConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.broadcast, BroadcastMode::All);
        assert!(config.timeout_for(CommandKind::Navigate) > config.timeout_for(CommandKind::ShowAlert));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = DispatchConfig::default();
        config.timeouts.show_alert = Duration::ZERO;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidTimeout(_))
        ));
    }

    #[test]
    fn test_timeout_above_ceiling_rejected() {
        let mut config = DispatchConfig::default();
        config.timeouts.navigate = Duration::from_secs(600);
        assert!(config.validate().is_err());
        // Still capped when used unvalidated
        assert_eq!(config.timeout_for(CommandKind::Navigate), config.max_request_age);
    }

    #[test]
    fn test_zero_reaper_interval_rejected() {
        let mut config = DispatchConfig::default();
        config.reaper.interval = Duration::ZERO;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidReaper(_))
        ));
    }

    #[test]
    fn test_parse_duration() {
        use humantime_serde::parse_duration;
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration("30s"), Ok(Duration::from_secs(30)));
        assert_eq!(parse_duration("2m"), Ok(Duration::from_secs(120)));
        assert_eq!(parse_duration("7"), Ok(Duration::from_secs(7)));
        assert!(parse_duration("soon").is_err());
    }

    #[test]
    fn test_parse_duration_minutes_overflow() {
        use humantime_serde::parse_duration;
        assert_eq!(
            parse_duration("307445734561825862m"),
            Err("minutes out of range")
        );

        let result: Result<DispatchConfig, _> = serde_json::from_value(serde_json::json!({
            "timeouts": { "navigate": "307445734561825862m" },
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_config_from_json() {
        let config: DispatchConfig = serde_json::from_value(serde_json::json!({
            "timeouts": { "navigate": "45s", "show_alert": "500ms" },
            "broadcast": "latest",
        }))
        .unwrap();
        assert_eq!(config.timeouts.navigate, Duration::from_secs(45));
        assert_eq!(config.timeouts.show_alert, Duration::from_millis(500));
        assert_eq!(config.timeouts.execute, Duration::from_secs(30));
        assert_eq!(config.broadcast, BroadcastMode::Latest);
        assert_eq!(config.reaper.interval, Duration::from_secs(10));
    }
}
