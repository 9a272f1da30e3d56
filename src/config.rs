//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ConfigError, Result};
use crate::scheduler::TickSchedule;

/// Every minute, on the minute.
pub const DEFAULT_SCHEDULE: &str = "0 * * * * *";

/// Tracker configuration.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Path of the job document.
    pub db_path: PathBuf,
    /// Path of the append-only audit log.
    pub audit_log_path: PathBuf,
    /// Cron expression for completion ticks (seconds field first).
    pub schedule: String,
    /// Fixed tick interval; overrides `schedule` when set.
    pub tick_interval: Option<Duration>,
    /// HTTP listen port.
    pub port: u16,
    /// Directory for rolling log files, if file logging is wanted.
    pub log_dir: Option<PathBuf>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/jobs.json"),
            audit_log_path: PathBuf::from("./logs/logs.txt"),
            schedule: DEFAULT_SCHEDULE.to_string(),
            tick_interval: None,
            port: 3000,
            log_dir: None,
        }
    }
}

impl TrackerConfig {
    /// Load from `JOB_TRACKER_*` environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let db_path = lookup("JOB_TRACKER_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);

        let audit_log_path = lookup("JOB_TRACKER_AUDIT_LOG")
            .map(PathBuf::from)
            .unwrap_or(defaults.audit_log_path);

        let schedule = lookup("JOB_TRACKER_SCHEDULE")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.schedule);

        let tick_interval = lookup("JOB_TRACKER_TICK_SECS")
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(Duration::from_secs);

        let port: u16 = lookup("JOB_TRACKER_PORT")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(defaults.port);

        let log_dir = lookup("JOB_TRACKER_LOG_DIR")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        Self {
            db_path,
            audit_log_path,
            schedule,
            tick_interval,
            port,
            log_dir,
        }
    }

    /// The tick schedule: the fixed interval if one is set, else the cron expression.
    pub fn tick_schedule(&self) -> Result<TickSchedule> {
        let (key, result) = match self.tick_interval {
            Some(period) => ("JOB_TRACKER_TICK_SECS", TickSchedule::interval(period)),
            None => ("JOB_TRACKER_SCHEDULE", TickSchedule::cron(&self.schedule)),
        };
        let schedule = result.map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Ok(schedule)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::error::Error;

    fn config_from(vars: &[(&str, &str)]) -> TrackerConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        TrackerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let config = config_from(&[]);
        assert_eq!(config.db_path, PathBuf::from("./data/jobs.json"));
        assert_eq!(config.audit_log_path, PathBuf::from("./logs/logs.txt"));
        assert_eq!(config.schedule, DEFAULT_SCHEDULE);
        assert_eq!(config.port, 3000);
        assert!(config.tick_interval.is_none());
        assert!(config.log_dir.is_none());
        assert!(matches!(config.tick_schedule(), Ok(TickSchedule::Cron(_))));
    }

    #[test]
    fn reads_overrides() {
        let config = config_from(&[
            ("JOB_TRACKER_DB_PATH", "/tmp/jobs.json"),
            ("JOB_TRACKER_TICK_SECS", "5"),
            ("JOB_TRACKER_PORT", "8081"),
            ("JOB_TRACKER_LOG_DIR", "/var/log/jobs"),
        ]);
        assert_eq!(config.db_path, PathBuf::from("/tmp/jobs.json"));
        assert_eq!(config.port, 8081);
        assert_eq!(config.log_dir, Some(PathBuf::from("/var/log/jobs")));
        assert!(matches!(
            config.tick_schedule(),
            Ok(TickSchedule::Interval(d)) if d == Duration::from_secs(5)
        ));
    }

    #[test]
    fn unparsable_numbers_fall_back() {
        let config = config_from(&[("JOB_TRACKER_PORT", "eighty"), ("JOB_TRACKER_TICK_SECS", "x")]);
        assert_eq!(config.port, 3000);
        assert!(config.tick_interval.is_none());
    }

    #[test]
    fn bad_schedule_is_a_config_error() {
        let config = config_from(&[("JOB_TRACKER_SCHEDULE", "whenever")]);
        assert!(matches!(
            config.tick_schedule(),
            Err(Error::Config(ConfigError::InvalidValue { key, .. })) if key == "JOB_TRACKER_SCHEDULE"
        ));

        let config = config_from(&[("JOB_TRACKER_TICK_SECS", "0")]);
        assert!(matches!(
            config.tick_schedule(),
            Err(Error::Config(ConfigError::InvalidValue { key, .. })) if key == "JOB_TRACKER_TICK_SECS"
        ));
    }
}
