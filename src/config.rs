/// Configuration management
use crate::error::{BoardError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_NOTICE_TTL_SECS: u64 = 5;
const DEFAULT_NOTICE_CAP: usize = 8;
const DEFAULT_SUBMIT_MIN_INTERVAL_MS: u64 = 1000;

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// How long a notice stays visible before auto-dismissal
    pub notice_ttl: Duration,

    /// Max concurrently visible notices (oldest dropped past this)
    pub notice_cap: usize,

    /// Minimum interval between two accepted submissions
    pub submit_min_interval: Duration,

    /// Optional data directory for the persisted session identity
    /// (defaults to in-memory only when unset)
    pub data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            notice_ttl: Duration::from_secs(DEFAULT_NOTICE_TTL_SECS),
            notice_cap: DEFAULT_NOTICE_CAP,
            submit_min_interval: Duration::from_millis(DEFAULT_SUBMIT_MIN_INTERVAL_MS),
            data_dir: None,
        }
    }
}

fn env_millis(name: &str) -> Result<Option<Duration>> {
    match std::env::var(name) {
        Ok(raw) => {
            let ms = raw
                .parse::<u64>()
                .map_err(|_| BoardError::Config(format!("{} must be a number of ms", name)))?;
            Ok(Some(Duration::from_millis(ms)))
        }
        Err(_) => Ok(None),
    }
}

impl Config {
    /// Create config from environment overrides (nice for scripts)
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(ttl) = env_millis("BOARDLINK_NOTICE_TTL_MS")? {
            config.notice_ttl = ttl;
        }
        if let Ok(raw) = std::env::var("BOARDLINK_NOTICE_CAP") {
            let cap = raw.parse::<usize>().map_err(|_| {
                BoardError::Config("BOARDLINK_NOTICE_CAP must be a number".to_string())
            })?;
            config.notice_cap = cap.max(1);
        }
        if let Some(interval) = env_millis("BOARDLINK_SUBMIT_MIN_INTERVAL_MS")? {
            config.submit_min_interval = interval;
        }
        if let Ok(dir) = std::env::var("BOARDLINK_DATA_DIR") {
            config.data_dir = Some(PathBuf::from(dir));
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.notice_ttl, Duration::from_secs(5));
        assert_eq!(config.notice_cap, 8);
        assert_eq!(config.submit_min_interval, Duration::from_millis(1000));
        assert!(config.data_dir.is_none());
    }
}
