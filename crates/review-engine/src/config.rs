//! Review configuration from environment variables

use std::env;
use std::time::Duration;

use crate::error::ReviewError;
use crate::orchestrator::PoolSettings;

/// Shallowest search a review may request.
pub const MIN_DEPTH: u32 = 1;
/// Deepest search a review may request.
pub const MAX_DEPTH: u32 = 24;

#[derive(Clone, Debug)]
pub struct ReviewConfig {
    /// Path to Stockfish binary
    pub stockfish_path: String,

    /// Hash table size per Stockfish process, in MB
    pub stockfish_hash_mb: u32,

    /// Target search depth when the caller doesn't pick one
    pub default_depth: u32,

    /// Maximum concurrent Stockfish processes
    pub max_workers: usize,

    /// Base URL of the cloud evaluation service
    pub cloud_eval_url: String,

    /// Per-request timeout for cloud lookups
    pub cloud_timeout: Duration,

    /// Time a single local worker may spend on one position
    pub worker_timeout: Duration,

    /// Attempts per position (first try included) before the run fails
    pub worker_max_attempts: u32,

    /// How often live engine depth is folded into progress
    pub progress_interval: Duration,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            stockfish_path: "/usr/local/bin/stockfish".to_string(),
            stockfish_hash_mb: 16,
            default_depth: 16,
            max_workers: 8,
            cloud_eval_url: "https://lichess.org".to_string(),
            cloud_timeout: Duration::from_secs(10),
            worker_timeout: Duration::from_secs(120),
            worker_max_attempts: 2,
            progress_interval: Duration::from_millis(100),
        }
    }
}

impl ReviewConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ReviewError> {
        let defaults = Self::default();

        let config = Self {
            stockfish_path: env::var("STOCKFISH_PATH").unwrap_or(defaults.stockfish_path),
            stockfish_hash_mb: parse_var("STOCKFISH_HASH_MB")?.unwrap_or(defaults.stockfish_hash_mb),
            default_depth: parse_var("REVIEW_DEPTH")?.unwrap_or(defaults.default_depth),
            max_workers: parse_var("MAX_WORKERS")?.unwrap_or(defaults.max_workers),
            cloud_eval_url: env::var("CLOUD_EVAL_URL").unwrap_or(defaults.cloud_eval_url),
            cloud_timeout: parse_var("CLOUD_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.cloud_timeout),
            worker_timeout: parse_var("WORKER_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.worker_timeout),
            worker_max_attempts: parse_var("WORKER_MAX_ATTEMPTS")?
                .unwrap_or(defaults.worker_max_attempts),
            progress_interval: parse_var("PROGRESS_INTERVAL_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.progress_interval),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReviewError> {
        validate_depth(self.default_depth)?;
        if self.max_workers == 0 {
            return Err(ReviewError::Config("MAX_WORKERS must be at least 1".into()));
        }
        if self.worker_max_attempts == 0 {
            return Err(ReviewError::Config(
                "WORKER_MAX_ATTEMPTS must be at least 1".into(),
            ));
        }
        if self.worker_timeout.is_zero() {
            return Err(ReviewError::Config("WORKER_TIMEOUT_SECS must be at least 1".into()));
        }
        if self.progress_interval.is_zero() {
            return Err(ReviewError::Config(
                "PROGRESS_INTERVAL_MS must be at least 1".into(),
            ));
        }
        self.pool_settings().validate()
    }

    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            max_workers: self.max_workers,
            worker_timeout: self.worker_timeout,
            max_attempts: self.worker_max_attempts,
            progress_interval: self.progress_interval,
        }
    }
}

/// Reject search depths outside the supported range.
pub fn validate_depth(depth: u32) -> Result<(), ReviewError> {
    if (MIN_DEPTH..=MAX_DEPTH).contains(&depth) {
        Ok(())
    } else {
        Err(ReviewError::InvalidDepth {
            depth,
            min: MIN_DEPTH,
            max: MAX_DEPTH,
        })
    }
}

/// Unset is `None`; set but unparseable is an error rather than a silent default.
fn parse_var<T: std::str::FromStr>(name: &'static str) -> Result<Option<T>, ReviewError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ReviewError::Config(format!("{name} has invalid value {raw:?}"))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_bounds() {
        assert!(validate_depth(1).is_ok());
        assert!(validate_depth(24).is_ok());
        assert!(matches!(
            validate_depth(0),
            Err(ReviewError::InvalidDepth { depth: 0, .. })
        ));
        assert!(validate_depth(25).is_err());
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = ReviewConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pool_settings().max_workers, 8);
    }

    #[test]
    fn test_zero_workers_rejected() {
        let config = ReviewConfig {
            max_workers: 0,
            ..ReviewConfig::default()
        };
        assert!(matches!(config.validate(), Err(ReviewError::Config(_))));
    }

    #[test]
    fn test_zero_durations_rejected() {
        let no_interval = ReviewConfig {
            progress_interval: Duration::ZERO,
            ..ReviewConfig::default()
        };
        assert!(matches!(no_interval.validate(), Err(ReviewError::Config(_))));

        let no_timeout = ReviewConfig {
            worker_timeout: Duration::ZERO,
            ..ReviewConfig::default()
        };
        assert!(matches!(no_timeout.validate(), Err(ReviewError::Config(_))));
    }
}
