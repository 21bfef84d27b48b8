use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bounds for the whole-attempt retry loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    /// Randomized backoff between attempts is drawn uniformly from this
    /// window.
    pub backoff_min: Duration,
    pub backoff_max: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_min: Duration::from_secs(10),
            backoff_max: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    /// Zero-delay variant for tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff_min: Duration::ZERO,
            backoff_max: Duration::ZERO,
        }
    }
}

/// Jitter windows for inter-operation pacing. Each pair is a uniform
/// (min, max) sampling range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacingConfig {
    pub between_uploads: (Duration, Duration),
    /// Additional pause after an upload fails post-retry.
    pub after_failure: (Duration, Duration),
    pub between_accounts: (Duration, Duration),
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            between_uploads: (Duration::from_secs(5), Duration::from_secs(15)),
            after_failure: (Duration::from_secs(10), Duration::from_secs(30)),
            between_accounts: (Duration::from_secs(30), Duration::from_secs(60)),
        }
    }
}

impl PacingConfig {
    /// Zero-delay variant for tests.
    pub fn immediate() -> Self {
        Self {
            between_uploads: (Duration::ZERO, Duration::ZERO),
            after_failure: (Duration::ZERO, Duration::ZERO),
            between_accounts: (Duration::ZERO, Duration::ZERO),
        }
    }
}

/// Run-level knobs for a whole scheduling pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadSettings {
    pub uploads_per_account: u32,
    pub retry: RetryConfig,
    pub pacing: PacingConfig,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            uploads_per_account: 1,
            retry: RetryConfig::default(),
            pacing: PacingConfig::default(),
        }
    }
}

/// Draw a jittered delay from a uniform (min, max) window.
pub fn jittered(window: (Duration, Duration)) -> Duration {
    use rand::Rng;
    let (min, max) = window;
    if max <= min {
        return min;
    }
    let span = (max - min).as_millis() as u64;
    min + Duration::from_millis(rand::thread_rng().gen_range(0..=span))
}
