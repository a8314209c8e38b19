//! Speed profiles
//!
//! A speed profile names a pacing policy: how long to wait between requests
//! and how many requests may be in flight. Slower profiles wait longer and
//! look less like automation.

use rand::Rng;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Named pacing policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeedProfile {
    Fast,
    #[default]
    Moderate,
    Slow,
}

impl SpeedProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Moderate => "moderate",
            Self::Slow => "slow",
        }
    }

    /// Built-in pacing for this profile
    pub fn default_settings(&self) -> SpeedSettings {
        match self {
            Self::Fast => SpeedSettings::new(500, 1_500, 3),
            Self::Moderate => SpeedSettings::new(2_000, 5_000, 2),
            Self::Slow => SpeedSettings::new(8_000, 20_000, 1),
        }
    }
}

impl fmt::Display for SpeedProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpeedProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fast" => Ok(Self::Fast),
            "moderate" => Ok(Self::Moderate),
            "slow" => Ok(Self::Slow),
            other => Err(format!(
                "unknown speed profile '{}', expected fast, moderate or slow",
                other
            )),
        }
    }
}

/// Resolved pacing values of a profile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeedSettings {
    pub min_delay: Duration,
    pub max_delay: Duration,
    /// Maximum number of fetches in flight
    pub concurrency: usize,
}

impl SpeedSettings {
    pub fn new(min_delay_ms: u64, max_delay_ms: u64, concurrency: usize) -> Self {
        Self {
            min_delay: Duration::from_millis(min_delay_ms),
            max_delay: Duration::from_millis(max_delay_ms),
            concurrency,
        }
    }

    /// No delay and a single fetch at a time
    pub fn immediate() -> Self {
        Self::new(0, 0, 1)
    }

    /// Picks a random delay inside the profile's range
    pub fn jittered_delay(&self) -> Duration {
        if self.max_delay <= self.min_delay {
            return self.min_delay;
        }
        let min = self.min_delay.as_millis() as u64;
        let max = self.max_delay.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }
}

/// Per-profile overrides from the `[profiles.*]` tables
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ProfileOverride {
    pub min_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
    pub concurrency: Option<usize>,
}

impl ProfileOverride {
    /// Applies the set fields on top of `base`
    pub fn apply(&self, base: SpeedSettings) -> SpeedSettings {
        SpeedSettings {
            min_delay: self
                .min_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(base.min_delay),
            max_delay: self
                .max_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(base.max_delay),
            concurrency: self.concurrency.unwrap_or(base.concurrency),
        }
    }
}
