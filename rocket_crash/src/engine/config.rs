//! Game configuration.

use super::errors::ConfigError;
use crate::game::{Chips, CrashPointSampler, Multiplier, RoundRules};
use serde::{Deserialize, Serialize};
use std::{str::FromStr, time::Duration};

/// Tunables shared by every round the engine runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    /// Target long-run return-to-player, in (0, 1)
    pub rtp: f64,

    /// Maximum multiplier
    pub cap: f64,

    /// Time between ticks in milliseconds
    pub tick_interval_ms: u64,

    /// Linear multiplier increment per tick
    pub multiplier_step: f64,

    /// Smallest accepted stake
    pub min_stake: Chips,

    /// Largest accepted stake
    pub max_stake: Chips,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            rtp: 0.75,
            cap: 10_000.0,
            tick_interval_ms: 100,
            multiplier_step: 0.01,
            min_stake: 1,
            max_stake: 100_000,
        }
    }
}

impl GameConfig {
    /// Load configuration from `ROCKET_*` environment variables, falling back
    /// to defaults for unset ones
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if a variable is set but cannot be parsed
    /// or the resulting configuration fails validation
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let config = Self {
            rtp: parse_env("ROCKET_RTP")?.unwrap_or(defaults.rtp),
            cap: parse_env("ROCKET_CAP")?.unwrap_or(defaults.cap),
            tick_interval_ms: parse_env("ROCKET_TICK_INTERVAL_MS")?
                .unwrap_or(defaults.tick_interval_ms),
            multiplier_step: parse_env("ROCKET_MULTIPLIER_STEP")?
                .unwrap_or(defaults.multiplier_step),
            min_stake: parse_env("ROCKET_MIN_STAKE")?.unwrap_or(defaults.min_stake),
            max_stake: parse_env("ROCKET_MAX_STAKE")?.unwrap_or(defaults.max_stake),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.rtp > 0.0 && self.rtp < 1.0) {
            return Err(ConfigError::invalid(
                "ROCKET_RTP",
                format!("Must be between 0 and 1 (exclusive), got {}", self.rtp),
            ));
        }

        if !self.cap.is_finite() || self.cap < 1.0 {
            return Err(ConfigError::invalid(
                "ROCKET_CAP",
                format!("Must be a finite value of at least 1, got {}", self.cap),
            ));
        }

        if self.tick_interval_ms == 0 {
            return Err(ConfigError::invalid(
                "ROCKET_TICK_INTERVAL_MS",
                "Must be greater than 0",
            ));
        }

        match Multiplier::units_from_f64(self.multiplier_step) {
            Some(units) if units > 0 => {}
            _ => {
                return Err(ConfigError::invalid(
                    "ROCKET_MULTIPLIER_STEP",
                    format!(
                        "Must be positive and at least 0.0001, got {}",
                        self.multiplier_step
                    ),
                ));
            }
        }

        if self.min_stake <= 0 {
            return Err(ConfigError::invalid(
                "ROCKET_MIN_STAKE",
                "Must be greater than 0",
            ));
        }

        if self.max_stake < self.min_stake {
            return Err(ConfigError::invalid(
                "ROCKET_MAX_STAKE",
                format!("Must be at least min stake ({})", self.min_stake),
            ));
        }

        if self.cap_multiplier().apply(self.max_stake).is_none() {
            return Err(ConfigError::invalid(
                "ROCKET_MAX_STAKE",
                format!("Max stake times cap ({}) overflows", self.cap),
            ));
        }

        Ok(())
    }

    pub fn cap_multiplier(&self) -> Multiplier {
        Multiplier::from_f64(self.cap)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Per-round rules. Only meaningful on a validated config.
    pub fn rules(&self) -> RoundRules {
        RoundRules {
            step_units: Multiplier::units_from_f64(self.multiplier_step).unwrap_or(1),
            cap: self.cap_multiplier(),
        }
    }

    pub fn sampler(&self) -> CrashPointSampler {
        CrashPointSampler::new(self.rtp, self.cap_multiplier())
    }

    /// Whether `stake` lies within `[min_stake, max_stake]`
    pub fn accepts_stake(&self, stake: Chips) -> bool {
        (self.min_stake..=self.max_stake).contains(&stake)
    }
}

/// Parse an optional environment variable; set but unparseable is an error
fn parse_env<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| ConfigError::invalid(key, format!("Cannot parse '{raw}': {e}"))),
        Err(_) => Ok(None),
    }
}
