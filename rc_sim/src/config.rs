//! Simulator configuration management.
//!
//! Game tunables come from `ROCKET_*` variables (see [`GameConfig::from_env`]);
//! the simulation itself reads `SIM_*` variables, overridden by CLI flags.

use rocket_crash::{Chips, GameConfig, Multiplier};

/// Complete simulator configuration
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Engine configuration
    pub game: GameConfig,
    /// Opening balance of every simulated player
    pub default_balance: Chips,
    /// Number of concurrent simulated players
    pub players: usize,
    /// Rounds each player plays
    pub rounds: u32,
    /// Stake per round
    pub stake: Chips,
    /// Base cash-out multiplier
    pub target: f64,
    /// Relative per-player spread around `target`, in [0, 1)
    pub target_jitter: f64,
    /// Top-up amount when a player runs out of chips
    pub top_up: Chips,
    /// Run only the offline RTP check with this many rounds
    pub rtp_check: Option<u64>,
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct SimOverrides {
    pub players: Option<usize>,
    pub rounds: Option<u32>,
    pub stake: Option<Chips>,
    pub target: Option<f64>,
    pub rtp_check: Option<u64>,
}

impl SimConfig {
    /// Load configuration from environment variables and CLI overrides
    ///
    /// # Errors
    ///
    /// Returns error if the game configuration is invalid
    pub fn from_env(overrides: SimOverrides) -> Result<Self, ConfigError> {
        let game = GameConfig::from_env()?;

        Ok(SimConfig {
            game,
            default_balance: parse_env_or("DEFAULT_BALANCE", 1000),
            players: overrides
                .players
                .unwrap_or_else(|| parse_env_or("SIM_PLAYERS", 10)),
            rounds: overrides
                .rounds
                .unwrap_or_else(|| parse_env_or("SIM_ROUNDS", 20)),
            stake: overrides
                .stake
                .unwrap_or_else(|| parse_env_or("SIM_STAKE", 100)),
            target: overrides
                .target
                .unwrap_or_else(|| parse_env_or("SIM_TARGET", 2.0)),
            target_jitter: parse_env_or("SIM_TARGET_JITTER", 0.25),
            top_up: parse_env_or("SIM_TOP_UP", 1000),
            rtp_check: overrides.rtp_check,
        })
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.players == 0 {
            return Err(ConfigError::invalid("SIM_PLAYERS", "Must be greater than 0"));
        }

        if self.rounds == 0 {
            return Err(ConfigError::invalid("SIM_ROUNDS", "Must be greater than 0"));
        }

        if !self.game.accepts_stake(self.stake) {
            return Err(ConfigError::invalid(
                "SIM_STAKE",
                format!(
                    "Must be between {} and {}",
                    self.game.min_stake, self.game.max_stake
                ),
            ));
        }

        if !(self.target > 1.0 && self.target <= self.game.cap) {
            return Err(ConfigError::invalid(
                "SIM_TARGET",
                format!("Must be above 1.0 and at most the cap ({})", self.game.cap),
            ));
        }

        if !(0.0..1.0).contains(&self.target_jitter) {
            return Err(ConfigError::invalid(
                "SIM_TARGET_JITTER",
                "Must be in [0, 1)",
            ));
        }

        if self.top_up < self.stake {
            return Err(ConfigError::invalid(
                "SIM_TOP_UP",
                format!("Must cover at least one stake ({})", self.stake),
            ));
        }

        if self.rtp_check == Some(0) {
            return Err(ConfigError::invalid("--rtp-check", "Must be greater than 0"));
        }

        Ok(())
    }

    /// Cash-out target for one player, spread by `spread` in [-1, 1]
    pub fn target_for(&self, spread: f64) -> Multiplier {
        let target = self.target * (1.0 + self.target_jitter * spread.clamp(-1.0, 1.0));
        Multiplier::from_f64(target.max(1.01)).min(self.game.cap_multiplier())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Game(#[from] rocket_crash::ConfigError),

    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

impl ConfigError {
    fn invalid(var: &str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            var: var.to_string(),
            reason: reason.into(),
        }
    }
}

/// Helper to parse environment variable with default fallback
fn parse_env_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
