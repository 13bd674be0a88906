//! Engine error types.

use crate::game::{Chips, PlayerId};
use crate::wallet::LedgerError;
use thiserror::Error;

/// Errors returned by the session control API
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    /// Player already has a pending or running session
    #[error("Player {0} already has an active session")]
    AlreadyActive(PlayerId),

    /// No running session for the player
    #[error("No active session for player {0}")]
    NotFound(PlayerId),

    /// Stake outside the configured bounds
    #[error("Invalid stake {stake}: must be between {min} and {max}")]
    InvalidStake { stake: Chips, min: Chips, max: Chips },

    /// Ledger refused the stake debit for lack of funds
    #[error("Insufficient funds: available {available}, required {required}")]
    InsufficientFunds { available: Chips, required: Chips },

    /// Any other ledger failure while taking the stake
    #[error("Ledger error: {0}")]
    Ledger(LedgerError),

    /// The session task stopped unexpectedly
    #[error("Session task failed: {0}")]
    TaskFailed(String),
}

impl SessionError {
    /// Get a client-safe error message that doesn't leak internal details
    pub fn client_message(&self) -> String {
        match self {
            SessionError::AlreadyActive(_) => {
                "You already have an active game. Cash out or stop it first.".to_string()
            }
            SessionError::NotFound(_) => "You have no active game.".to_string(),
            SessionError::InvalidStake { min, max, .. } => {
                format!("Bet must be between {min} and {max}.")
            }
            SessionError::InsufficientFunds { available, .. } => {
                format!("Insufficient balance. Your balance: {available}")
            }
            SessionError::Ledger(e) => e.client_message(),
            SessionError::TaskFailed(_) => "Internal server error".to_string(),
        }
    }
}

impl From<LedgerError> for SessionError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientBalance {
                available,
                required,
            } => SessionError::InsufficientFunds {
                available,
                required,
            },
            other => SessionError::Ledger(other),
        }
    }
}

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;

/// Configuration error types
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(var: &str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            var: var.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_balance_maps_to_insufficient_funds() {
        let err = SessionError::from(LedgerError::InsufficientBalance {
            available: 40,
            required: 100,
        });
        assert_eq!(
            err,
            SessionError::InsufficientFunds {
                available: 40,
                required: 100
            }
        );
        assert_eq!(err.client_message(), "Insufficient balance. Your balance: 40");
    }

    #[test]
    fn test_other_ledger_errors_wrap() {
        let err = SessionError::from(LedgerError::Unavailable("db down".to_string()));
        assert!(matches!(err, SessionError::Ledger(_)));
        assert_eq!(err.client_message(), "Internal server error");
    }

    #[test]
    fn test_invalid_stake_message() {
        let err = SessionError::InvalidStake {
            stake: 0,
            min: 1,
            max: 100_000,
        };
        assert_eq!(err.client_message(), "Bet must be between 1 and 100000.");
        assert!(err.to_string().contains("Invalid stake 0"));
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::invalid("ROCKET_RTP", "Must be between 0 and 1 (exclusive)");
        let msg = err.to_string();
        assert!(msg.contains("ROCKET_RTP"));
        assert!(msg.contains("exclusive"));
    }
}
