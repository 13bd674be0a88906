//! Ledger error types.

use crate::game::{Chips, PlayerId};
use thiserror::Error;

/// Ledger errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// Insufficient balance
    #[error("Insufficient balance: available {available}, required {required}")]
    InsufficientBalance { available: Chips, required: Chips },

    /// Invalid amount (must be positive)
    #[error("Invalid amount: {0}")]
    InvalidAmount(Chips),

    /// Duplicate transaction (idempotency key already used)
    #[error("Duplicate transaction: {0}")]
    DuplicateTransaction(String),

    /// Balance would overflow
    #[error("Balance overflow for player {0}")]
    BalanceOverflow(PlayerId),

    /// Backend failure in an external ledger implementation
    #[error("Ledger unavailable: {0}")]
    Unavailable(String),
}

impl LedgerError {
    /// Get a client-safe error message that doesn't leak internal details
    pub fn client_message(&self) -> String {
        match self {
            LedgerError::Unavailable(_) => "Internal server error".to_string(),
            LedgerError::BalanceOverflow(_) => "Balance limit reached".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;
