//! Ledger data models.

use crate::game::{Chips, PlayerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Player account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub player_id: PlayerId,
    pub balance: Chips,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Ledger entry (one side of a double-entry record, the house being the other)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: u64,
    pub player_id: PlayerId,
    /// Signed change applied to the player balance
    pub amount: Chips,
    pub balance_after: Chips,
    pub direction: EntryDirection,
    pub entry_type: EntryType,
    pub idempotency_key: String,
    pub created_at: DateTime<Utc>,
}

/// Entry direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryDirection {
    Debit,
    Credit,
}

impl std::fmt::Display for EntryDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryDirection::Debit => write!(f, "debit"),
            EntryDirection::Credit => write!(f, "credit"),
        }
    }
}

/// Entry type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    /// Stake taken when a round starts
    Stake,
    /// Winnings or refund credited at resolution
    Payout,
    /// Manual top-up
    Deposit,
}

impl std::fmt::Display for EntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryType::Stake => write!(f, "stake"),
            EntryType::Payout => write!(f, "payout"),
            EntryType::Deposit => write!(f, "deposit"),
        }
    }
}
