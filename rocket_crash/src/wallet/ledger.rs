//! Ledger trait and the in-memory double-entry implementation.

use super::{
    errors::{LedgerError, LedgerResult},
    models::{Account, EntryDirection, EntryType, LedgerEntry},
};
use crate::game::{Chips, PlayerId};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;

/// Balance owner consumed by the engine.
///
/// Each call must be atomic. The engine calls `debit` once when a round starts
/// and `credit` at most once when it resolves, always with a key unique to the
/// session, so implementations can reject replays.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Take `amount` from the player. Returns the new balance.
    ///
    /// # Errors
    ///
    /// * `LedgerError::InsufficientBalance` - Not enough chips
    /// * `LedgerError::DuplicateTransaction` - Idempotency key already used
    async fn debit(
        &self,
        player_id: PlayerId,
        amount: Chips,
        idempotency_key: &str,
    ) -> LedgerResult<Chips>;

    /// Give `amount` to the player. Returns the new balance.
    async fn credit(
        &self,
        player_id: PlayerId,
        amount: Chips,
        idempotency_key: &str,
    ) -> LedgerResult<Chips>;
}

#[derive(Default)]
struct Book {
    accounts: HashMap<PlayerId, Account>,
    entries: Vec<LedgerEntry>,
    used_keys: HashSet<String>,
}

impl Book {
    fn account_mut(&mut self, player_id: PlayerId, opening_balance: Chips) -> &mut Account {
        self.accounts.entry(player_id).or_insert_with(|| {
            let now = Utc::now();
            Account {
                player_id,
                balance: opening_balance,
                created_at: now,
                updated_at: now,
            }
        })
    }

    fn claim_key(&mut self, idempotency_key: &str) -> LedgerResult<()> {
        if !self.used_keys.insert(idempotency_key.to_string()) {
            return Err(LedgerError::DuplicateTransaction(
                idempotency_key.to_string(),
            ));
        }
        Ok(())
    }

    fn record(
        &mut self,
        player_id: PlayerId,
        amount: Chips,
        balance_after: Chips,
        entry_type: EntryType,
        idempotency_key: &str,
    ) {
        let direction = if amount < 0 {
            EntryDirection::Debit
        } else {
            EntryDirection::Credit
        };
        let id = self.entries.len() as u64 + 1;
        self.entries.push(LedgerEntry {
            id,
            player_id,
            amount,
            balance_after,
            direction,
            entry_type,
            idempotency_key: idempotency_key.to_string(),
            created_at: Utc::now(),
        });
    }
}

/// In-memory ledger. Accounts open lazily with a default balance.
pub struct InMemoryLedger {
    book: Mutex<Book>,
    default_balance: Chips,
}

impl InMemoryLedger {
    /// Create a ledger whose accounts open with `default_balance`
    pub fn new(default_balance: Chips) -> Self {
        Self {
            book: Mutex::new(Book::default()),
            default_balance,
        }
    }

    pub fn default_balance(&self) -> Chips {
        self.default_balance
    }

    /// Current balance (opens the account if needed)
    pub async fn balance(&self, player_id: PlayerId) -> Chips {
        let mut book = self.book.lock().await;
        book.account_mut(player_id, self.default_balance).balance
    }

    /// Get account details (opens the account if needed)
    pub async fn account(&self, player_id: PlayerId) -> Account {
        let mut book = self.book.lock().await;
        book.account_mut(player_id, self.default_balance).clone()
    }

    /// Top up a player's balance
    ///
    /// # Errors
    ///
    /// * `LedgerError::InvalidAmount` - Amount not positive
    /// * `LedgerError::DuplicateTransaction` - Idempotency key already used
    pub async fn deposit(
        &self,
        player_id: PlayerId,
        amount: Chips,
        idempotency_key: &str,
    ) -> LedgerResult<Chips> {
        self.apply_credit(player_id, amount, idempotency_key, EntryType::Deposit)
            .await
    }

    /// Ledger entries for a player, newest first
    pub async fn entries(&self, player_id: PlayerId, limit: usize) -> Vec<LedgerEntry> {
        let book = self.book.lock().await;
        book.entries
            .iter()
            .rev()
            .filter(|entry| entry.player_id == player_id)
            .take(limit)
            .cloned()
            .collect()
    }

    async fn apply_credit(
        &self,
        player_id: PlayerId,
        amount: Chips,
        idempotency_key: &str,
        entry_type: EntryType,
    ) -> LedgerResult<Chips> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }

        let mut book = self.book.lock().await;
        let current = book.account_mut(player_id, self.default_balance).balance;
        let new_balance = current
            .checked_add(amount)
            .ok_or(LedgerError::BalanceOverflow(player_id))?;
        book.claim_key(idempotency_key)?;

        let account = book.account_mut(player_id, self.default_balance);
        account.balance = new_balance;
        account.updated_at = Utc::now();
        book.record(player_id, amount, new_balance, entry_type, idempotency_key);

        Ok(new_balance)
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn debit(
        &self,
        player_id: PlayerId,
        amount: Chips,
        idempotency_key: &str,
    ) -> LedgerResult<Chips> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }

        let mut book = self.book.lock().await;
        let current = book.account_mut(player_id, self.default_balance).balance;
        if current < amount {
            return Err(LedgerError::InsufficientBalance {
                available: current,
                required: amount,
            });
        }
        book.claim_key(idempotency_key)?;

        let new_balance = current - amount;
        let account = book.account_mut(player_id, self.default_balance);
        account.balance = new_balance;
        account.updated_at = Utc::now();
        book.record(
            player_id,
            -amount,
            new_balance,
            EntryType::Stake,
            idempotency_key,
        );

        Ok(new_balance)
    }

    async fn credit(
        &self,
        player_id: PlayerId,
        amount: Chips,
        idempotency_key: &str,
    ) -> LedgerResult<Chips> {
        self.apply_credit(player_id, amount, idempotency_key, EntryType::Payout)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_account_opens_with_default_balance() {
        let ledger = InMemoryLedger::new(1000);
        assert_eq!(ledger.balance(42).await, 1000);
        let account = ledger.account(42).await;
        assert_eq!(account.player_id, 42);
        assert!(ledger.entries(42, 10).await.is_empty());
    }

    #[tokio::test]
    async fn test_debit_and_credit() {
        let ledger = InMemoryLedger::new(1000);
        assert_eq!(ledger.debit(1, 100, "stake_a").await, Ok(900));
        assert_eq!(ledger.credit(1, 340, "payout_a").await, Ok(1240));

        let entries = ledger.entries(1, 10).await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].entry_type, EntryType::Payout);
        assert_eq!(entries[0].direction, EntryDirection::Credit);
        assert_eq!(entries[0].balance_after, 1240);
        assert_eq!(entries[1].amount, -100);
        assert_eq!(entries[1].direction, EntryDirection::Debit);
    }

    #[tokio::test]
    async fn test_insufficient_balance_leaves_no_trace() {
        let ledger = InMemoryLedger::new(50);
        let err = ledger.debit(1, 100, "stake_b").await.unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientBalance {
                available: 50,
                required: 100
            }
        );
        assert_eq!(ledger.balance(1).await, 50);
        assert!(ledger.entries(1, 10).await.is_empty());

        // The key was not consumed by the failed attempt
        assert_eq!(ledger.debit(1, 50, "stake_b").await, Ok(0));
    }

    #[tokio::test]
    async fn test_duplicate_key_rejected() {
        let ledger = InMemoryLedger::new(1000);
        ledger.credit(1, 10, "payout_c").await.unwrap();
        let err = ledger.credit(1, 10, "payout_c").await.unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateTransaction(_)));
        assert_eq!(ledger.balance(1).await, 1010);
    }

    #[tokio::test]
    async fn test_invalid_amounts() {
        let ledger = InMemoryLedger::new(1000);
        assert_eq!(
            ledger.debit(1, 0, "k1").await,
            Err(LedgerError::InvalidAmount(0))
        );
        assert_eq!(
            ledger.credit(1, -5, "k2").await,
            Err(LedgerError::InvalidAmount(-5))
        );
    }

    #[tokio::test]
    async fn test_credit_overflow() {
        let ledger = InMemoryLedger::new(Chips::MAX - 1);
        assert_eq!(
            ledger.credit(9, 2, "k").await,
            Err(LedgerError::BalanceOverflow(9))
        );
    }

    #[tokio::test]
    async fn test_deposit_records_entry_type() {
        let ledger = InMemoryLedger::new(0);
        assert_eq!(ledger.deposit(5, 1000, "deposit_1").await, Ok(1000));
        let entries = ledger.entries(5, 1).await;
        assert_eq!(entries[0].entry_type, EntryType::Deposit);
    }

    #[test]
    fn test_client_message_sanitizes() {
        let err = LedgerError::Unavailable("connection refused to 10.0.0.3".to_string());
        assert_eq!(err.client_message(), "Internal server error");
    }
}
