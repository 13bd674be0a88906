//! Wallet module: the ledger seam the engine debits stakes from and credits
//! payouts to.
//!
//! This module provides:
//! - The [`Ledger`] trait, implemented by whatever owns real balances
//! - [`InMemoryLedger`], a double-entry book with idempotency keys, used by
//!   the simulator and tests
//!
//! ## Example
//!
//! ```
//! use rocket_crash::wallet::{InMemoryLedger, Ledger};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let ledger = InMemoryLedger::new(1000);
//!
//!     let balance = ledger.debit(1, 100, "stake_round_1").await?;
//!     assert_eq!(balance, 900);
//!
//!     let balance = ledger.credit(1, 250, "payout_round_1").await?;
//!     assert_eq!(balance, 1150);
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod ledger;
pub mod models;

pub use errors::{LedgerError, LedgerResult};
pub use ledger::{InMemoryLedger, Ledger};
pub use models::{Account, EntryDirection, EntryType, LedgerEntry};
