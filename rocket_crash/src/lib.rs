//! # Rocket Crash
//!
//! A "crash" wagering game engine. A player stakes chips, a multiplier climbs
//! from 1.00x one step per tick, and the player has to cash out before a
//! pre-committed, hidden crash point is reached. Missing it loses the stake.
//!
//! Crash points are drawn so that a player who always cashes out at the same
//! multiplier gets back the configured return-to-player (RTP) over many rounds.
//!
//! ## Architecture
//!
//! - **Pending**: slot reserved, stake being debited
//! - **Running**: the multiplier advances each tick, progress is published
//! - **CashedOut / Cancelled**: a player or operator signal arrived
//! - **Exploded**: the multiplier reached the crash point
//! - **MaxReached**: the multiplier reached the cap
//!
//! ## Core Modules
//!
//! - [`game`]: Multipliers, crash point sampling, the session state machine
//! - [`engine`]: Session registry and per-session ticker tasks
//! - [`wallet`]: The ledger seam and an in-memory ledger
//! - [`progress`]: The progress sink seam, stock sinks and statistics
//!
//! ## Example
//!
//! ```
//! use rocket_crash::{GameConfig, InMemoryLedger, LogSink, SessionRegistry};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = GameConfig {
//!         tick_interval_ms: 1,
//!         ..GameConfig::default()
//!     };
//!     let ledger = Arc::new(InMemoryLedger::new(1000));
//!     let registry = SessionRegistry::new(config, ledger.clone(), Arc::new(LogSink))?;
//!
//!     let handle = registry.start(1, 100).await?;
//!     registry.request_cash_out(1).await?;
//!     let outcome = handle.wait().await?;
//!
//!     assert_eq!(ledger.balance(1).await, 900 + outcome.payout);
//!     Ok(())
//! }
//! ```

/// Async session engine: registry, tickers, resolution side effects.
pub mod engine;
pub use engine::{
    ConfigError, GameConfig, SessionError, SessionHandle, SessionRegistry, SessionResult,
};

/// Pure game logic.
pub mod game;
pub use game::{
    Chips, CrashPointSampler, Multiplier, PlayerId, Resolution, ResolvedOutcome,
    SessionSnapshot, SessionState,
};

/// Progress sinks and statistics.
pub mod progress;
pub use progress::{FanoutSink, LogSink, ProgressSink, StatsBook, SubscriberSink};

/// Ledger seam and in-memory ledger.
pub mod wallet;
pub use wallet::{InMemoryLedger, Ledger};
