//! Async session engine.
//!
//! [`SessionRegistry`] is the entry point. Every started round gets its own
//! [`SessionTicker`] task which owns the [`crate::game::GameSession`], advances
//! it on a fixed interval and hands the result to the [`OutcomeResolver`].

pub mod config;
pub mod errors;
pub mod messages;
pub mod registry;
pub mod resolver;
pub mod ticker;

pub use config::GameConfig;
pub use errors::{ConfigError, SessionError, SessionResult};
pub use messages::SessionMessage;
pub use registry::{SessionHandle, SessionRegistry};
pub use resolver::{OutcomeResolver, payout_key, stake_key};
pub use ticker::SessionTicker;
