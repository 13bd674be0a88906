//! Pure game logic: multipliers, crash point sampling, the session state
//! machine and outcome resolution. Nothing here performs I/O or awaits.

pub mod multiplier;
pub mod outcome;
pub mod sampler;
pub mod session;

pub use multiplier::{Chips, MULTIPLIER_SCALE, Multiplier, PlayerId};
pub use outcome::{ResolvedOutcome, Resolution, payout_for, resolve};
pub use sampler::{CrashPointSampler, CrashSource, FixedCrashPoint, RtpReport, simulate_fixed_cashout};
pub use session::{
    GameSession, RoundRules, SessionSnapshot, SessionState, Signal, TickStep, TransitionError,
};
