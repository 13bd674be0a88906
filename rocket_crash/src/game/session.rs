//! Game session entity and per-tick state machine.
//!
//! A session is driven by exactly one owner (its ticker task). The owner calls
//! [`GameSession::evaluate`] once per tick, publishes progress on
//! [`TickStep::Continue`], then calls [`GameSession::advance`].

use super::multiplier::{Chips, Multiplier, PlayerId};
use super::outcome::Resolution;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Session lifecycle states
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Pending,
    Running,
    CashedOut,
    Exploded,
    Cancelled,
    MaxReached,
}

impl SessionState {
    /// Terminal states are write-once.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending | Self::Running)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::CashedOut => "cashed_out",
            Self::Exploded => "exploded",
            Self::Cancelled => "cancelled",
            Self::MaxReached => "max_reached",
        };
        write!(f, "{repr}")
    }
}

/// External requests a ticker checks at the start of each tick
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Signal {
    /// Lock in the current multiplier
    CashOut,
    /// Player abort, stake refunded
    Stop,
    /// Operator abort, stake kept
    Forfeit,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::CashOut => write!(f, "cash_out"),
            Signal::Stop => write!(f, "stop"),
            Signal::Forfeit => write!(f, "forfeit"),
        }
    }
}

/// Errors raised by illegal lifecycle transitions
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
pub enum TransitionError {
    #[error("session already running")]
    AlreadyRunning,
    #[error("session already resolved as {0}")]
    AlreadyResolved(SessionState),
}

/// Per-round rules fixed at session creation
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RoundRules {
    /// Linear multiplier increment per tick, in fixed-point units
    pub step_units: u64,
    /// Maximum multiplier
    pub cap: Multiplier,
}

/// What the owner should do after evaluating a tick
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TickStep {
    /// Publish progress, then advance
    Continue {
        multiplier: Multiplier,
        potential_payout: Chips,
    },
    /// Resolve the session with this cause
    Resolve(Resolution),
    /// Session is not running; nothing to do
    Idle,
}

/// One player's round
#[derive(Clone, Debug)]
pub struct GameSession {
    id: Uuid,
    player_id: PlayerId,
    stake: Chips,
    crash_point: Multiplier,
    multiplier: Multiplier,
    state: SessionState,
    rules: RoundRules,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    payout: Option<Chips>,
}

impl GameSession {
    /// Create a pending session. The crash point is clamped to the cap.
    pub fn new(player_id: PlayerId, stake: Chips, crash_point: Multiplier, rules: RoundRules) -> Self {
        Self::with_id(Uuid::new_v4(), player_id, stake, crash_point, rules)
    }

    /// Create a pending session under an id chosen by the caller
    pub fn with_id(
        id: Uuid,
        player_id: PlayerId,
        stake: Chips,
        crash_point: Multiplier,
        rules: RoundRules,
    ) -> Self {
        Self {
            id,
            player_id,
            stake,
            crash_point: crash_point.min(rules.cap),
            multiplier: Multiplier::ONE,
            state: SessionState::Pending,
            rules,
            created_at: Utc::now(),
            started_at: None,
            payout: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn player_id(&self) -> PlayerId {
        self.player_id
    }

    pub fn stake(&self) -> Chips {
        self.stake
    }

    pub fn multiplier(&self) -> Multiplier {
        self.multiplier
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn rules(&self) -> RoundRules {
        self.rules
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Payout, defined once the session is terminal
    pub fn payout(&self) -> Option<Chips> {
        self.payout
    }

    /// Crash point; only meant for resolution and tests, never for players.
    pub(crate) fn crash_point(&self) -> Multiplier {
        self.crash_point
    }

    /// Pending -> Running
    pub fn start(&mut self) -> Result<(), TransitionError> {
        match self.state {
            SessionState::Pending => {
                self.state = SessionState::Running;
                self.started_at = Some(Utc::now());
                Ok(())
            }
            SessionState::Running => Err(TransitionError::AlreadyRunning),
            terminal => Err(TransitionError::AlreadyResolved(terminal)),
        }
    }

    /// Steps 1 to 3 of a tick: pending signal, explosion, cap.
    ///
    /// A signal wins over explosion and cap, and is honored at the current
    /// multiplier without advancing first.
    pub fn evaluate(&self, signal: Option<Signal>) -> TickStep {
        if self.state != SessionState::Running {
            return TickStep::Idle;
        }

        if let Some(signal) = signal {
            return TickStep::Resolve(Resolution::from(signal));
        }

        if self.has_exploded() {
            return TickStep::Resolve(Resolution::Exploded);
        }

        if self.multiplier >= self.rules.cap {
            return TickStep::Resolve(Resolution::MaxReached);
        }

        TickStep::Continue {
            multiplier: self.multiplier,
            potential_payout: self.potential_payout(),
        }
    }

    /// Step 4 tail: grow the multiplier by one step, saturating at the cap.
    pub fn advance(&mut self) {
        if self.state == SessionState::Running {
            self.multiplier = self
                .multiplier
                .step_towards(self.rules.step_units, self.rules.cap);
        }
    }

    /// Payout the player would receive by cashing out now
    pub fn potential_payout(&self) -> Chips {
        self.multiplier.apply(self.stake).unwrap_or(Chips::MAX)
    }

    /// A crash point clamped to the cap never explodes; the round ends as
    /// MaxReached instead.
    fn has_exploded(&self) -> bool {
        self.crash_point < self.rules.cap && self.multiplier >= self.crash_point
    }

    /// Record the terminal state. Returns `false` if already terminal.
    pub(super) fn conclude(&mut self, state: SessionState, payout: Chips) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.state = state;
        self.payout = Some(payout);
        true
    }

    /// Read-only view for progress queries. Does not include the crash point.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id,
            player_id: self.player_id,
            stake: self.stake,
            multiplier: self.multiplier,
            potential_payout: self.potential_payout(),
            state: self.state,
            created_at: self.created_at,
            started_at: self.started_at,
            payout: self.payout,
        }
    }
}

/// Read-only session view
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub player_id: PlayerId,
    pub stake: Chips,
    pub multiplier: Multiplier,
    pub potential_payout: Chips,
    pub state: SessionState,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub payout: Option<Chips>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::outcome::resolve;

    fn rules() -> RoundRules {
        RoundRules {
            step_units: 100,
            cap: Multiplier::from_f64(10_000.0),
        }
    }

    fn running(stake: Chips, crash_point: f64) -> GameSession {
        let mut session = GameSession::new(1, stake, Multiplier::from_f64(crash_point), rules());
        session.start().unwrap();
        session
    }

    /// Tick without signals until the session wants to resolve, returning every
    /// published multiplier.
    fn run_until_resolve(session: &mut GameSession) -> (Vec<Multiplier>, Resolution) {
        let mut published = Vec::new();
        loop {
            match session.evaluate(None) {
                TickStep::Continue { multiplier, .. } => {
                    published.push(multiplier);
                    session.advance();
                }
                TickStep::Resolve(resolution) => return (published, resolution),
                TickStep::Idle => panic!("session not running"),
            }
        }
    }

    // === Lifecycle ===

    #[test]
    fn test_new_session_is_pending() {
        let session = GameSession::new(7, 100, Multiplier::from_f64(2.0), rules());
        assert_eq!(session.state(), SessionState::Pending);
        assert_eq!(session.multiplier(), Multiplier::ONE);
        assert!(session.started_at().is_none());
        assert!(session.payout().is_none());
        assert_eq!(session.evaluate(None), TickStep::Idle);
    }

    #[test]
    fn test_start_sets_running() {
        let session = running(100, 2.0);
        assert_eq!(session.state(), SessionState::Running);
        assert!(session.started_at().is_some());
    }

    #[test]
    fn test_start_twice_fails() {
        let mut session = running(100, 2.0);
        assert_eq!(session.start(), Err(TransitionError::AlreadyRunning));
    }

    #[test]
    fn test_crash_point_clamped_to_cap() {
        let session = GameSession::new(1, 50, Multiplier::from_f64(1e9), rules());
        assert_eq!(session.crash_point(), rules().cap);
    }

    // === Tick ordering ===

    #[test]
    fn test_signal_takes_precedence_over_explosion() {
        let mut session = running(100, 1.02);
        session.advance();
        session.advance();
        assert_eq!(session.multiplier(), Multiplier::from_units(10_200));

        assert_eq!(
            session.evaluate(Some(Signal::CashOut)),
            TickStep::Resolve(Resolution::CashedOut)
        );
        assert_eq!(
            session.evaluate(None),
            TickStep::Resolve(Resolution::Exploded)
        );
    }

    #[test]
    fn test_scenario_b_explodes_at_crash_point() {
        let mut session = running(100, 1.02);
        let (published, resolution) = run_until_resolve(&mut session);

        assert_eq!(
            published,
            vec![Multiplier::from_units(10_000), Multiplier::from_units(10_100)]
        );
        assert_eq!(resolution, Resolution::Exploded);
        assert_eq!(session.multiplier(), Multiplier::from_units(10_200));

        let outcome = resolve(&mut session, resolution).unwrap();
        assert_eq!(outcome.payout, 0);
        assert_eq!(session.state(), SessionState::Exploded);
    }

    #[test]
    fn test_scenario_a_cash_out_at_current_multiplier() {
        let mut session = running(100, 3.47);
        let target = Multiplier::from_units(34_000);

        while session.multiplier() < target {
            match session.evaluate(None) {
                TickStep::Continue { .. } => session.advance(),
                other => panic!("unexpected {other:?}"),
            }
        }

        let step = session.evaluate(Some(Signal::CashOut));
        assert_eq!(step, TickStep::Resolve(Resolution::CashedOut));
        let outcome = resolve(&mut session, Resolution::CashedOut).unwrap();
        assert_eq!(outcome.multiplier, target);
        assert_eq!(outcome.payout, 340);
    }

    #[test]
    fn test_cap_scenario_reaches_max() {
        let mut session = running(50, f64::INFINITY);
        let (published, resolution) = run_until_resolve(&mut session);

        assert_eq!(resolution, Resolution::MaxReached);
        assert_eq!(published.len(), 999_900);
        assert_eq!(session.multiplier(), rules().cap);

        let outcome = resolve(&mut session, resolution).unwrap();
        assert_eq!(outcome.payout, 500_000);
        assert_eq!(session.state(), SessionState::MaxReached);
    }

    #[test]
    fn test_published_multipliers_are_non_decreasing() {
        let mut session = running(10, 7.5);
        let (published, _) = run_until_resolve(&mut session);
        assert!(published.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_advance_is_noop_once_terminal() {
        let mut session = running(100, 5.0);
        session.advance();
        resolve(&mut session, Resolution::Cancelled { refunded: true }).unwrap();
        let frozen = session.multiplier();
        session.advance();
        assert_eq!(session.multiplier(), frozen);
        assert_eq!(session.evaluate(Some(Signal::CashOut)), TickStep::Idle);
    }

    #[test]
    fn test_snapshot_hides_crash_point() {
        let session = running(100, 3.47);
        let snapshot = session.snapshot();
        assert_eq!(snapshot.stake, 100);
        assert_eq!(snapshot.potential_payout, 100);
        assert_eq!(snapshot.state, SessionState::Running);

        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(!json.contains("crash"));
    }
}
