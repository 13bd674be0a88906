//! Write-once resolution of a session and the payout rule.

use super::multiplier::{Chips, Multiplier, PlayerId};
use super::session::{GameSession, SessionState, Signal};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Why a session ended
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    CashedOut,
    Exploded,
    MaxReached,
    Cancelled { refunded: bool },
}

impl Resolution {
    /// Terminal state recorded for this cause
    pub fn terminal_state(self) -> SessionState {
        match self {
            Resolution::CashedOut => SessionState::CashedOut,
            Resolution::Exploded => SessionState::Exploded,
            Resolution::MaxReached => SessionState::MaxReached,
            Resolution::Cancelled { .. } => SessionState::Cancelled,
        }
    }
}

impl From<Signal> for Resolution {
    fn from(signal: Signal) -> Self {
        match signal {
            Signal::CashOut => Resolution::CashedOut,
            Signal::Stop => Resolution::Cancelled { refunded: true },
            Signal::Forfeit => Resolution::Cancelled { refunded: false },
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::CashedOut => write!(f, "cashed out"),
            Resolution::Exploded => write!(f, "exploded"),
            Resolution::MaxReached => write!(f, "reached max multiplier"),
            Resolution::Cancelled { refunded: true } => write!(f, "cancelled (refunded)"),
            Resolution::Cancelled { refunded: false } => write!(f, "cancelled (forfeited)"),
        }
    }
}

/// Final record of a session, emitted once
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResolvedOutcome {
    pub session_id: Uuid,
    pub player_id: PlayerId,
    pub resolution: Resolution,
    pub stake: Chips,
    /// Multiplier at resolution time
    pub multiplier: Multiplier,
    /// Revealed only now that the round is over
    pub crash_point: Multiplier,
    pub payout: Chips,
    pub started_at: Option<DateTime<Utc>>,
    pub resolved_at: DateTime<Utc>,
}

impl ResolvedOutcome {
    /// Payout minus stake
    pub fn net(&self) -> Chips {
        self.payout - self.stake
    }

    /// Whether the player kept a multiplied stake
    pub fn is_win(&self) -> bool {
        matches!(
            self.resolution,
            Resolution::CashedOut | Resolution::MaxReached
        )
    }
}

/// Payout for a resolution cause.
///
/// - `CashedOut`: `stake * multiplier`
/// - `Exploded`: 0
/// - `MaxReached`: `stake * cap`
/// - `Cancelled`: `stake` if refunded, 0 otherwise
pub fn payout_for(
    resolution: Resolution,
    stake: Chips,
    multiplier: Multiplier,
    cap: Multiplier,
) -> Chips {
    match resolution {
        Resolution::CashedOut => multiplier.apply(stake).unwrap_or(Chips::MAX),
        Resolution::Exploded => 0,
        Resolution::MaxReached => cap.apply(stake).unwrap_or(Chips::MAX),
        Resolution::Cancelled { refunded: true } => stake,
        Resolution::Cancelled { refunded: false } => 0,
    }
}

/// Move `session` to the terminal state for `resolution` and compute its payout.
///
/// Returns `None` if the session was already terminal; duplicate resolution is
/// a no-op rather than an error.
pub fn resolve(session: &mut GameSession, resolution: Resolution) -> Option<ResolvedOutcome> {
    let multiplier = session.multiplier();
    let payout = payout_for(resolution, session.stake(), multiplier, session.rules().cap);

    if !session.conclude(resolution.terminal_state(), payout) {
        return None;
    }

    Some(ResolvedOutcome {
        session_id: session.id(),
        player_id: session.player_id(),
        resolution,
        stake: session.stake(),
        multiplier,
        crash_point: session.crash_point(),
        payout,
        started_at: session.started_at(),
        resolved_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::session::RoundRules;

    fn session(stake: Chips) -> GameSession {
        let rules = RoundRules {
            step_units: 100,
            cap: Multiplier::from_f64(10_000.0),
        };
        let mut session = GameSession::new(3, stake, Multiplier::from_f64(4.0), rules);
        session.start().unwrap();
        session
    }

    #[test]
    fn test_payout_rule() {
        let cap = Multiplier::from_f64(10_000.0);
        let m = Multiplier::from_units(25_000);

        assert_eq!(payout_for(Resolution::CashedOut, 40, m, cap), 100);
        assert_eq!(payout_for(Resolution::Exploded, 40, m, cap), 0);
        assert_eq!(payout_for(Resolution::MaxReached, 40, m, cap), 400_000);
        assert_eq!(
            payout_for(Resolution::Cancelled { refunded: true }, 40, m, cap),
            40
        );
        assert_eq!(
            payout_for(Resolution::Cancelled { refunded: false }, 40, m, cap),
            0
        );
    }

    #[test]
    fn test_signal_mapping() {
        assert_eq!(Resolution::from(Signal::CashOut), Resolution::CashedOut);
        assert_eq!(
            Resolution::from(Signal::Stop),
            Resolution::Cancelled { refunded: true }
        );
        assert_eq!(
            Resolution::from(Signal::Forfeit),
            Resolution::Cancelled { refunded: false }
        );
    }

    #[test]
    fn test_resolve_is_write_once() {
        let mut s = session(100);
        for _ in 0..50 {
            s.advance();
        }

        let first = resolve(&mut s, Resolution::CashedOut).unwrap();
        assert_eq!(first.payout, 150);
        assert_eq!(first.net(), 50);
        assert!(first.is_win());
        assert_eq!(first.crash_point, Multiplier::from_f64(4.0));

        assert!(resolve(&mut s, Resolution::Exploded).is_none());
        assert!(resolve(&mut s, Resolution::CashedOut).is_none());
        assert_eq!(s.state(), SessionState::CashedOut);
        assert_eq!(s.payout(), Some(150));
    }

    #[test]
    fn test_stop_refunds_stake() {
        let mut s = session(75);
        s.advance();
        let outcome = resolve(&mut s, Resolution::from(Signal::Stop)).unwrap();
        assert_eq!(outcome.payout, 75);
        assert_eq!(outcome.net(), 0);
        assert!(!outcome.is_win());
        assert_eq!(s.state(), SessionState::Cancelled);
    }

    #[test]
    fn test_resolve_pending_session() {
        let rules = RoundRules {
            step_units: 100,
            cap: Multiplier::from_f64(100.0),
        };
        let mut s = GameSession::new(3, 10, Multiplier::from_f64(2.0), rules);
        let outcome = resolve(&mut s, Resolution::Cancelled { refunded: true }).unwrap();
        assert_eq!(outcome.payout, 10);
        assert!(outcome.started_at.is_none());
    }
}
