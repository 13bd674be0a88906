//! Resolution side effects: ledger credit, outcome notification, slot release.

use super::registry::SlotTable;
use crate::{
    game::{Chips, GameSession, PlayerId, Resolution, ResolvedOutcome, resolve},
    progress::{ProgressSink, SinkError, SinkResult},
    wallet::{Ledger, LedgerError},
};
use std::{future::Future, sync::Arc, time::Duration};
use uuid::Uuid;

/// Ledger idempotency key for a session's stake debit
pub fn stake_key(session_id: Uuid) -> String {
    format!("stake_{session_id}")
}

/// Ledger idempotency key for a session's payout credit
pub fn payout_key(session_id: Uuid) -> String {
    format!("payout_{session_id}")
}

/// Run one sink delivery in its own task, bounded by `limit`. Failures,
/// including a panicking sink, are logged and never returned.
pub(super) async fn deliver<F>(delivery: F, limit: Duration, player_id: PlayerId, what: &str)
where
    F: Future<Output = SinkResult<()>> + Send + 'static,
{
    let mut task = tokio::spawn(delivery);
    let error = match tokio::time::timeout(limit, &mut task).await {
        Ok(Ok(Ok(()))) => return,
        Ok(Ok(Err(e))) => e,
        Ok(Err(e)) => SinkError::Failed(e.to_string()),
        Err(_) => {
            task.abort();
            SinkError::Timeout(limit)
        }
    };
    log::warn!("Player {player_id}: {what} delivery failed: {error}");
}

/// Applies the side effects of a resolved session, exactly once per session
#[derive(Clone)]
pub struct OutcomeResolver {
    ledger: Arc<dyn Ledger>,
    sink: Arc<dyn ProgressSink>,
    slots: Arc<SlotTable>,
    sink_timeout: Duration,
}

impl OutcomeResolver {
    pub(crate) fn new(
        ledger: Arc<dyn Ledger>,
        sink: Arc<dyn ProgressSink>,
        slots: Arc<SlotTable>,
        sink_timeout: Duration,
    ) -> Self {
        Self {
            ledger,
            sink,
            slots,
            sink_timeout,
        }
    }

    /// Resolve `session` and apply the consequences.
    ///
    /// Order is fixed: credit the payout, tell the sink, then free the
    /// player's slot, so a player can never start a new round before the
    /// previous payout is in their balance. A session that was already
    /// terminal only has its slot released.
    pub async fn finalize(
        &self,
        session: &mut GameSession,
        resolution: Resolution,
    ) -> Option<ResolvedOutcome> {
        let outcome = resolve(session, resolution);

        match &outcome {
            Some(outcome) => {
                log::info!(
                    "Session {} for player {} {} at {}, payout {}",
                    outcome.session_id,
                    outcome.player_id,
                    outcome.resolution,
                    outcome.multiplier,
                    outcome.payout
                );
                self.settle(outcome).await;
                let sink = self.sink.clone();
                let resolved = outcome.clone();
                deliver(
                    async move { sink.on_resolved(&resolved).await },
                    self.sink_timeout,
                    outcome.player_id,
                    "outcome",
                )
                .await;
            }
            None => log::debug!(
                "Session {} already resolved as {}",
                session.id(),
                session.state()
            ),
        }

        self.slots.release(session.player_id(), session.id()).await;
        outcome
    }

    /// Undo a session whose ticker died before resolving: return the stake
    /// and free the slot.
    ///
    /// The refund uses the payout key, so a payout that already landed is
    /// not paid twice.
    pub(crate) async fn recover(&self, player_id: PlayerId, session_id: Uuid, stake: Chips) {
        match self
            .ledger
            .credit(player_id, stake, &payout_key(session_id))
            .await
        {
            Ok(balance) => log::warn!(
                "Refunded stake {stake} of failed session {session_id} to player {player_id} (balance {balance})"
            ),
            Err(LedgerError::DuplicateTransaction(_)) => {
                log::warn!("Failed session {session_id} had already been settled")
            }
            Err(e) => log::error!(
                "Failed to refund stake {stake} to player {player_id} for session {session_id}: {e}"
            ),
        }

        self.slots.release(player_id, session_id).await;
    }

    async fn settle(&self, outcome: &ResolvedOutcome) {
        if outcome.payout == 0 {
            return;
        }

        let key = payout_key(outcome.session_id);
        match self
            .ledger
            .credit(outcome.player_id, outcome.payout, &key)
            .await
        {
            Ok(balance) => log::debug!(
                "Credited {} to player {} (balance {balance})",
                outcome.payout,
                outcome.player_id
            ),
            Err(LedgerError::DuplicateTransaction(_)) => {
                log::warn!("Payout for session {} already credited", outcome.session_id)
            }
            Err(e) => log::error!(
                "Failed to credit payout {} to player {} for session {}: {e}",
                outcome.payout,
                outcome.player_id,
                outcome.session_id
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        game::{Multiplier, RoundRules, SessionState},
        progress::StatsBook,
        wallet::InMemoryLedger,
    };

    fn running_session(player_id: PlayerId, stake: i64) -> GameSession {
        let rules = RoundRules {
            step_units: 100,
            cap: Multiplier::from_f64(100.0),
        };
        let mut session = GameSession::new(player_id, stake, Multiplier::from_f64(5.0), rules);
        session.start().unwrap();
        session
    }

    fn resolver(
        ledger: Arc<InMemoryLedger>,
        stats: Arc<StatsBook>,
        slots: Arc<SlotTable>,
    ) -> OutcomeResolver {
        OutcomeResolver::new(ledger, stats, slots, Duration::from_millis(100))
    }

    #[tokio::test]
    async fn test_finalize_credits_notifies_and_releases() {
        let ledger = Arc::new(InMemoryLedger::new(1000));
        let stats = Arc::new(StatsBook::new());
        let slots = Arc::new(SlotTable::default());
        let resolver = resolver(ledger.clone(), stats.clone(), slots.clone());

        let mut session = running_session(1, 100);
        slots.reserve(1, session.id()).await.unwrap();
        for _ in 0..100 {
            session.advance();
        }

        let outcome = resolver
            .finalize(&mut session, Resolution::CashedOut)
            .await
            .unwrap();
        assert_eq!(outcome.payout, 200);
        assert_eq!(ledger.balance(1).await, 1200);
        assert_eq!(stats.stats(1).await.games_won, 1);
        assert_eq!(slots.len().await, 0);
        assert_eq!(session.state(), SessionState::CashedOut);
    }

    #[tokio::test]
    async fn test_second_finalize_is_noop() {
        let ledger = Arc::new(InMemoryLedger::new(1000));
        let stats = Arc::new(StatsBook::new());
        let slots = Arc::new(SlotTable::default());
        let resolver = resolver(ledger.clone(), stats.clone(), slots);

        let mut session = running_session(2, 100);
        resolver
            .finalize(&mut session, Resolution::Cancelled { refunded: true })
            .await
            .unwrap();
        assert!(
            resolver
                .finalize(&mut session, Resolution::CashedOut)
                .await
                .is_none()
        );

        assert_eq!(ledger.balance(2).await, 1100);
        assert_eq!(ledger.entries(2, 10).await.len(), 1);
    }

    #[tokio::test]
    async fn test_zero_payout_skips_ledger() {
        let ledger = Arc::new(InMemoryLedger::new(1000));
        let resolver = resolver(
            ledger.clone(),
            Arc::new(StatsBook::new()),
            Arc::new(SlotTable::default()),
        );

        let mut session = running_session(3, 100);
        let outcome = resolver
            .finalize(&mut session, Resolution::Exploded)
            .await
            .unwrap();
        assert_eq!(outcome.payout, 0);
        assert!(ledger.entries(3, 10).await.is_empty());
    }

    #[tokio::test]
    async fn test_release_keeps_foreign_slot() {
        let slots = Arc::new(SlotTable::default());
        let resolver = resolver(
            Arc::new(InMemoryLedger::new(1000)),
            Arc::new(StatsBook::new()),
            slots.clone(),
        );

        // Slot belongs to a different session of the same player
        slots.reserve(4, Uuid::new_v4()).await.unwrap();
        let mut session = running_session(4, 10);
        resolver
            .finalize(&mut session, Resolution::Exploded)
            .await
            .unwrap();
        assert_eq!(slots.len().await, 1);
    }

    #[tokio::test]
    async fn test_recover_refunds_stake_and_frees_slot() {
        let ledger = Arc::new(InMemoryLedger::new(1000));
        let slots = Arc::new(SlotTable::default());
        let resolver = resolver(ledger.clone(), Arc::new(StatsBook::new()), slots.clone());

        let session_id = Uuid::new_v4();
        slots.reserve(5, session_id).await.unwrap();
        ledger.debit(5, 100, &stake_key(session_id)).await.unwrap();

        resolver.recover(5, session_id, 100).await;
        assert_eq!(ledger.balance(5).await, 1000);
        assert_eq!(slots.len().await, 0);

        resolver.recover(5, session_id, 100).await;
        assert_eq!(ledger.balance(5).await, 1000);
    }

    #[tokio::test]
    async fn test_recover_after_payout_does_not_pay_twice() {
        let ledger = Arc::new(InMemoryLedger::new(1000));
        let slots = Arc::new(SlotTable::default());
        let resolver = resolver(ledger.clone(), Arc::new(StatsBook::new()), slots.clone());

        let mut session = running_session(6, 100);
        for _ in 0..100 {
            session.advance();
        }
        resolver
            .finalize(&mut session, Resolution::CashedOut)
            .await
            .unwrap();
        assert_eq!(ledger.balance(6).await, 1200);

        resolver.recover(6, session.id(), 100).await;
        assert_eq!(ledger.balance(6).await, 1200);
    }

    async fn exploding_delivery() -> SinkResult<()> {
        panic!("sink blew up")
    }

    #[tokio::test]
    async fn test_deliver_contains_panicking_sink() {
        deliver(
            exploding_delivery(),
            Duration::from_millis(100),
            7,
            "tick",
        )
        .await;

        deliver(
            async { Err::<(), _>(SinkError::Disconnected(7)) },
            Duration::from_millis(100),
            7,
            "tick",
        )
        .await;
    }

    #[test]
    fn test_idempotency_keys() {
        let id = Uuid::nil();
        assert_eq!(stake_key(id), format!("stake_{id}"));
        assert_ne!(stake_key(id), payout_key(id));
    }
}
