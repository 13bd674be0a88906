//! Simulated player: stakes, watches its own progress events and cashes out
//! at a personal target multiplier.

use rocket_crash::{
    Chips, InMemoryLedger, Multiplier, PlayerId, Resolution, SessionError, SessionRegistry,
    progress::ProgressEvent,
};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio::sync::mpsc;

/// What a simulated player did over the run
#[derive(Debug, Clone, Copy, Default)]
pub struct PlayerReport {
    pub player_id: PlayerId,
    pub target: Multiplier,
    pub rounds_played: u32,
    pub cash_outs: u32,
    pub top_ups: u32,
}

pub struct SimPlayer {
    pub id: PlayerId,
    pub target: Multiplier,
    pub stake: Chips,
    pub rounds: u32,
    pub top_up: Chips,
}

impl SimPlayer {
    /// Play until all rounds are done or `shutdown` is raised
    pub async fn run(
        self,
        registry: Arc<SessionRegistry>,
        ledger: Arc<InMemoryLedger>,
        mut events: mpsc::Receiver<ProgressEvent>,
        shutdown: Arc<AtomicBool>,
    ) -> PlayerReport {
        let mut report = PlayerReport {
            player_id: self.id,
            target: self.target,
            ..PlayerReport::default()
        };

        while report.rounds_played < self.rounds && !shutdown.load(Ordering::SeqCst) {
            let handle = match registry.start(self.id, self.stake).await {
                Ok(handle) => handle,
                Err(SessionError::InsufficientFunds { available, .. }) => {
                    let key = format!("topup_{}_{}", self.id, report.top_ups);
                    match ledger.deposit(self.id, self.top_up, &key).await {
                        Ok(balance) => {
                            log::debug!(
                                "Player {} topped up from {available} to {balance}",
                                self.id
                            );
                            report.top_ups += 1;
                            continue;
                        }
                        Err(e) => {
                            log::warn!("Player {} cannot top up: {e}", self.id);
                            break;
                        }
                    }
                }
                Err(e) => {
                    log::warn!("Player {} cannot start a round: {e}", self.id);
                    break;
                }
            };

            let mut requested = false;
            let wait = handle.wait();
            tokio::pin!(wait);

            let outcome = loop {
                tokio::select! {
                    outcome = &mut wait => break outcome,

                    Some(event) = events.recv() => {
                        let reached = match event {
                            ProgressEvent::Tick { multiplier, .. } => multiplier >= self.target,
                            ProgressEvent::Resolved(_) => false,
                        };
                        if reached && !requested {
                            requested = true;
                            if let Err(e) = registry.request_cash_out(self.id).await {
                                log::debug!("Player {} cash-out too late: {e}", self.id);
                            }
                        }
                    }
                }
            };

            // Drop anything left over from the finished round
            while events.try_recv().is_ok() {}

            match outcome {
                Ok(outcome) => {
                    report.rounds_played += 1;
                    if outcome.resolution == Resolution::CashedOut {
                        report.cash_outs += 1;
                    }
                }
                Err(e) => {
                    log::error!("Player {} lost track of a round: {e}", self.id);
                    break;
                }
            }
        }

        report
    }
}
