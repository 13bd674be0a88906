//! Per-session ticker task.

use super::{messages::SessionMessage, registry::SessionLink, resolver::OutcomeResolver};
use crate::{
    game::{Chips, GameSession, Multiplier, Resolution, ResolvedOutcome, Signal, TickStep},
    progress::ProgressSink,
};
use std::sync::Arc;
use tokio::{
    sync::mpsc,
    time::{Duration, MissedTickBehavior, interval},
};

/// Inbox capacity per session
const INBOX_CAPACITY: usize = 32;

/// The only owner of a [`GameSession`] once it has been handed to the engine.
///
/// Messages from the registry are buffered: signals are recorded and acted on
/// at the next tick, snapshot requests are answered right away.
pub struct SessionTicker {
    session: GameSession,
    inbox: mpsc::Receiver<SessionMessage>,
    pending: Option<Signal>,
    tick_interval: Duration,
    sink: Arc<dyn ProgressSink>,
    resolver: OutcomeResolver,
}

impl SessionTicker {
    pub(crate) fn new(
        session: GameSession,
        tick_interval: Duration,
        sink: Arc<dyn ProgressSink>,
        resolver: OutcomeResolver,
    ) -> (Self, SessionLink) {
        let (sender, inbox) = mpsc::channel(INBOX_CAPACITY);
        let link = SessionLink::new(sender, session.id());

        let ticker = Self {
            session,
            inbox,
            pending: None,
            tick_interval,
            sink,
            resolver,
        };

        (ticker, link)
    }

    /// Run the session to completion
    pub async fn run(mut self) -> Option<ResolvedOutcome> {
        if let Err(e) = self.session.start() {
            log::error!("Session {} cannot start: {e}", self.session.id());
            return self
                .resolver
                .finalize(&mut self.session, Resolution::Cancelled { refunded: true })
                .await;
        }

        log::info!(
            "Session {} for player {} running, stake {}",
            self.session.id(),
            self.session.player_id(),
            self.session.stake()
        );

        let mut ticks = interval(self.tick_interval);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                Some(message) = self.inbox.recv() => self.handle_message(message),

                _ = ticks.tick() => {
                    if let Some(resolution) = self.tick().await {
                        return self.finish(resolution).await;
                    }
                }
            }
        }
    }

    fn handle_message(&mut self, message: SessionMessage) {
        match message {
            SessionMessage::Signal(signal) => {
                let accepted = *self.pending.get_or_insert(signal);
                if accepted != signal {
                    log::debug!(
                        "Session {}: {signal} ignored, {accepted} already pending",
                        self.session.id()
                    );
                }
            }

            SessionMessage::GetSnapshot { response } => {
                let _ = response.send(self.session.snapshot());
            }
        }
    }

    /// One tick. Returns the resolution cause once the round is over.
    async fn tick(&mut self) -> Option<Resolution> {
        match self.session.evaluate(self.pending.take()) {
            TickStep::Continue {
                multiplier,
                potential_payout,
            } => {
                self.publish(multiplier, potential_payout).await;
                self.session.advance();
                None
            }
            TickStep::Resolve(resolution) => Some(resolution),
            TickStep::Idle => {
                log::error!(
                    "Session {} ticked while {}",
                    self.session.id(),
                    self.session.state()
                );
                Some(Resolution::Cancelled { refunded: true })
            }
        }
    }

    async fn publish(&self, multiplier: Multiplier, potential_payout: Chips) {
        let player_id = self.session.player_id();
        let sink = self.sink.clone();
        super::resolver::deliver(
            async move { sink.on_tick(player_id, multiplier, potential_payout).await },
            self.tick_interval,
            player_id,
            "tick",
        )
        .await;
    }

    async fn finish(&mut self, resolution: Resolution) -> Option<ResolvedOutcome> {
        // Late signals now fail at the sender
        self.inbox.close();
        self.resolver.finalize(&mut self.session, resolution).await
    }
}
