//! Progress sink trait and stock implementations.

use crate::game::{Chips, Multiplier, PlayerId, ResolvedOutcome};
use async_trait::async_trait;
use std::{collections::HashMap, sync::Arc, time::Duration};
use thiserror::Error;
use tokio::sync::{RwLock, mpsc};

/// Delivery failures. The engine logs these and carries on.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SinkError {
    #[error("Subscriber {0} channel full, update dropped")]
    Backpressure(PlayerId),

    #[error("Subscriber {0} disconnected")]
    Disconnected(PlayerId),

    #[error("Delivery timed out after {0:?}")]
    Timeout(Duration),

    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Sink task failed: {0}")]
    Failed(String),
}

pub type SinkResult<T> = Result<T, SinkError>;

/// Receiver of game progress. Best effort: a failure never affects game state.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    /// Called once per tick while the round is running
    async fn on_tick(
        &self,
        player_id: PlayerId,
        multiplier: Multiplier,
        potential_payout: Chips,
    ) -> SinkResult<()>;

    /// Called once when the round is resolved
    async fn on_resolved(&self, outcome: &ResolvedOutcome) -> SinkResult<()>;
}

/// Progress event delivered to subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Tick {
        player_id: PlayerId,
        multiplier: Multiplier,
        potential_payout: Chips,
    },
    Resolved(ResolvedOutcome),
}

impl ProgressEvent {
    pub fn player_id(&self) -> PlayerId {
        match self {
            ProgressEvent::Tick { player_id, .. } => *player_id,
            ProgressEvent::Resolved(outcome) => outcome.player_id,
        }
    }
}

/// Writes progress to the `log` facade
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait]
impl ProgressSink for LogSink {
    async fn on_tick(
        &self,
        player_id: PlayerId,
        multiplier: Multiplier,
        potential_payout: Chips,
    ) -> SinkResult<()> {
        log::trace!("Player {player_id}: {multiplier} (potential {potential_payout})");
        Ok(())
    }

    async fn on_resolved(&self, outcome: &ResolvedOutcome) -> SinkResult<()> {
        log::info!(
            "Player {} {} at {} (crash {}), stake {}, payout {}",
            outcome.player_id,
            outcome.resolution,
            outcome.multiplier,
            outcome.crash_point,
            outcome.stake,
            outcome.payout
        );
        Ok(())
    }
}

/// Routes events to per-player subscriber channels
#[derive(Default)]
pub struct SubscriberSink {
    subscribers: RwLock<HashMap<PlayerId, mpsc::Sender<ProgressEvent>>>,
}

impl SubscriberSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a player's events, replacing any previous subscription
    pub async fn subscribe(&self, player_id: PlayerId, capacity: usize) -> mpsc::Receiver<ProgressEvent> {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        self.subscribers.write().await.insert(player_id, sender);
        log::debug!("Player {player_id} subscribed to progress events");
        receiver
    }

    pub async fn unsubscribe(&self, player_id: PlayerId) {
        self.subscribers.write().await.remove(&player_id);
        log::debug!("Player {player_id} unsubscribed from progress events");
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    async fn deliver(&self, event: ProgressEvent) -> SinkResult<()> {
        let player_id = event.player_id();
        let result = match self.subscribers.read().await.get(&player_id) {
            Some(sender) => sender.try_send(event),
            None => return Ok(()),
        };

        match result {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => Err(SinkError::Backpressure(player_id)),
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.subscribers.write().await.remove(&player_id);
                log::debug!("Subscriber {player_id} disconnected, removing");
                Err(SinkError::Disconnected(player_id))
            }
        }
    }
}

#[async_trait]
impl ProgressSink for SubscriberSink {
    async fn on_tick(
        &self,
        player_id: PlayerId,
        multiplier: Multiplier,
        potential_payout: Chips,
    ) -> SinkResult<()> {
        self.deliver(ProgressEvent::Tick {
            player_id,
            multiplier,
            potential_payout,
        })
        .await
    }

    async fn on_resolved(&self, outcome: &ResolvedOutcome) -> SinkResult<()> {
        self.deliver(ProgressEvent::Resolved(outcome.clone())).await
    }
}

/// Delivers to every inner sink; reports the first failure after trying all.
#[derive(Clone, Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn ProgressSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn ProgressSink>>) -> Self {
        Self { sinks }
    }

    pub fn push(&mut self, sink: Arc<dyn ProgressSink>) {
        self.sinks.push(sink);
    }
}

#[async_trait]
impl ProgressSink for FanoutSink {
    async fn on_tick(
        &self,
        player_id: PlayerId,
        multiplier: Multiplier,
        potential_payout: Chips,
    ) -> SinkResult<()> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = sink.on_tick(player_id, multiplier, potential_payout).await {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    async fn on_resolved(&self, outcome: &ResolvedOutcome) -> SinkResult<()> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = sink.on_resolved(outcome).await {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
