//! Per-player round statistics, collected as a progress sink.

use super::sink::{ProgressSink, SinkResult};
use crate::game::{Chips, Multiplier, PlayerId, Resolution, ResolvedOutcome};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Running totals for one player (or for everyone, see [`StatsBook::totals`])
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlayerStats {
    pub total_games: u64,
    pub games_won: u64,
    pub total_wagered: Chips,
    pub total_won: Chips,
    pub best_multiplier: Option<Multiplier>,
}

impl PlayerStats {
    /// Percentage of games won
    pub fn win_rate(&self) -> f64 {
        if self.total_games == 0 {
            return 0.0;
        }
        self.games_won as f64 / self.total_games as f64 * 100.0
    }

    /// Realised return-to-player
    pub fn payout_ratio(&self) -> f64 {
        if self.total_wagered == 0 {
            return 0.0;
        }
        self.total_won as f64 / self.total_wagered as f64
    }

    pub fn net(&self) -> Chips {
        self.total_won - self.total_wagered
    }

    fn record(&mut self, outcome: &ResolvedOutcome) {
        // A refunded round is not a game: the stake came straight back
        if outcome.resolution == (Resolution::Cancelled { refunded: true }) {
            return;
        }

        self.total_games += 1;
        self.total_wagered = self.total_wagered.saturating_add(outcome.stake);
        self.total_won = self.total_won.saturating_add(outcome.payout);
        if outcome.is_win() {
            self.games_won += 1;
            self.best_multiplier = self.best_multiplier.max(Some(outcome.multiplier));
        }
    }

    fn merge(&mut self, other: &PlayerStats) {
        self.total_games += other.total_games;
        self.games_won += other.games_won;
        self.total_wagered = self.total_wagered.saturating_add(other.total_wagered);
        self.total_won = self.total_won.saturating_add(other.total_won);
        self.best_multiplier = self.best_multiplier.max(other.best_multiplier);
    }
}

/// Statistics aggregator. Plug it into the engine's sink fan-out.
#[derive(Default)]
pub struct StatsBook {
    players: RwLock<HashMap<PlayerId, PlayerStats>>,
}

impl StatsBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn stats(&self, player_id: PlayerId) -> PlayerStats {
        self.players
            .read()
            .await
            .get(&player_id)
            .copied()
            .unwrap_or_default()
    }

    /// Totals over every player
    pub async fn totals(&self) -> PlayerStats {
        let players = self.players.read().await;
        let mut totals = PlayerStats::default();
        for stats in players.values() {
            totals.merge(stats);
        }
        totals
    }

    /// Every player's stats, ordered by player id
    pub async fn all(&self) -> Vec<(PlayerId, PlayerStats)> {
        let players = self.players.read().await;
        let mut all: Vec<_> = players.iter().map(|(id, stats)| (*id, *stats)).collect();
        all.sort_by_key(|(id, _)| *id);
        all
    }
}

#[async_trait]
impl ProgressSink for StatsBook {
    async fn on_tick(&self, _: PlayerId, _: Multiplier, _: Chips) -> SinkResult<()> {
        Ok(())
    }

    async fn on_resolved(&self, outcome: &ResolvedOutcome) -> SinkResult<()> {
        self.players
            .write()
            .await
            .entry(outcome.player_id)
            .or_default()
            .record(outcome);
        Ok(())
    }
}
