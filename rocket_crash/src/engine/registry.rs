//! Session registry: the session control API and the per-player slot table.

use super::{
    config::GameConfig,
    errors::{ConfigError, SessionError, SessionResult},
    messages::SessionMessage,
    resolver::{OutcomeResolver, stake_key},
    ticker::SessionTicker,
};
use crate::{
    game::{Chips, CrashSource, GameSession, PlayerId, ResolvedOutcome, RoundRules, SessionSnapshot, Signal},
    progress::ProgressSink,
    wallet::Ledger,
};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::{
    sync::{RwLock, mpsc, oneshot},
    task::JoinHandle,
};
use uuid::Uuid;

/// Sending half of a running session's inbox
#[derive(Debug, Clone)]
pub(crate) struct SessionLink {
    sender: mpsc::Sender<SessionMessage>,
    session_id: Uuid,
}

impl SessionLink {
    pub(crate) fn new(sender: mpsc::Sender<SessionMessage>, session_id: Uuid) -> Self {
        Self { sender, session_id }
    }

    async fn send(&self, player_id: PlayerId, message: SessionMessage) -> SessionResult<()> {
        self.sender
            .send(message)
            .await
            .map_err(|_| SessionError::NotFound(player_id))
    }
}

/// A player's reservation
#[derive(Debug)]
pub(crate) enum Slot {
    /// Stake is being debited; the session is not visible yet
    Pending(Uuid),
    /// Ticker is running
    Running(SessionLink),
}

impl Slot {
    fn session_id(&self) -> Uuid {
        match self {
            Slot::Pending(id) => *id,
            Slot::Running(link) => link.session_id,
        }
    }
}

/// At most one slot per player. Check-and-reserve happens under one write lock.
#[derive(Debug, Default)]
pub(crate) struct SlotTable {
    slots: RwLock<HashMap<PlayerId, Slot>>,
}

impl SlotTable {
    pub(crate) async fn reserve(&self, player_id: PlayerId, session_id: Uuid) -> SessionResult<()> {
        let mut slots = self.slots.write().await;
        if slots.contains_key(&player_id) {
            return Err(SessionError::AlreadyActive(player_id));
        }
        slots.insert(player_id, Slot::Pending(session_id));
        Ok(())
    }

    /// Pending -> Running. Returns `false` if the reservation is gone.
    pub(crate) async fn activate(&self, player_id: PlayerId, link: SessionLink) -> bool {
        let mut slots = self.slots.write().await;
        match slots.get_mut(&player_id) {
            Some(slot) if slot.session_id() == link.session_id => {
                *slot = Slot::Running(link);
                true
            }
            _ => false,
        }
    }

    /// Remove the player's slot if it still belongs to `session_id`
    pub(crate) async fn release(&self, player_id: PlayerId, session_id: Uuid) -> bool {
        let mut slots = self.slots.write().await;
        match slots.get(&player_id) {
            Some(slot) if slot.session_id() == session_id => {
                slots.remove(&player_id);
                true
            }
            _ => false,
        }
    }

    /// Link to the player's running session
    async fn link(&self, player_id: PlayerId) -> SessionResult<SessionLink> {
        match self.slots.read().await.get(&player_id) {
            Some(Slot::Running(link)) => Ok(link.clone()),
            _ => Err(SessionError::NotFound(player_id)),
        }
    }

    async fn running(&self) -> Vec<(PlayerId, SessionLink)> {
        self.slots
            .read()
            .await
            .iter()
            .filter_map(|(player_id, slot)| match slot {
                Slot::Running(link) => Some((*player_id, link.clone())),
                Slot::Pending(_) => None,
            })
            .collect()
    }

    pub(crate) async fn len(&self) -> usize {
        self.slots.read().await.len()
    }
}

/// Handle to a started session
#[derive(Debug)]
pub struct SessionHandle {
    session_id: Uuid,
    player_id: PlayerId,
    stake: Chips,
    task: JoinHandle<SessionResult<ResolvedOutcome>>,
}

impl SessionHandle {
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn player_id(&self) -> PlayerId {
        self.player_id
    }

    pub fn stake(&self) -> Chips {
        self.stake
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the session to resolve
    ///
    /// # Errors
    ///
    /// * `SessionError::TaskFailed` - The ticker died; its stake was refunded
    pub async fn wait(self) -> SessionResult<ResolvedOutcome> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(SessionError::TaskFailed(e.to_string())),
        }
    }
}

/// Everything needed to bring one session up, detached from the caller
struct Launch {
    tick_interval: Duration,
    rules: RoundRules,
    crash_source: Arc<dyn CrashSource>,
    ledger: Arc<dyn Ledger>,
    sink: Arc<dyn ProgressSink>,
    slots: Arc<SlotTable>,
}

impl Launch {
    async fn run(
        self,
        player_id: PlayerId,
        stake: Chips,
        session_id: Uuid,
    ) -> SessionResult<SessionHandle> {
        self.slots.reserve(player_id, session_id).await?;

        if let Err(e) = self
            .ledger
            .debit(player_id, stake, &stake_key(session_id))
            .await
        {
            self.slots.release(player_id, session_id).await;
            log::debug!("Player {player_id} could not stake {stake}: {e}");
            return Err(e.into());
        }

        let session = GameSession::with_id(
            session_id,
            player_id,
            stake,
            self.crash_source.next_crash_point(),
            self.rules,
        );

        let resolver = OutcomeResolver::new(
            self.ledger,
            self.sink.clone(),
            self.slots.clone(),
            self.tick_interval,
        );
        let (ticker, link) = SessionTicker::new(
            session,
            self.tick_interval,
            self.sink,
            resolver.clone(),
        );

        if !self.slots.activate(player_id, link).await {
            log::error!("Player {player_id}: reservation for session {session_id} vanished");
        }
        let ticker = tokio::spawn(ticker.run());
        let task = tokio::spawn(supervise(ticker, resolver, player_id, session_id, stake));

        log::info!("Player {player_id} started session {session_id} with stake {stake}");

        Ok(SessionHandle {
            session_id,
            player_id,
            stake,
            task,
        })
    }
}

/// Wait for a ticker. If it died without resolving, refund and free the slot.
async fn supervise(
    ticker: JoinHandle<Option<ResolvedOutcome>>,
    resolver: OutcomeResolver,
    player_id: PlayerId,
    session_id: Uuid,
    stake: Chips,
) -> SessionResult<ResolvedOutcome> {
    match ticker.await {
        Ok(Some(outcome)) => Ok(outcome),
        Ok(None) => Err(SessionError::TaskFailed(format!(
            "session {session_id} ended without an outcome"
        ))),
        Err(e) => {
            log::error!("Session {session_id} for player {player_id} died: {e}");
            resolver.recover(player_id, session_id, stake).await;
            Err(SessionError::TaskFailed(e.to_string()))
        }
    }
}

/// Owns every player's active session.
///
/// Each started session runs in its own task; the registry only keeps the
/// sending half of its inbox.
pub struct SessionRegistry {
    config: GameConfig,
    rules: RoundRules,
    crash_source: Arc<dyn CrashSource>,
    ledger: Arc<dyn Ledger>,
    sink: Arc<dyn ProgressSink>,
    slots: Arc<SlotTable>,
}

impl SessionRegistry {
    /// Create a registry drawing crash points from the configured sampler
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `config` does not validate
    pub fn new(
        config: GameConfig,
        ledger: Arc<dyn Ledger>,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<Self, ConfigError> {
        let crash_source = Arc::new(config.sampler());
        Self::with_crash_source(config, ledger, sink, crash_source)
    }

    /// Create a registry with a custom crash point source
    pub fn with_crash_source(
        config: GameConfig,
        ledger: Arc<dyn Ledger>,
        sink: Arc<dyn ProgressSink>,
        crash_source: Arc<dyn CrashSource>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let rules = config.rules();

        Ok(Self {
            config,
            rules,
            crash_source,
            ledger,
            sink,
            slots: Arc::new(SlotTable::default()),
        })
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Start a round for `player_id`, debiting `stake`
    ///
    /// The stake is taken before the session becomes visible. Reservation,
    /// debit and spawn run in their own task, so dropping this future never
    /// strands a reserved slot or a debited stake: the round still starts and
    /// can be stopped later.
    ///
    /// # Errors
    ///
    /// * `SessionError::InvalidStake` - Stake outside the configured bounds
    /// * `SessionError::AlreadyActive` - Player already has a session
    /// * `SessionError::InsufficientFunds` - Ledger refused the debit
    /// * `SessionError::TaskFailed` - The launch task panicked
    pub async fn start(&self, player_id: PlayerId, stake: Chips) -> SessionResult<SessionHandle> {
        if !self.config.accepts_stake(stake) {
            return Err(SessionError::InvalidStake {
                stake,
                min: self.config.min_stake,
                max: self.config.max_stake,
            });
        }

        let launch = Launch {
            tick_interval: self.config.tick_interval(),
            rules: self.rules,
            crash_source: self.crash_source.clone(),
            ledger: self.ledger.clone(),
            sink: self.sink.clone(),
            slots: self.slots.clone(),
        };
        let session_id = Uuid::new_v4();

        match tokio::spawn(launch.run(player_id, stake, session_id)).await {
            Ok(result) => result,
            Err(e) => {
                log::error!("Player {player_id}: launching session {session_id} failed: {e}");
                self.slots.release(player_id, session_id).await;
                Err(SessionError::TaskFailed(e.to_string()))
            }
        }
    }

    /// Ask the player's session to cash out at the multiplier current when the
    /// next tick runs
    pub async fn request_cash_out(&self, player_id: PlayerId) -> SessionResult<()> {
        self.signal(player_id, Signal::CashOut).await
    }

    /// Stop the player's session, refunding the stake
    pub async fn request_stop(&self, player_id: PlayerId) -> SessionResult<()> {
        self.signal(player_id, Signal::Stop).await
    }

    /// Cancel the player's session without refund
    pub async fn request_forfeit(&self, player_id: PlayerId) -> SessionResult<()> {
        self.signal(player_id, Signal::Forfeit).await
    }

    /// Read-only view of the player's running session
    pub async fn get(&self, player_id: PlayerId) -> SessionResult<SessionSnapshot> {
        let link = self.slots.link(player_id).await?;
        let (response, snapshot) = oneshot::channel();
        link.send(player_id, SessionMessage::GetSnapshot { response })
            .await?;
        snapshot.await.map_err(|_| SessionError::NotFound(player_id))
    }

    /// Number of players holding a slot (pending or running)
    pub async fn active_count(&self) -> usize {
        self.slots.len().await
    }

    /// Stop every running session, refunding stakes. Returns how many were
    /// signalled.
    pub async fn stop_all(&self) -> usize {
        let mut stopped = 0;
        for (player_id, link) in self.slots.running().await {
            if link.send(player_id, Signal::Stop.into()).await.is_ok() {
                stopped += 1;
            }
        }
        log::info!("Stop requested for {stopped} running sessions");
        stopped
    }

    async fn signal(&self, player_id: PlayerId, signal: Signal) -> SessionResult<()> {
        let link = self.slots.link(player_id).await?;
        link.send(player_id, signal.into()).await?;
        log::debug!("Player {player_id}: {signal} requested");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(session_id: Uuid) -> (SessionLink, mpsc::Receiver<SessionMessage>) {
        let (sender, receiver) = mpsc::channel(1);
        (SessionLink::new(sender, session_id), receiver)
    }

    #[tokio::test]
    async fn test_reserve_is_exclusive() {
        let slots = SlotTable::default();
        slots.reserve(1, Uuid::new_v4()).await.unwrap();
        assert_eq!(
            slots.reserve(1, Uuid::new_v4()).await,
            Err(SessionError::AlreadyActive(1))
        );
        slots.reserve(2, Uuid::new_v4()).await.unwrap();
        assert_eq!(slots.len().await, 2);
    }

    #[tokio::test]
    async fn test_pending_slot_is_not_found() {
        let slots = SlotTable::default();
        let id = Uuid::new_v4();
        slots.reserve(1, id).await.unwrap();
        assert!(matches!(slots.link(1).await, Err(SessionError::NotFound(1))));

        let (link, _rx) = link(id);
        assert!(slots.activate(1, link).await);
        assert!(slots.link(1).await.is_ok());
        assert_eq!(slots.running().await.len(), 1);
    }

    #[tokio::test]
    async fn test_activate_requires_matching_reservation() {
        let slots = SlotTable::default();
        slots.reserve(1, Uuid::new_v4()).await.unwrap();
        let (other, _rx) = link(Uuid::new_v4());
        assert!(!slots.activate(1, other).await);

        let (orphan, _rx) = link(Uuid::new_v4());
        assert!(!slots.activate(9, orphan).await);
    }

    #[tokio::test]
    async fn test_release_checks_ownership() {
        let slots = SlotTable::default();
        let id = Uuid::new_v4();
        slots.reserve(1, id).await.unwrap();

        assert!(!slots.release(1, Uuid::new_v4()).await);
        assert_eq!(slots.len().await, 1);
        assert!(slots.release(1, id).await);
        assert_eq!(slots.len().await, 0);
        assert!(!slots.release(1, id).await);
    }
}
