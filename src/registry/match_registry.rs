//! Process-wide table of live matches.
//!
//! [`MatchRegistry`] is a cheap cloneable handle. The table itself sits behind
//! a `std::sync::Mutex` that is only held for map lookups and updates, never
//! across an `.await`; each session has its own `tokio::sync::Mutex` so moves
//! in one match are serialized without blocking the others.
//!
//! Computer moves are driven by spawned tasks: the session hands out an
//! [`EngineTicket`], the task asks the session's engine bridge, and the answer
//! re-enters the session under its lock. Terminating a session aborts that
//! task and shuts the bridge down.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::config::ArbiterConfig;
use crate::engine::engine_bridge::{EngineBridge, EngineStrength, PendingMove};
use crate::errors::{EngineFailure, MatchError, MatchResult};
use crate::game_state::chess_types::{Color, PieceKind, Square};
use crate::moves::chess_move::Move;
use crate::session::events::MatchEvent;
use crate::session::game_session::{ApplyResult, DrawOffer, EngineTicket, GameSession};
use crate::session::outcome::{ForfeitReason, Outcome};
use crate::session::participant::{MatchId, Opponent, Participant, PlayerId, Seats};
use crate::session::snapshot::SessionSnapshot;
use crate::session::time_control::TimeControlSettings;

type SharedSession = Arc<tokio::sync::Mutex<GameSession>>;

/// Pause between attempts while a suggestion still holds the engine.
const ENGINE_BUSY_RETRY: Duration = Duration::from_millis(25);

/// Optional settings for a new challenge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChallengeOptions {
    /// Color for the initiator; random when `None`.
    pub color: Option<Color>,
    pub time_control: Option<TimeControlSettings>,
}

#[derive(Clone)]
pub struct MatchRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    config: ArbiterConfig,
    table: Mutex<MatchTable>,
    events: broadcast::Sender<MatchEvent>,
}

#[derive(Default)]
struct MatchTable {
    matches: HashMap<MatchId, SharedSession>,
    by_player: HashMap<PlayerId, MatchId>,
    /// Final snapshots of retired matches, oldest first in `finished_order`.
    finished: HashMap<MatchId, SessionSnapshot>,
    finished_order: VecDeque<MatchId>,
    closed: bool,
}

impl MatchTable {
    fn remember_finished(&mut self, snapshot: SessionSnapshot, limit: usize) {
        if limit == 0 {
            return;
        }
        let id = snapshot.match_id;
        if self.finished.insert(id, snapshot).is_none() {
            self.finished_order.push_back(id);
        }
        while self.finished_order.len() > limit {
            if let Some(oldest) = self.finished_order.pop_front() {
                self.finished.remove(&oldest);
            }
        }
    }
}

impl MatchRegistry {
    pub fn new(config: ArbiterConfig) -> MatchResult<Self> {
        config.validate().map_err(MatchError::InvalidState)?;
        let (events, _) = broadcast::channel(config.event_capacity);
        Ok(Self {
            inner: Arc::new(RegistryInner {
                config,
                table: Mutex::new(MatchTable::default()),
                events,
            }),
        })
    }

    pub fn config(&self) -> &ArbiterConfig {
        &self.inner.config
    }

    /// Receive every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<MatchEvent> {
        self.inner.events.subscribe()
    }

    /// Live match of `player`, if any.
    pub fn match_of(&self, player: PlayerId) -> Option<MatchId> {
        self.table().by_player.get(&player).copied()
    }

    pub fn active_match_count(&self) -> usize {
        self.table().matches.len()
    }

    /// Start a match. Games against another player wait for acceptance; games
    /// against the computer start at once.
    pub async fn challenge(
        &self,
        initiator: PlayerId,
        opponent: Opponent,
        options: ChallengeOptions,
    ) -> MatchResult<MatchId> {
        let id = MatchId::new();
        let config = &self.inner.config;
        let color = options.color.unwrap_or_else(|| {
            if rand::random::<bool>() {
                Color::White
            } else {
                Color::Black
            }
        });
        let seat = |me: Participant, them: Participant| match color {
            Color::White => Seats { white: me, black: them },
            Color::Black => Seats { white: them, black: me },
        };

        let session = match opponent {
            Opponent::Player(other) => {
                if other == initiator {
                    return Err(MatchError::invalid_state("cannot challenge yourself"));
                }
                let seats = seat(Participant::human(initiator), Participant::human(other));
                GameSession::new_challenge(id, seats, initiator, options.time_control, self.challenge_deadline()?)
            }
            Opponent::Computer(strength) => {
                let strength = strength.unwrap_or(config.default_strength);
                let seats = seat(Participant::human(initiator), Participant::computer(strength));
                GameSession::new_active(id, seats, Some(initiator), options.time_control)
            }
            Opponent::ComputerVsComputer { white, black } => {
                let seats = Seats {
                    white: Participant::computer(white.unwrap_or(config.default_strength)),
                    black: Participant::computer(black.unwrap_or(config.default_strength)),
                };
                GameSession::new_active(id, seats, Some(initiator), options.time_control)
            }
        };

        let shared = self.insert(session)?;
        info!(match_id = %id, %initiator, ?opponent, "match created");
        let mut session = shared.lock().await;
        self.settle(&shared, &mut session, false);
        Ok(id)
    }

    pub async fn accept_challenge(&self, id: MatchId, responder: PlayerId) -> MatchResult<()> {
        self.with_session(id, |session| session.accept(responder, Utc::now())).await
    }

    pub async fn decline_challenge(&self, id: MatchId, responder: PlayerId) -> MatchResult<()> {
        self.with_session(id, |session| session.decline(responder)).await
    }

    pub async fn submit_move(&self, id: MatchId, player: PlayerId, notation: &str) -> MatchResult<ApplyResult> {
        self.with_session(id, |session| session.submit_move(player, notation)).await
    }

    pub async fn resign(&self, id: MatchId, player: PlayerId) -> MatchResult<Outcome> {
        self.with_session(id, |session| session.resign(player)).await
    }

    pub async fn offer_draw(&self, id: MatchId, player: PlayerId) -> MatchResult<DrawOffer> {
        self.with_session(id, |session| session.offer_draw(player)).await
    }

    pub async fn set_promotion(&self, id: MatchId, player: PlayerId, kind: PieceKind) -> MatchResult<()> {
        self.with_session(id, |session| session.set_promotion(player, kind)).await
    }

    pub async fn legal_destinations(&self, id: MatchId, player: PlayerId, from: Square) -> MatchResult<Vec<Square>> {
        let shared = self.session(id)?;
        let session = shared.lock().await;
        session.legal_destinations(player, from)
    }

    /// Current state of a live match, or the final state of a recently
    /// finished one.
    pub async fn snapshot(&self, id: MatchId) -> MatchResult<SessionSnapshot> {
        let live = {
            let table = self.table();
            if let Some(done) = table.finished.get(&id) {
                return Ok(done.clone());
            }
            table.matches.get(&id).cloned()
        };
        let shared = live.ok_or(MatchError::UnknownMatch(id))?;
        let session = shared.lock().await;
        Ok(session.snapshot())
    }

    /// Ask the engine what `player` should play. Uses the match's engine,
    /// starting one for games between two players.
    pub async fn suggest_move(&self, id: MatchId, player: PlayerId) -> MatchResult<Move> {
        let shared = self.session(id)?;
        let pending: PendingMove = loop {
            let mut session = shared.lock().await;
            let (start, moves) = session.suggestion_request(player)?;
            if session.is_engine_pending() {
                return Err(MatchError::Busy);
            }
            if let Some(bridge) = session.engine().filter(|bridge| bridge.is_alive()) {
                let strength = self.suggestion_strength();
                break bridge.request_move(session.board(), &start, &moves, &strength)?;
            }
            retire_dead_engine(&mut session);
            drop(session);

            let bridge = self.spawn_engine(id).await?;
            let mut session = shared.lock().await;
            install_engine(&mut session, bridge);
        };
        debug!(match_id = %id, %player, "suggestion requested");
        Ok(pending.await?)
    }

    /// Ask the engine again after a failed computer move, with a fresh
    /// process if the old one died.
    pub async fn retry_engine_move(&self, id: MatchId) -> MatchResult<()> {
        let shared = self.session(id)?;
        let mut session = shared.lock().await;
        if !session.is_active() {
            return Err(MatchError::invalid_state("match is not active"));
        }
        if session.computer_to_move().is_none() {
            return Err(MatchError::invalid_state("the computer is not to move"));
        }
        if session.is_engine_pending() {
            return Err(MatchError::Busy);
        }
        if let Some(bridge) = session.take_engine() {
            if bridge.is_alive() {
                session.set_engine(bridge);
            } else {
                tokio::spawn(bridge.shutdown());
            }
        }
        info!(match_id = %id, "retrying engine move");
        self.settle(&shared, &mut session, true);
        Ok(())
    }

    /// A player left: forfeit their live game or void their challenge.
    pub async fn player_disconnected(&self, player: PlayerId) -> MatchResult<Option<MatchId>> {
        let Some(id) = self.match_of(player) else {
            return Ok(None);
        };
        self.with_session(id, |session| session.disconnect(player)).await?;
        Ok(Some(id))
    }

    /// Abort challenges nobody answered in time.
    pub async fn expire_challenges(&self) -> Vec<MatchId> {
        let now = Utc::now();
        let mut expired = Vec::new();
        for shared in self.all_sessions() {
            let mut session = shared.lock().await;
            if session.expire(now) {
                expired.push(session.id());
                self.settle(&shared, &mut session, false);
            }
        }
        expired
    }

    /// Charge `elapsed` to the side to move in every timed match.
    pub async fn tick_clocks(&self, elapsed: Duration) -> Vec<(MatchId, Outcome)> {
        let mut flagged = Vec::new();
        for shared in self.all_sessions() {
            let mut session = shared.lock().await;
            if let Some(outcome) = session.tick(elapsed) {
                flagged.push((session.id(), outcome));
                self.settle(&shared, &mut session, false);
            }
        }
        flagged
    }

    /// Bring a saved match back under its original id. A game between two
    /// players comes back as a fresh challenge that the other seat has to
    /// accept before play goes on.
    pub async fn resume(&self, snapshot: &SessionSnapshot) -> MatchResult<MatchId> {
        let mut session = GameSession::from_snapshot(snapshot)?;
        if session.status().is_terminal() {
            return Err(MatchError::invalid_state("a finished match cannot be resumed"));
        }
        if !session.seats().has_computer() {
            session.reopen_challenge(self.challenge_deadline()?)?;
        }
        let id = session.id();
        let status = session.status();
        let shared = self.insert(session)?;
        info!(match_id = %id, ply = snapshot.moves.len(), ?status, "match resumed");
        let mut session = shared.lock().await;
        self.settle(&shared, &mut session, false);
        Ok(id)
    }

    /// Stop every engine and empty the table. Returns snapshots of the games
    /// that were still in progress so the host can resume them later.
    pub async fn shutdown(&self) -> Vec<SessionSnapshot> {
        let sessions: Vec<SharedSession> = {
            let mut table = self.table();
            table.closed = true;
            table.by_player.clear();
            table.matches.drain().map(|(_, session)| session).collect()
        };

        let mut saved = Vec::new();
        for shared in sessions {
            let mut session = shared.lock().await;
            if session.is_active() {
                saved.push(session.snapshot());
            }
            session.cancel_engine_request();
            if let Some(task) = session.take_engine_task() {
                task.abort();
            }
            let bridge = session.take_engine();
            drop(session);
            if let Some(bridge) = bridge {
                bridge.shutdown().await;
            }
        }

        info!(saved = saved.len(), "match registry shut down");
        saved
    }

    fn table(&self) -> MutexGuard<'_, MatchTable> {
        self.inner.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn session(&self, id: MatchId) -> MatchResult<SharedSession> {
        let table = self.table();
        if let Some(shared) = table.matches.get(&id) {
            return Ok(Arc::clone(shared));
        }
        if table.finished.contains_key(&id) {
            return Err(MatchError::invalid_state(format!("match {id} is over")));
        }
        Err(MatchError::UnknownMatch(id))
    }

    fn challenge_deadline(&self) -> MatchResult<DateTime<Utc>> {
        let timeout = chrono::Duration::from_std(self.inner.config.challenge_timeout)
            .map_err(|err| MatchError::InvalidState(err.to_string()))?;
        Ok(Utc::now() + timeout)
    }

    fn all_sessions(&self) -> Vec<SharedSession> {
        self.table().matches.values().cloned().collect()
    }

    fn insert(&self, session: GameSession) -> MatchResult<SharedSession> {
        let id = session.id();
        let players: Vec<PlayerId> = session.seats().players().chain(session.initiator()).collect();

        let mut table = self.table();
        if table.closed {
            return Err(MatchError::invalid_state("registry is shut down"));
        }
        if table.matches.contains_key(&id) {
            return Err(MatchError::invalid_state(format!("match {id} is already live")));
        }
        if table.finished.contains_key(&id) {
            return Err(MatchError::invalid_state(format!("match {id} is over")));
        }
        if let Some(busy) = players.iter().find(|player| table.by_player.contains_key(player)) {
            return Err(MatchError::AlreadyInMatch(*busy));
        }

        let shared = Arc::new(tokio::sync::Mutex::new(session));
        table.matches.insert(id, Arc::clone(&shared));
        for player in players {
            table.by_player.insert(player, id);
        }
        Ok(shared)
    }

    async fn with_session<T>(
        &self,
        id: MatchId,
        op: impl FnOnce(&mut GameSession) -> MatchResult<T>,
    ) -> MatchResult<T> {
        let shared = self.session(id)?;
        let mut session = shared.lock().await;
        let result = op(&mut *session);
        self.settle(&shared, &mut session, false);
        result
    }

    /// Publish queued events, then either retire a finished session or start
    /// the computer's move if it is its turn.
    fn settle(&self, shared: &SharedSession, session: &mut GameSession, retry: bool) {
        self.publish(session);
        if session.status().is_terminal() {
            self.retire(session);
        } else {
            self.schedule_engine(shared, session, retry);
        }
    }

    fn publish(&self, session: &mut GameSession) {
        let id = session.id();
        for kind in session.take_events() {
            // No subscribers is fine.
            let _ = self.inner.events.send(MatchEvent::now(id, kind));
        }
    }

    fn retire(&self, session: &mut GameSession) {
        let id = session.id();
        {
            let mut table = self.table();
            if table.matches.remove(&id).is_some() {
                table.by_player.retain(|_, match_id| *match_id != id);
                table.remember_finished(session.snapshot(), self.inner.config.finished_retention);
            }
        }
        if let Some(task) = session.take_engine_task() {
            task.abort();
        }
        if let Some(bridge) = session.take_engine() {
            tokio::spawn(bridge.shutdown());
        }
        debug!(match_id = %id, "session retired");
    }

    fn schedule_engine(&self, shared: &SharedSession, session: &mut GameSession, retry: bool) {
        if session.last_engine_failure().is_some() && !retry {
            return;
        }
        let Some(ticket) = session.begin_engine_request() else {
            return;
        };
        self.publish(session);
        let task = tokio::spawn(self.clone().drive_engine(Arc::clone(shared), ticket));
        session.set_engine_task(task.abort_handle());
    }

    async fn drive_engine(self, shared: SharedSession, ticket: EngineTicket) {
        let delay = self.inner.config.cpu_move_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let pending = loop {
            let mut session = shared.lock().await;
            if session.pending_generation() != Some(ticket.generation) {
                return;
            }

            let request = match session.engine().filter(|bridge| bridge.is_alive()) {
                Some(bridge) => bridge.request_move(&ticket.board, &ticket.start, &ticket.moves, &ticket.strength),
                None => {
                    // Spawning can take the whole handshake timeout; do it unlocked.
                    let id = session.id();
                    retire_dead_engine(&mut session);
                    drop(session);
                    let spawned = self.spawn_engine(id).await;

                    let mut session = shared.lock().await;
                    if session.pending_generation() != Some(ticket.generation) {
                        drop(session);
                        if let Ok(bridge) = spawned {
                            bridge.shutdown().await;
                        }
                        return;
                    }
                    match spawned {
                        Ok(bridge) => install_engine(&mut session, bridge),
                        Err(failure) => {
                            self.abandon_request(&shared, &mut session, ticket.generation, failure);
                            return;
                        }
                    }
                    continue;
                }
            };

            match request {
                Ok(pending) => break pending,
                Err(MatchError::Busy) => {
                    drop(session);
                    tokio::time::sleep(ENGINE_BUSY_RETRY).await;
                }
                Err(err) => {
                    let failure = match err {
                        MatchError::Engine(failure) => failure,
                        other => EngineFailure::Malformed(other.to_string()),
                    };
                    self.abandon_request(&shared, &mut session, ticket.generation, failure);
                    return;
                }
            }
        };

        let result = pending.await;

        let mut session = shared.lock().await;
        if session.pending_generation() != Some(ticket.generation) {
            debug!(match_id = %session.id(), generation = ticket.generation, "discarding stale engine reply");
            return;
        }
        session.take_engine_task();
        match result {
            Ok(mv) => {
                if let Err(err) = session.apply_engine_move(ticket.generation, mv) {
                    self.engine_failed(&mut session, ticket.generation, EngineFailure::Malformed(err.to_string()));
                }
            }
            Err(failure) => self.engine_failed(&mut session, ticket.generation, failure),
        }
        self.settle(&shared, &mut session, false);
    }

    async fn spawn_engine(&self, id: MatchId) -> Result<EngineBridge, EngineFailure> {
        let bridge = EngineBridge::spawn(&self.inner.config.engine).await?;
        info!(match_id = %id, "engine attached to match");
        Ok(bridge)
    }

    fn abandon_request(&self, shared: &SharedSession, session: &mut GameSession, generation: u64, failure: EngineFailure) {
        session.take_engine_task();
        self.engine_failed(session, generation, failure);
        self.settle(shared, session, false);
    }

    fn engine_failed(&self, session: &mut GameSession, generation: u64, failure: EngineFailure) {
        let color = session.side_to_move();
        if !session.record_engine_failure(generation, failure.clone()) {
            return;
        }
        warn!(match_id = %session.id(), %color, %failure, "engine move failed");
        if self.inner.config.forfeit_on_engine_failure {
            let _ = session.forfeit(color, ForfeitReason::EngineFailure);
        }
    }

    /// Full strength, at the default thinking time.
    fn suggestion_strength(&self) -> EngineStrength {
        EngineStrength {
            elo: None,
            skill_level: None,
            ..self.inner.config.default_strength
        }
    }
}

/// Drop a dead engine so a fresh one can be attached.
fn retire_dead_engine(session: &mut GameSession) {
    if let Some(dead) = session.take_engine() {
        tokio::spawn(dead.shutdown());
    }
}

/// Attach a freshly spawned engine, unless the session finished or another
/// caller attached a live one while it was starting.
fn install_engine(session: &mut GameSession, bridge: EngineBridge) {
    let occupied = session.engine().is_some_and(EngineBridge::is_alive);
    if occupied || session.status().is_terminal() {
        tokio::spawn(bridge.shutdown());
        return;
    }
    retire_dead_engine(session);
    session.set_engine(bridge);
}
