//! Per-match state machine.
//!
//! `AwaitingAcceptance -> Active -> Completed | Aborted`. A session owns the
//! board history of one match and decides which operations are allowed in
//! each phase. It never awaits: engine requests are handed out as
//! [`EngineTicket`]s and their answers come back through
//! [`GameSession::apply_engine_move`] or [`GameSession::record_engine_failure`].
//! Every transition queues a [`MatchEventKind`] for the registry to publish.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::AbortHandle;
use tracing::{debug, info};

use crate::engine::engine_bridge::{EngineBridge, EngineStrength};
use crate::errors::{EngineFailure, MatchError, MatchResult};
use crate::game_state::chess_types::{Color, PieceKind, Square};
use crate::game_state::game_state::GameState;
use crate::move_generation::game_status::{game_status, GameStatus};
use crate::move_generation::legal_move_apply::apply_move;
use crate::move_generation::legal_move_generator::legal_destinations;
use crate::moves::chess_move::Move;
use crate::session::events::MatchEventKind;
use crate::session::outcome::{AbortReason, DrawReason, ForfeitReason, Outcome, SessionStatus, WinReason};
use crate::session::participant::{MatchId, Participant, PlayerId, Seats};
use crate::session::snapshot::{PromotionPreferences, SessionSnapshot};
use crate::session::time_control::{Clocks, TimeControlSettings};
use crate::utils::long_algebraic::resolve_long_algebraic;

/// Result of an accepted move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyResult {
    pub mv: Move,
    pub color: Color,
    pub board: GameState,
    pub status: GameStatus,
    /// Set when the move ended the game.
    pub outcome: Option<Outcome>,
}

/// Answer to a draw offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawOffer {
    /// The offer stands until the opponent offers back or makes a move.
    Offered,
    /// The opponent had already offered; the game is drawn.
    Agreed(Outcome),
}

/// Everything needed to ask an engine for the side to move's reply.
#[derive(Debug, Clone)]
pub struct EngineTicket {
    pub generation: u64,
    pub color: Color,
    pub strength: EngineStrength,
    pub start: GameState,
    pub board: GameState,
    pub moves: Vec<Move>,
}

pub struct GameSession {
    id: MatchId,
    seats: Seats,
    initiator: Option<PlayerId>,
    status: SessionStatus,
    history: Vec<GameState>,
    moves: Vec<Move>,
    time_control: Option<TimeControlSettings>,
    clocks: Option<Clocks>,
    promotion: PromotionPreferences,
    draw_offer: Option<Color>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    request_generation: u64,
    pending_request: Option<u64>,
    last_engine_failure: Option<EngineFailure>,
    engine: Option<EngineBridge>,
    engine_task: Option<AbortHandle>,
    events: Vec<MatchEventKind>,
}

impl GameSession {
    fn build(
        id: MatchId,
        seats: Seats,
        initiator: Option<PlayerId>,
        start: GameState,
        time_control: Option<TimeControlSettings>,
        status: SessionStatus,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            seats,
            initiator,
            status,
            history: vec![start],
            moves: Vec::new(),
            time_control,
            clocks: time_control.as_ref().map(Clocks::new),
            promotion: PromotionPreferences::default(),
            draw_offer: None,
            created_at: now,
            updated_at: now,
            expires_at: None,
            request_generation: 0,
            pending_request: None,
            last_engine_failure: None,
            engine: None,
            engine_task: None,
            events: Vec::new(),
        }
    }

    /// A challenge between two players, waiting for the other side.
    pub fn new_challenge(
        id: MatchId,
        seats: Seats,
        initiator: PlayerId,
        time_control: Option<TimeControlSettings>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        let mut session = Self::build(
            id,
            seats,
            Some(initiator),
            GameState::new_game(),
            time_control,
            SessionStatus::AwaitingAcceptance,
        );
        session.expires_at = Some(expires_at);
        session.events.push(MatchEventKind::ChallengeIssued {
            seats,
            time_control,
            expires_at,
        });
        session
    }

    /// A match that starts at once, as games against the computer do.
    pub fn new_active(
        id: MatchId,
        seats: Seats,
        initiator: Option<PlayerId>,
        time_control: Option<TimeControlSettings>,
    ) -> Self {
        Self::from_position(id, seats, initiator, GameState::new_game(), time_control)
    }

    /// An active match from an arbitrary start position.
    pub fn from_position(
        id: MatchId,
        seats: Seats,
        initiator: Option<PlayerId>,
        start: GameState,
        time_control: Option<TimeControlSettings>,
    ) -> Self {
        let mut session = Self::build(id, seats, initiator, start, time_control, SessionStatus::Active);
        session.events.push(MatchEventKind::Started { seats, time_control });
        session
    }

    /// Rebuild a session by replaying a snapshot's moves.
    pub fn from_snapshot(snapshot: &SessionSnapshot) -> MatchResult<Self> {
        let replay = snapshot.replay()?;
        let Some(start) = replay.history.first().cloned() else {
            return Err(MatchError::Snapshot("empty history".to_owned()));
        };

        if snapshot.clocks.is_some() != snapshot.time_control.is_some() {
            return Err(MatchError::Snapshot("clocks and time control disagree".to_owned()));
        }

        let mut session = Self::build(
            snapshot.match_id,
            snapshot.seats,
            snapshot.initiator,
            start,
            snapshot.time_control,
            snapshot.status,
        );
        session.history = replay.history;
        session.moves = replay.moves;
        session.clocks = snapshot.clocks;
        session.promotion = snapshot.promotion;
        session.draw_offer = snapshot.draw_offer;
        session.created_at = snapshot.created_at;
        session.updated_at = snapshot.updated_at;
        session.expires_at = snapshot.expires_at;

        if !session.status.is_terminal() {
            let status = session.current_status();
            if status.is_terminal() {
                return Err(MatchError::Snapshot(format!("live snapshot is already over ({status:?})")));
            }
        }
        if session.status == SessionStatus::Active {
            session.events.push(MatchEventKind::Resumed {
                seats: session.seats,
                ply: session.moves.len(),
            });
        }
        Ok(session)
    }

    /// Put a game between two players back up for acceptance. Play goes on
    /// once the seat other than the initiator accepts.
    pub fn reopen_challenge(&mut self, expires_at: DateTime<Utc>) -> MatchResult<()> {
        if self.status.is_terminal() || self.seats.has_computer() {
            return Err(MatchError::invalid_state("only a live game between players can be reopened"));
        }
        self.status = SessionStatus::AwaitingAcceptance;
        self.expires_at = Some(expires_at);
        // Replaces the Resumed notice.
        self.events.clear();
        self.events.push(MatchEventKind::ChallengeIssued {
            seats: self.seats,
            time_control: self.time_control,
            expires_at,
        });
        Ok(())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            match_id: self.id,
            seats: self.seats,
            initiator: self.initiator,
            start_fen: self.history[0].get_fen(),
            moves: self.moves.iter().map(Move::to_uci).collect(),
            status: self.status,
            time_control: self.time_control,
            clocks: self.clocks,
            promotion: self.promotion,
            draw_offer: self.draw_offer,
            created_at: self.created_at,
            updated_at: self.updated_at,
            expires_at: self.expires_at,
        }
    }

    pub const fn id(&self) -> MatchId {
        self.id
    }

    pub const fn seats(&self) -> &Seats {
        &self.seats
    }

    pub const fn initiator(&self) -> Option<PlayerId> {
        self.initiator
    }

    pub const fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// The current position.
    pub fn board(&self) -> &GameState {
        &self.history[self.history.len() - 1]
    }

    pub fn history(&self) -> &[GameState] {
        &self.history
    }

    pub fn moves(&self) -> &[Move] {
        &self.moves
    }

    pub fn side_to_move(&self) -> Color {
        self.board().side_to_move
    }

    pub const fn clocks(&self) -> Option<&Clocks> {
        self.clocks.as_ref()
    }

    pub const fn draw_offer(&self) -> Option<Color> {
        self.draw_offer
    }

    pub const fn promotion_preference(&self, color: Color) -> PieceKind {
        self.promotion.get(color)
    }

    pub const fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub const fn last_engine_failure(&self) -> Option<&EngineFailure> {
        self.last_engine_failure.as_ref()
    }

    /// Whether an engine move is being computed.
    pub const fn is_engine_pending(&self) -> bool {
        self.pending_request.is_some()
    }

    /// Generation of the outstanding engine request.
    pub const fn pending_generation(&self) -> Option<u64> {
        self.pending_request
    }

    /// Strength of the side to move, when that side is the computer.
    pub fn computer_to_move(&self) -> Option<EngineStrength> {
        match self.seats.get(self.side_to_move()) {
            Participant::Computer(strength) => Some(*strength),
            Participant::Human(_) => None,
        }
    }

    /// Classification of the current board.
    pub fn current_status(&self) -> GameStatus {
        game_status(self.board(), &self.history)
    }

    /// Events queued since the last call.
    pub fn take_events(&mut self) -> Vec<MatchEventKind> {
        std::mem::take(&mut self.events)
    }

    pub fn accept(&mut self, responder: PlayerId, now: DateTime<Utc>) -> MatchResult<()> {
        if self.status != SessionStatus::AwaitingAcceptance {
            return Err(MatchError::invalid_state("challenge is no longer pending"));
        }
        self.seat_of(responder)?;
        if self.initiator == Some(responder) {
            return Err(MatchError::invalid_state("cannot accept your own challenge"));
        }
        if self.expire(now) {
            return Err(MatchError::ChallengeExpired);
        }

        self.status = SessionStatus::Active;
        self.expires_at = None;
        self.touch();
        info!(match_id = %self.id, "challenge accepted");
        self.events.push(MatchEventKind::Started {
            seats: self.seats,
            time_control: self.time_control,
        });
        Ok(())
    }

    /// Either side may call off a pending challenge.
    pub fn decline(&mut self, responder: PlayerId) -> MatchResult<()> {
        if self.status != SessionStatus::AwaitingAcceptance {
            return Err(MatchError::invalid_state("challenge is no longer pending"));
        }
        self.seat_of(responder)?;
        self.abort(AbortReason::Declined);
        Ok(())
    }

    /// Abort a pending challenge whose deadline has passed. True if it did.
    pub fn expire(&mut self, now: DateTime<Utc>) -> bool {
        let lapsed = self.status == SessionStatus::AwaitingAcceptance
            && self.expires_at.is_some_and(|deadline| deadline <= now);
        if lapsed {
            self.abort(AbortReason::Expired);
        }
        lapsed
    }

    /// Play a human move given in long algebraic notation.
    pub fn submit_move(&mut self, player: PlayerId, notation: &str) -> MatchResult<ApplyResult> {
        self.ensure_active()?;
        let color = self.seat_of(player)?;
        if self.pending_request.is_some() {
            return Err(MatchError::Busy);
        }
        if color != self.side_to_move() {
            return Err(MatchError::NotYourTurn);
        }

        let mv = resolve_long_algebraic(self.board(), notation, self.promotion.get(color))?;
        self.play(mv)
    }

    /// Claim the next engine request, if the computer is to move and none is
    /// outstanding.
    pub fn begin_engine_request(&mut self) -> Option<EngineTicket> {
        if !self.is_active() || self.pending_request.is_some() {
            return None;
        }
        let strength = self.computer_to_move()?;
        let color = self.side_to_move();

        self.request_generation += 1;
        self.pending_request = Some(self.request_generation);
        self.events.push(MatchEventKind::EngineThinking { color });
        debug!(match_id = %self.id, generation = self.request_generation, %color, "engine move requested");

        Some(EngineTicket {
            generation: self.request_generation,
            color,
            strength,
            start: self.history[0].clone(),
            board: self.board().clone(),
            moves: self.moves.clone(),
        })
    }

    /// Apply the engine's answer to the request `generation`. Answers to any
    /// other request are stale and rejected.
    pub fn apply_engine_move(&mut self, generation: u64, mv: Move) -> MatchResult<ApplyResult> {
        self.ensure_active()?;
        if self.pending_request != Some(generation) {
            return Err(MatchError::invalid_state("stale engine reply"));
        }
        let result = self.play(mv)?;
        self.pending_request = None;
        self.last_engine_failure = None;
        Ok(result)
    }

    /// Record a failed engine request. Returns false when the request was
    /// already superseded.
    pub fn record_engine_failure(&mut self, generation: u64, failure: EngineFailure) -> bool {
        if self.pending_request != Some(generation) {
            return false;
        }
        self.pending_request = None;
        let color = self.side_to_move();
        self.events.push(MatchEventKind::EngineFailed {
            color,
            failure: failure.clone(),
        });
        self.last_engine_failure = Some(failure);
        self.touch();
        true
    }

    /// Forget any outstanding engine request so its answer is discarded.
    pub fn cancel_engine_request(&mut self) {
        if self.pending_request.take().is_some() {
            self.request_generation += 1;
        }
    }

    pub fn resign(&mut self, player: PlayerId) -> MatchResult<Outcome> {
        self.ensure_active()?;
        let color = self.seat_of(player)?;
        let outcome = Outcome::Win {
            winner: color.opposite(),
            reason: WinReason::Resignation,
        };
        self.complete(outcome);
        Ok(outcome)
    }

    /// Offer a draw; matching the opponent's standing offer agrees to it.
    pub fn offer_draw(&mut self, player: PlayerId) -> MatchResult<DrawOffer> {
        self.ensure_active()?;
        let color = self.seat_of(player)?;

        if self.draw_offer == Some(color.opposite()) {
            let outcome = Outcome::Draw {
                reason: DrawReason::Agreement,
            };
            self.complete(outcome);
            return Ok(DrawOffer::Agreed(outcome));
        }

        if self.draw_offer != Some(color) {
            self.draw_offer = Some(color);
            self.touch();
            self.events.push(MatchEventKind::DrawOffered { by: color });
        }
        Ok(DrawOffer::Offered)
    }

    /// Choose what the player's next pawn promotion becomes.
    pub fn set_promotion(&mut self, player: PlayerId, kind: PieceKind) -> MatchResult<()> {
        self.ensure_active()?;
        let color = self.seat_of(player)?;
        if !kind.is_promotion_target() {
            return Err(MatchError::invalid_state(format!("cannot promote to {kind}")));
        }
        self.promotion.set(color, kind);
        self.touch();
        self.events.push(MatchEventKind::PromotionSet { color, kind });
        Ok(())
    }

    /// `loser` forfeits the game.
    pub fn forfeit(&mut self, loser: Color, reason: ForfeitReason) -> MatchResult<Outcome> {
        self.ensure_active()?;
        let outcome = Outcome::Win {
            winner: loser.opposite(),
            reason: WinReason::Forfeit(reason),
        };
        self.complete(outcome);
        Ok(outcome)
    }

    /// A player left: a seated player forfeits a live game, and any pending
    /// challenge they are part of is void. A watching initiator of an
    /// engine-only game takes the game down with them.
    pub fn disconnect(&mut self, player: PlayerId) -> MatchResult<()> {
        match (self.status, self.seats.color_of(player)) {
            (SessionStatus::AwaitingAcceptance, Some(_)) => {
                self.abort(AbortReason::Disconnected);
                Ok(())
            }
            (SessionStatus::Active, Some(color)) => self.forfeit(color, ForfeitReason::Disconnect).map(|_| ()),
            (SessionStatus::Active, None) if self.initiator == Some(player) => {
                self.abort(AbortReason::Disconnected);
                Ok(())
            }
            (status, _) if status.is_terminal() => Err(MatchError::invalid_state("match is over")),
            _ => Err(MatchError::NotAParticipant(player)),
        }
    }

    /// Run the side to move's clock. Returns the outcome if the flag fell.
    pub fn tick(&mut self, elapsed: Duration) -> Option<Outcome> {
        if !self.is_active() {
            return None;
        }
        let side = self.side_to_move();
        let flagged = self.clocks.as_mut()?.get_mut(side).tick(elapsed);
        if !flagged {
            return None;
        }
        info!(match_id = %self.id, %side, "flag fell");
        self.forfeit(side, ForfeitReason::Timeout).ok()
    }

    /// Squares the piece on `from` may move to. Empty unless it is the
    /// player's own piece and their turn.
    pub fn legal_destinations(&self, player: PlayerId, from: Square) -> MatchResult<Vec<Square>> {
        self.ensure_active()?;
        let color = self.seat_of(player)?;
        if color != self.side_to_move() {
            return Ok(Vec::new());
        }
        Ok(legal_destinations(self.board(), from))
    }

    /// Check that `player` may ask for a hint now, and return the position to
    /// analyse.
    pub fn suggestion_request(&self, player: PlayerId) -> MatchResult<(GameState, Vec<Move>)> {
        self.ensure_active()?;
        let color = self.seat_of(player)?;
        if color != self.side_to_move() {
            return Err(MatchError::NotYourTurn);
        }
        Ok((self.history[0].clone(), self.moves.clone()))
    }

    pub(crate) fn engine(&self) -> Option<&EngineBridge> {
        self.engine.as_ref()
    }

    pub(crate) fn set_engine(&mut self, bridge: EngineBridge) {
        self.engine = Some(bridge);
    }

    pub(crate) fn take_engine(&mut self) -> Option<EngineBridge> {
        self.engine.take()
    }

    pub(crate) fn set_engine_task(&mut self, task: AbortHandle) {
        if let Some(previous) = self.engine_task.replace(task) {
            previous.abort();
        }
    }

    pub(crate) fn take_engine_task(&mut self) -> Option<AbortHandle> {
        self.engine_task.take()
    }

    fn play(&mut self, mv: Move) -> MatchResult<ApplyResult> {
        let color = self.side_to_move();
        let next = apply_move(self.board(), &mv)?;

        if mv.promotion.is_some() {
            self.promotion.reset(color);
        }
        if let Some(clocks) = self.clocks.as_mut() {
            clocks.get_mut(color).complete_move();
        }
        // Replying with a move turns down the opponent's offer.
        if self.draw_offer == Some(color.opposite()) {
            self.draw_offer = None;
        }

        self.moves.push(mv);
        self.history.push(next);
        self.touch();

        let status = self.current_status();
        debug!(match_id = %self.id, mv = %mv.to_uci(), ?status, "move applied");
        self.events.push(MatchEventKind::MoveMade {
            color,
            uci: mv.to_uci(),
            fen: self.board().get_fen(),
            status,
        });

        let outcome = Outcome::from_status(status);
        if let Some(outcome) = outcome {
            self.complete(outcome);
        }

        Ok(ApplyResult {
            mv,
            color,
            board: self.board().clone(),
            status,
            outcome,
        })
    }

    fn complete(&mut self, outcome: Outcome) {
        self.status = SessionStatus::Completed { outcome };
        self.finish();
        info!(match_id = %self.id, %outcome, "match completed");
        self.events.push(MatchEventKind::Completed {
            outcome,
            snapshot: Box::new(self.snapshot()),
        });
    }

    fn abort(&mut self, reason: AbortReason) {
        self.status = SessionStatus::Aborted { reason };
        self.finish();
        info!(match_id = %self.id, ?reason, "match aborted");
        self.events.push(MatchEventKind::Aborted {
            reason,
            snapshot: Box::new(self.snapshot()),
        });
    }

    fn finish(&mut self) {
        self.cancel_engine_request();
        self.draw_offer = None;
        self.expires_at = None;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    fn ensure_active(&self) -> MatchResult<()> {
        match self.status {
            SessionStatus::Active => Ok(()),
            SessionStatus::AwaitingAcceptance => Err(MatchError::invalid_state("match has not started")),
            SessionStatus::Completed { .. } | SessionStatus::Aborted { .. } => {
                Err(MatchError::invalid_state("match is over"))
            }
        }
    }

    fn seat_of(&self, player: PlayerId) -> MatchResult<Color> {
        self.seats.color_of(player).ok_or(MatchError::NotAParticipant(player))
    }
}
