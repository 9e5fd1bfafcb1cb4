//! Serializable match state for resuming and archiving.
//!
//! A snapshot stores the start position and the moves played, not the boards;
//! [`SessionSnapshot::replay`] rebuilds the board history and rejects a move
//! list that does not replay legally.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{MatchError, MatchResult};
use crate::game_state::chess_types::{Color, PieceKind};
use crate::game_state::game_state::GameState;
use crate::move_generation::legal_move_apply::apply_move;
use crate::moves::chess_move::Move;
use crate::session::outcome::SessionStatus;
use crate::session::participant::{MatchId, PlayerId, Seats};
use crate::session::time_control::{Clocks, TimeControlSettings};
use crate::utils::long_algebraic::{find_legal_move, parse_coordinate_move};

/// Kind each color's next promotion becomes when the move text names none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionPreferences {
    pub white: PieceKind,
    pub black: PieceKind,
}

impl Default for PromotionPreferences {
    fn default() -> Self {
        Self {
            white: PieceKind::Queen,
            black: PieceKind::Queen,
        }
    }
}

impl PromotionPreferences {
    pub const fn get(&self, color: Color) -> PieceKind {
        match color {
            Color::White => self.white,
            Color::Black => self.black,
        }
    }

    pub fn set(&mut self, color: Color, kind: PieceKind) {
        match color {
            Color::White => self.white = kind,
            Color::Black => self.black = kind,
        }
    }

    pub fn reset(&mut self, color: Color) {
        self.set(color, PieceKind::Queen);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub match_id: MatchId,
    pub seats: Seats,
    /// Player who issued the challenge; `None` for resumed engine-only games.
    pub initiator: Option<PlayerId>,
    pub start_fen: String,
    /// Moves in long algebraic notation, oldest first.
    pub moves: Vec<String>,
    pub status: SessionStatus,
    pub time_control: Option<TimeControlSettings>,
    pub clocks: Option<Clocks>,
    pub promotion: PromotionPreferences,
    pub draw_offer: Option<Color>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// When a pending challenge lapses.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Boards rebuilt from a snapshot's move list.
#[derive(Debug, Clone)]
pub struct Replay {
    /// Every position from the start, the current one last.
    pub history: Vec<GameState>,
    pub moves: Vec<Move>,
}

impl SessionSnapshot {
    pub fn to_json(&self) -> MatchResult<String> {
        serde_json::to_string_pretty(self).map_err(|err| MatchError::Snapshot(err.to_string()))
    }

    pub fn from_json(text: &str) -> MatchResult<Self> {
        serde_json::from_str(text).map_err(|err| MatchError::Snapshot(err.to_string()))
    }

    pub fn replay(&self) -> MatchResult<Replay> {
        let start = GameState::from_fen(&self.start_fen)
            .map_err(|err| MatchError::Snapshot(format!("start position: {err}")))?;

        let mut history = Vec::with_capacity(self.moves.len() + 1);
        let mut moves = Vec::with_capacity(self.moves.len());
        history.push(start);

        for (index, text) in self.moves.iter().enumerate() {
            let board = &history[history.len() - 1];
            let bad_move = || MatchError::Snapshot(format!("move {} `{text}` does not replay", index + 1));
            let coords = parse_coordinate_move(text).ok_or_else(bad_move)?;
            let mv = find_legal_move(board, coords).ok_or_else(bad_move)?;
            let next = apply_move(board, &mv).map_err(|_| bad_move())?;
            moves.push(mv);
            history.push(next);
        }

        Ok(Replay { history, moves })
    }
}
