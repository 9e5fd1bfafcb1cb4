//! Coordinate notation (`e2e4`, `e7e8q`) used by players and by UCI engines.

use crate::errors::{IllegalMove, MatchError, MatchResult};
use crate::game_state::{chess_types::*, game_state::GameState};
use crate::move_generation::legal_move_generator::legal_moves;
use crate::moves::chess_move::Move;
use crate::utils::algebraic::parse_square;

/// Syntactic content of a coordinate move, not yet checked against a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinateMove {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<PieceKind>,
}

/// Parse four or five characters of coordinate notation. The promotion
/// letter may be either case.
pub fn parse_coordinate_move(text: &str) -> Option<CoordinateMove> {
    let text = text.trim();
    if !text.is_ascii() || !(text.len() == 4 || text.len() == 5) {
        return None;
    }

    let from = parse_square(&text[0..2])?;
    let to = parse_square(&text[2..4])?;
    let promotion = match text[4..].chars().next() {
        None => None,
        Some(ch) => Some(PieceKind::from_char(ch.to_ascii_lowercase()).filter(|kind| kind.is_promotion_target())?),
    };

    Some(CoordinateMove { from, to, promotion })
}

/// Legal move with exactly these coordinates, if any.
pub fn find_legal_move(game_state: &GameState, coords: CoordinateMove) -> Option<Move> {
    legal_moves(game_state)
        .into_iter()
        .find(|mv| mv.matches_coordinates(coords.from, coords.to, coords.promotion))
}

/// Resolve player input against the legal moves of `game_state`.
///
/// A pawn move to the last rank written without a promotion letter is
/// completed with `default_promotion`.
pub fn resolve_long_algebraic(
    game_state: &GameState,
    text: &str,
    default_promotion: PieceKind,
) -> MatchResult<Move> {
    let mut coords =
        parse_coordinate_move(text).ok_or_else(|| MatchError::InvalidNotation(text.trim().to_owned()))?;

    if coords.promotion.is_none() {
        let needs_promotion = legal_moves(game_state)
            .iter()
            .any(|mv| mv.from == coords.from && mv.to == coords.to && mv.promotion.is_some());
        if needs_promotion {
            coords.promotion = Some(default_promotion);
        }
    }

    find_legal_move(game_state, coords).ok_or_else(|| IllegalMove::new(text.trim().to_ascii_lowercase()).into())
}
