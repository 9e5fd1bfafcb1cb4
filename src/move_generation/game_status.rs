//! Position classification: check, mate, stalemate and the draw rules.
//!
//! Checkmate and stalemate are decided first; the fifty-move, repetition and
//! insufficient-material draws only apply to positions that still have legal
//! moves.

use serde::{Deserialize, Serialize};

use crate::game_state::chess_rules::{FIFTY_MOVE_HALFMOVES, REPETITION_DRAW_COUNT};
use crate::game_state::{chess_types::*, game_state::GameState};
use crate::move_generation::legal_move_checks::is_king_in_check;
use crate::move_generation::legal_move_generator::legal_moves;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    Normal,
    Check,
    Checkmate { winner: Color },
    Stalemate,
    DrawByFiftyMove,
    DrawByRepetition,
    DrawByInsufficientMaterial,
}

impl GameStatus {
    #[inline]
    pub fn is_terminal(self) -> bool {
        !matches!(self, GameStatus::Normal | GameStatus::Check)
    }
}

/// Repetition identity of a position.
///
/// The en-passant square is only part of the key when an en-passant capture
/// is actually legal, so a double push that cannot be taken does not make the
/// position differ from its later repetitions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PositionKey {
    pieces: [[u64; 6]; 2],
    side_to_move: Color,
    castling_rights: CastlingRights,
    en_passant_square: Option<Square>,
}

impl PositionKey {
    pub fn of(game_state: &GameState) -> Self {
        let en_passant_square = game_state.en_passant_square.filter(|_| {
            legal_moves(game_state)
                .iter()
                .any(|mv| mv.is_en_passant())
        });

        Self {
            pieces: game_state.pieces,
            side_to_move: game_state.side_to_move,
            castling_rights: game_state.castling_rights,
            en_passant_square,
        }
    }
}

/// Classify `game_state`. `history` is every position of the game in order
/// and includes `game_state` itself as its last entry.
pub fn game_status(game_state: &GameState, history: &[GameState]) -> GameStatus {
    let side = game_state.side_to_move;
    let in_check = is_king_in_check(game_state, side);

    if legal_moves(game_state).is_empty() {
        return if in_check {
            GameStatus::Checkmate {
                winner: side.opposite(),
            }
        } else {
            GameStatus::Stalemate
        };
    }

    if game_state.halfmove_clock >= FIFTY_MOVE_HALFMOVES {
        return GameStatus::DrawByFiftyMove;
    }

    if repetition_count(game_state, history) >= REPETITION_DRAW_COUNT {
        return GameStatus::DrawByRepetition;
    }

    if is_insufficient_material(game_state) {
        return GameStatus::DrawByInsufficientMaterial;
    }

    if in_check {
        GameStatus::Check
    } else {
        GameStatus::Normal
    }
}

/// Occurrences of `game_state`'s key in `history`. Only the window since the
/// last capture or pawn move can contain repetitions.
pub fn repetition_count(game_state: &GameState, history: &[GameState]) -> usize {
    let window = usize::from(game_state.halfmove_clock) + 1;
    let start = history.len().saturating_sub(window);
    let key = PositionKey::of(game_state);

    history[start..]
        .iter()
        .filter(|previous| {
            previous.side_to_move == game_state.side_to_move
                && previous.pieces == game_state.pieces
                && PositionKey::of(previous) == key
        })
        .count()
}

/// True when neither side can possibly deliver mate: bare kings, a single
/// minor piece, or only bishops that all stand on one square color.
pub fn is_insufficient_material(game_state: &GameState) -> bool {
    let mut minors = 0u32;
    let mut bishops = 0u64;

    for color in Color::ALL {
        let heavy_or_pawn = game_state.bitboard(color, PieceKind::Pawn)
            | game_state.bitboard(color, PieceKind::Rook)
            | game_state.bitboard(color, PieceKind::Queen);
        if heavy_or_pawn != 0 {
            return false;
        }
        let color_bishops = game_state.bitboard(color, PieceKind::Bishop);
        minors += (game_state.bitboard(color, PieceKind::Knight) | color_bishops).count_ones();
        bishops |= color_bishops;
    }

    if minors <= 1 {
        return true;
    }
    if minors != bishops.count_ones() {
        return false;
    }

    let mut light = 0u32;
    let mut squares = bishops;
    while squares != 0 {
        if is_light_square(squares.trailing_zeros() as Square) {
            light += 1;
        }
        squares &= squares - 1;
    }
    light == 0 || light == bishops.count_ones()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::move_generation::legal_move_apply::apply_move;

    fn play(moves: &[&str]) -> Vec<GameState> {
        play_from(GameState::new_game(), moves)
    }

    fn play_from(start: GameState, moves: &[&str]) -> Vec<GameState> {
        let mut history = vec![start];
        for uci in moves {
            let current = history.last().expect("history is never empty");
            let mv = legal_moves(current)
                .into_iter()
                .find(|mv| mv.to_uci() == *uci)
                .unwrap_or_else(|| panic!("{uci} should be legal"));
            let next = apply_move(current, &mv).expect("legal move applies");
            history.push(next);
        }
        history
    }

    fn status_of(fen: &str) -> GameStatus {
        let game = GameState::from_fen(fen).expect("FEN should parse");
        game_status(&game, std::slice::from_ref(&game))
    }

    #[test]
    fn fools_mate_is_checkmate_for_black() {
        let history = play(&["f2f3", "e7e5", "g2g4", "d8h4"]);
        let last = history.last().expect("non-empty");
        assert_eq!(
            game_status(last, &history),
            GameStatus::Checkmate { winner: Color::Black }
        );
    }

    #[test]
    fn stalemate_is_not_checkmate() {
        assert_eq!(status_of("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1"), GameStatus::Stalemate);
    }

    #[test]
    fn check_is_reported() {
        assert_eq!(status_of("4k3/8/8/8/8/8/8/4RK2 b - - 0 1"), GameStatus::Check);
    }

    #[test]
    fn mate_on_the_hundredth_halfmove_still_wins() {
        assert_eq!(
            status_of("R5k1/5ppp/8/8/8/8/8/6K1 b - - 100 80"),
            GameStatus::Checkmate { winner: Color::White }
        );
        assert_eq!(status_of("6k1/5ppp/8/8/8/8/8/R5K1 b - - 100 80"), GameStatus::DrawByFiftyMove);
    }

    #[test]
    fn knight_shuffle_draws_on_third_occurrence() {
        let history = play(&["g1f3", "g8f6", "f3g1", "f6g8", "g1f3", "g8f6", "f3g1"]);
        let last = history.last().expect("non-empty");
        assert_eq!(game_status(last, &history), GameStatus::Normal);

        let history = play(&["g1f3", "g8f6", "f3g1", "f6g8", "g1f3", "g8f6", "f3g1", "f6g8"]);
        let last = history.last().expect("non-empty");
        assert_eq!(repetition_count(last, &history), 3);
        assert_eq!(game_status(last, &history), GameStatus::DrawByRepetition);
    }

    #[test]
    fn lost_castling_rights_make_a_different_position() {
        let start = GameState::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").expect("FEN should parse");
        let shuffle = ["e1e2", "e8e7", "e2e1", "e7e8"];

        // Same placement as the start after each cycle, but without rights.
        let history = play_from(start.clone(), &shuffle.repeat(2));
        let last = history.last().expect("non-empty");
        assert_eq!(last.pieces, start.pieces);
        assert_eq!(repetition_count(last, &history), 2);
        assert_eq!(game_status(last, &history), GameStatus::Normal);

        let history = play_from(start, &shuffle.repeat(3));
        let last = history.last().expect("non-empty");
        assert_eq!(repetition_count(last, &history), 3);
        assert_eq!(game_status(last, &history), GameStatus::DrawByRepetition);
    }

    #[test]
    fn uncapturable_en_passant_square_does_not_split_repetitions() {
        // After 1.e4 the e3 square is set but no black pawn can take, so the
        // position equals the same placement reached later without it.
        let after_e4 = play(&["e2e4"]);
        let with_ep = after_e4.last().expect("non-empty");
        assert!(with_ep.en_passant_square.is_some());
        let mut without_ep = with_ep.clone();
        without_ep.en_passant_square = None;
        assert_eq!(PositionKey::of(with_ep), PositionKey::of(&without_ep));
    }

    #[test]
    fn capturable_en_passant_square_is_part_of_the_key() {
        let game = GameState::from_fen("4k3/8/8/3pP3/8/8/8/4K3 w - d6 0 2").expect("FEN should parse");
        let mut without_ep = game.clone();
        without_ep.en_passant_square = None;
        assert_ne!(PositionKey::of(&game), PositionKey::of(&without_ep));
    }

    #[test]
    fn insufficient_material_cases() {
        assert_eq!(status_of("8/8/8/4k3/8/8/8/4K3 w - - 0 1"), GameStatus::DrawByInsufficientMaterial);
        assert_eq!(status_of("8/8/8/4k3/8/8/8/3NK3 w - - 0 1"), GameStatus::DrawByInsufficientMaterial);
        // Bishops on c1 (dark) and f8 (dark).
        assert_eq!(status_of("5b2/8/8/4k3/8/8/8/2B1K3 w - - 0 1"), GameStatus::DrawByInsufficientMaterial);
        // Bishops on c1 (dark) and c8 (light).
        assert_eq!(status_of("2b5/8/8/4k3/8/8/8/2B1K3 w - - 0 1"), GameStatus::Normal);
        assert_eq!(status_of("8/8/8/4k3/8/8/8/2NNK3 w - - 0 1"), GameStatus::Normal);
        assert_eq!(status_of("8/8/8/4k3/8/8/4P3/4K3 w - - 0 1"), GameStatus::Normal);
    }

    #[test]
    fn classification_is_idempotent() {
        let history = play(&["e2e4", "e7e5", "g1f3"]);
        let last = history.last().expect("non-empty");
        let first = game_status(last, &history);
        assert_eq!(first, game_status(last, &history));
        assert_eq!(first, GameStatus::Normal);
    }
}
