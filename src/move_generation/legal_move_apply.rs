//! Successor-state construction.
//!
//! [`play_unchecked`] performs the board update for any pseudo-legal move and
//! is what the generator uses to filter self-check. [`apply_move`] is the
//! public entry point and only accepts moves that are legal in the position.

use crate::errors::IllegalMove;
use crate::game_state::chess_rules::{kingside_path, queenside_path, ALL_CASTLING_PATHS, MAX_CHECKERS};
use crate::game_state::{chess_types::*, game_state::GameState};
use crate::move_generation::legal_move_checks::checker_count;
use crate::move_generation::legal_move_generator::generate_legal_moves;
use crate::moves::chess_move::Move;

/// Apply `mv` if it is legal in `game_state`.
///
/// The move is matched by origin, destination and promotion kind, so a
/// hand-built `Move` without flags resolves to the generator's version.
pub fn apply_move(game_state: &GameState, mv: &Move) -> Result<GameState, IllegalMove> {
    let next = generate_legal_moves(game_state)
        .into_iter()
        .find(|generated| generated.mv.matches_coordinates(mv.from, mv.to, mv.promotion))
        .map(|generated| generated.game_after_move)
        .ok_or_else(|| IllegalMove::new(mv.to_uci()))?;

    debug_assert!(
        checker_count(&next, next.side_to_move) <= MAX_CHECKERS,
        "apply_move produced a position with more than {MAX_CHECKERS} checkers"
    );
    Ok(next)
}

/// Board update without a legality check.
pub(crate) fn play_unchecked(game_state: &GameState, mv: &Move) -> GameState {
    let moving_color = game_state.side_to_move;
    let mut next = game_state.clone();

    next.clear_square(mv.from);
    if mv.is_en_passant() {
        let passed_pawn = mv.to.wrapping_add_signed(-moving_color.pawn_push_offset());
        next.clear_square(passed_pawn);
    } else if mv.is_capture() {
        next.clear_square(mv.to);
    }

    let landing = mv.promotion.unwrap_or(mv.piece);
    next.put_piece(mv.to, Piece::new(moving_color, landing));

    if mv.is_castling() {
        let path = if mv.is_kingside_castle() {
            kingside_path(moving_color)
        } else {
            queenside_path(moving_color)
        };
        next.clear_square(path.rook_from);
        next.put_piece(path.rook_to, Piece::new(moving_color, PieceKind::Rook));
    }

    update_castling_rights(&mut next, moving_color, mv);

    next.en_passant_square = if mv.is_double_pawn_push() {
        Some((mv.from + mv.to) / 2)
    } else {
        None
    };

    if mv.is_irreversible() {
        next.halfmove_clock = 0;
    } else {
        next.halfmove_clock = next.halfmove_clock.saturating_add(1);
    }
    if moving_color == Color::Black {
        next.fullmove_number = next.fullmove_number.saturating_add(1);
    }

    next.side_to_move = moving_color.opposite();
    next.recalc_occupancy();
    next
}

fn update_castling_rights(next: &mut GameState, moving_color: Color, mv: &Move) {
    if next.castling_rights == 0 {
        return;
    }
    if mv.piece == PieceKind::King {
        next.castling_rights &= !castling_rights_of(moving_color);
    }
    // A rook leaving its home square or being captured there.
    for path in ALL_CASTLING_PATHS {
        if mv.from == path.rook_from || mv.to == path.rook_from {
            next.castling_rights &= !path.right;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::apply_move;
    use crate::errors::IllegalMove;
    use crate::game_state::chess_types::*;
    use crate::game_state::game_state::GameState;
    use crate::move_generation::legal_move_generator::legal_moves;
    use crate::moves::chess_move::Move;
    use crate::utils::algebraic::parse_square;

    fn find(game: &GameState, uci: &str) -> Move {
        legal_moves(game)
            .into_iter()
            .find(|mv| mv.to_uci() == uci)
            .unwrap_or_else(|| panic!("{uci} should be legal"))
    }

    fn sq(name: &str) -> Square {
        parse_square(name).expect("valid square")
    }

    #[test]
    fn double_push_sets_en_passant_and_next_ply_clears_it() {
        let game = GameState::new_game();
        let after_e4 = apply_move(&game, &find(&game, "e2e4")).expect("legal");
        assert_eq!(after_e4.en_passant_square, Some(sq("e3")));
        assert_eq!(after_e4.halfmove_clock, 0);
        assert_eq!(after_e4.fullmove_number, 1);

        let after_nf6 = apply_move(&after_e4, &find(&after_e4, "g8f6")).expect("legal");
        assert_eq!(after_nf6.en_passant_square, None);
        assert_eq!(after_nf6.halfmove_clock, 1);
        assert_eq!(after_nf6.fullmove_number, 2);
    }

    #[test]
    fn castling_relocates_rook_and_drops_rights() {
        let game = GameState::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 3 10").expect("FEN should parse");
        let next = apply_move(&game, &find(&game, "e1g1")).expect("legal");
        assert_eq!(next.piece_at(sq("g1")), Some(Piece::new(Color::White, PieceKind::King)));
        assert_eq!(next.piece_at(sq("f1")), Some(Piece::new(Color::White, PieceKind::Rook)));
        assert_eq!(next.piece_at(sq("h1")), None);
        assert_eq!(next.castling_rights, CASTLE_BLACK_KINGSIDE | CASTLE_BLACK_QUEENSIDE);
        assert_eq!(next.halfmove_clock, 4);
    }

    #[test]
    fn capturing_a_home_rook_clears_that_right() {
        let game = GameState::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").expect("FEN should parse");
        let next = apply_move(&game, &find(&game, "a1a8")).expect("legal");
        assert_eq!(
            next.castling_rights,
            CASTLE_WHITE_KINGSIDE | CASTLE_BLACK_KINGSIDE
        );
    }

    #[test]
    fn en_passant_removes_the_passed_pawn() {
        let game = GameState::from_fen("4k3/8/8/3pP3/8/8/8/4K3 w - d6 0 2").expect("FEN should parse");
        let next = apply_move(&game, &find(&game, "e5d6")).expect("legal");
        assert_eq!(next.piece_at(sq("d5")), None);
        assert_eq!(next.piece_at(sq("d6")), Some(Piece::new(Color::White, PieceKind::Pawn)));
    }

    #[test]
    fn promotion_substitutes_the_piece() {
        let game = GameState::from_fen("7k/P7/8/8/8/8/8/K7 w - - 0 1").expect("FEN should parse");
        let next = apply_move(&game, &find(&game, "a7a8n")).expect("legal");
        assert_eq!(next.piece_at(sq("a8")), Some(Piece::new(Color::White, PieceKind::Knight)));
        assert_eq!(next.bitboard(Color::White, PieceKind::Pawn), 0);
    }

    #[test]
    fn pinned_piece_move_is_rejected() {
        let game = GameState::from_fen("4r1k1/8/8/8/8/8/4B3/4K3 w - - 0 1").expect("FEN should parse");
        let pinned = Move::new(sq("e2"), sq("d3"), PieceKind::Bishop, None, None, 0);
        assert_eq!(apply_move(&game, &pinned), Err(IllegalMove::new("e2d3")));
    }
}
