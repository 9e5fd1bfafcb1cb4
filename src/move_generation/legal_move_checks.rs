use crate::game_state::{chess_types::*, game_state::GameState};
use crate::moves::leaper_attacks::{king_attacks, knight_attacks, pawn_attacks};
use crate::moves::slider_attacks::{bishop_attacks, rook_attacks};

#[inline]
pub fn is_king_in_check(game_state: &GameState, color: Color) -> bool {
    let Some(king_sq) = game_state.king_square(color) else {
        return false;
    };
    is_square_attacked(game_state, king_sq, color.opposite())
}

/// Whether any `attacker_color` piece attacks `square` on the current occupancy.
pub fn is_square_attacked(game_state: &GameState, square: Square, attacker_color: Color) -> bool {
    attackers_bitboard(game_state, square, attacker_color, game_state.occupancy_all) != 0
}

/// All `attacker_color` pieces attacking `square`, in square order.
pub fn attackers_to_square(
    game_state: &GameState,
    square: Square,
    attacker_color: Color,
) -> Vec<(Square, PieceKind)> {
    let mut attackers = Vec::new();
    let mut bb = attackers_bitboard(game_state, square, attacker_color, game_state.occupancy_all);
    while bb != 0 {
        let from = bb.trailing_zeros() as Square;
        if let Some(piece) = game_state.piece_at(from) {
            attackers.push((from, piece.kind));
        }
        bb &= bb - 1;
    }
    attackers
}

/// Number of enemy pieces giving check to `color`'s king.
pub fn checker_count(game_state: &GameState, color: Color) -> usize {
    let Some(king_sq) = game_state.king_square(color) else {
        return 0;
    };
    attackers_bitboard(game_state, king_sq, color.opposite(), game_state.occupancy_all).count_ones()
        as usize
}

fn attackers_bitboard(
    game_state: &GameState,
    square: Square,
    attacker_color: Color,
    occupancy: u64,
) -> u64 {
    let pawns = game_state.bitboard(attacker_color, PieceKind::Pawn);
    let knights = game_state.bitboard(attacker_color, PieceKind::Knight);
    let kings = game_state.bitboard(attacker_color, PieceKind::King);
    let queens = game_state.bitboard(attacker_color, PieceKind::Queen);
    let diagonal = game_state.bitboard(attacker_color, PieceKind::Bishop) | queens;
    let orthogonal = game_state.bitboard(attacker_color, PieceKind::Rook) | queens;

    // A pawn of the attacking color attacks `square` exactly when a pawn of the
    // defending color on `square` would attack the pawn's square.
    (pawn_attacks(attacker_color.opposite(), square) & pawns)
        | (knight_attacks(square) & knights)
        | (king_attacks(square) & kings)
        | (bishop_attacks(square, occupancy) & diagonal)
        | (rook_attacks(square, occupancy) & orthogonal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::algebraic::parse_square;

    fn sq(name: &str) -> Square {
        parse_square(name).expect("valid square")
    }

    #[test]
    fn start_position_has_no_checks() {
        let game = GameState::new_game();
        assert!(!is_king_in_check(&game, Color::White));
        assert!(!is_king_in_check(&game, Color::Black));
        assert!(is_square_attacked(&game, sq("f3"), Color::White));
        assert!(!is_square_attacked(&game, sq("e4"), Color::White));
    }

    #[test]
    fn double_check_lists_both_checkers() {
        let game = GameState::from_fen("4k3/8/5N2/8/8/8/8/4R1K1 b - - 0 1").expect("FEN should parse");
        assert_eq!(checker_count(&game, Color::Black), 2);
        let attackers = attackers_to_square(&game, sq("e8"), Color::White);
        assert_eq!(
            attackers,
            vec![(sq("e1"), PieceKind::Rook), (sq("f6"), PieceKind::Knight)]
        );
    }

    #[test]
    fn pawn_checks_only_diagonally_forward() {
        let game = GameState::from_fen("8/8/8/3k4/4P3/8/8/4K3 b - - 0 1").expect("FEN should parse");
        assert!(is_king_in_check(&game, Color::Black));
        let game = GameState::from_fen("8/8/8/4P3/3k4/8/8/4K3 b - - 0 1").expect("FEN should parse");
        assert!(!is_king_in_check(&game, Color::Black));
    }
}
