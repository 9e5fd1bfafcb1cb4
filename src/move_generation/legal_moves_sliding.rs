//! Bishop, rook and queen pseudo-legal moves.

use crate::game_state::{chess_types::*, game_state::GameState};
use crate::move_generation::legal_move_shared::push_piece_moves;
use crate::moves::chess_move::Move;
use crate::moves::slider_attacks::{bishop_attacks, queen_attacks, rook_attacks};

pub fn generate_sliding_moves(game_state: &GameState, out: &mut Vec<Move>) {
    generate_for_kind(game_state, PieceKind::Bishop, bishop_attacks, out);
    generate_for_kind(game_state, PieceKind::Rook, rook_attacks, out);
    generate_for_kind(game_state, PieceKind::Queen, queen_attacks, out);
}

fn generate_for_kind(
    game_state: &GameState,
    kind: PieceKind,
    attacks: fn(Square, u64) -> u64,
    out: &mut Vec<Move>,
) {
    let side = game_state.side_to_move;
    let own_occ = game_state.occupancy_by_color[side.index()];

    let mut pieces = game_state.bitboard(side, kind);
    while pieces != 0 {
        let from = pieces.trailing_zeros() as Square;
        let targets = attacks(from, game_state.occupancy_all) & !own_occ;
        push_piece_moves(game_state, from, kind, targets, out);
        pieces &= pieces - 1;
    }
}

#[cfg(test)]
mod tests {
    use super::generate_sliding_moves;
    use crate::game_state::game_state::GameState;

    #[test]
    fn no_slider_moves_from_start_position() {
        let mut out = Vec::new();
        generate_sliding_moves(&GameState::new_game(), &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn lone_rook_on_open_board_has_fourteen_moves() {
        let game = GameState::from_fen("7k/8/8/8/3R4/8/8/K7 w - - 0 1").expect("FEN should parse");
        let mut out = Vec::new();
        generate_sliding_moves(&game, &mut out);
        assert_eq!(out.len(), 14);
    }
}
