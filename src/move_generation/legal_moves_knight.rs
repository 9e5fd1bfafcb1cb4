use crate::game_state::{chess_types::*, game_state::GameState};
use crate::move_generation::legal_move_shared::push_piece_moves;
use crate::moves::chess_move::Move;
use crate::moves::leaper_attacks::knight_attacks;

pub fn generate_knight_moves(game_state: &GameState, out: &mut Vec<Move>) {
    let side = game_state.side_to_move;
    let own_occ = game_state.occupancy_by_color[side.index()];

    let mut knights = game_state.bitboard(side, PieceKind::Knight);
    while knights != 0 {
        let from = knights.trailing_zeros() as Square;
        push_piece_moves(
            game_state,
            from,
            PieceKind::Knight,
            knight_attacks(from) & !own_occ,
            out,
        );
        knights &= knights - 1;
    }
}
