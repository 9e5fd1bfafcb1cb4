use crate::game_state::{chess_types::*, game_state::GameState};
use crate::moves::chess_move::{Move, FLAG_CAPTURE};

#[inline]
pub fn piece_on_square_for_color(
    game_state: &GameState,
    color: Color,
    square: Square,
) -> Option<PieceKind> {
    let mask = 1u64 << square;
    PieceKind::ALL
        .into_iter()
        .find(|piece| (game_state.pieces[color.index()][piece.index()] & mask) != 0)
}

#[inline]
pub fn enemy_piece_on(game_state: &GameState, square: Square) -> Option<PieceKind> {
    piece_on_square_for_color(game_state, game_state.side_to_move.opposite(), square)
}

/// Push one move per set bit of `targets`, flagging captures of enemy pieces.
/// `targets` must already exclude the mover's own pieces.
pub fn push_piece_moves(
    game_state: &GameState,
    from: Square,
    piece: PieceKind,
    mut targets: u64,
    out: &mut Vec<Move>,
) {
    while targets != 0 {
        let to = targets.trailing_zeros() as Square;
        let captured = enemy_piece_on(game_state, to);
        let flags = if captured.is_some() { FLAG_CAPTURE } else { 0 };
        out.push(Move::new(from, to, piece, captured, None, flags));
        targets &= targets - 1;
    }
}
