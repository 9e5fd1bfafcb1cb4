use crate::game_state::chess_rules::{kingside_path, queenside_path, CastlingPath};
use crate::game_state::{chess_types::*, game_state::GameState};
use crate::move_generation::legal_move_checks::is_square_attacked;
use crate::move_generation::legal_move_shared::push_piece_moves;
use crate::moves::chess_move::{Move, MoveFlags, FLAG_CASTLE_KINGSIDE, FLAG_CASTLE_QUEENSIDE};
use crate::moves::leaper_attacks::king_attacks;

pub fn generate_king_moves(game_state: &GameState, out: &mut Vec<Move>) {
    let side = game_state.side_to_move;
    let own_occ = game_state.occupancy_by_color[side.index()];
    let Some(from) = game_state.king_square(side) else {
        return;
    };

    push_piece_moves(game_state, from, PieceKind::King, king_attacks(from) & !own_occ, out);

    // Cannot castle out of check.
    if is_square_attacked(game_state, from, side.opposite()) {
        return;
    }

    try_castle(game_state, from, kingside_path(side), FLAG_CASTLE_KINGSIDE, out);
    try_castle(game_state, from, queenside_path(side), FLAG_CASTLE_QUEENSIDE, out);
}

fn try_castle(
    game_state: &GameState,
    king_from: Square,
    path: CastlingPath,
    flag: MoveFlags,
    out: &mut Vec<Move>,
) {
    let side = game_state.side_to_move;
    if game_state.castling_rights & path.right == 0 || king_from != path.king_from {
        return;
    }
    if game_state.bitboard(side, PieceKind::Rook) & (1u64 << path.rook_from) == 0 {
        return;
    }
    if path
        .clear
        .iter()
        .any(|&sq| game_state.occupancy_all & (1u64 << sq) != 0)
    {
        return;
    }
    if path
        .king_walk
        .iter()
        .any(|&sq| is_square_attacked(game_state, sq, side.opposite()))
    {
        return;
    }

    out.push(Move::new(path.king_from, path.king_to, PieceKind::King, None, None, flag));
}

#[cfg(test)]
mod tests {
    use super::generate_king_moves;
    use crate::game_state::game_state::GameState;

    fn castles(fen: &str) -> Vec<String> {
        let game = GameState::from_fen(fen).expect("FEN should parse");
        let mut out = Vec::new();
        generate_king_moves(&game, &mut out);
        out.iter().filter(|mv| mv.is_castling()).map(|mv| mv.to_uci()).collect()
    }

    #[test]
    fn both_wings_available_on_clear_back_rank() {
        assert_eq!(castles("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1"), vec!["e1g1", "e1c1"]);
        assert_eq!(castles("r3k2r/8/8/8/8/8/8/R3K2R b KQkq - 0 1"), vec!["e8g8", "e8c8"]);
    }

    #[test]
    fn cannot_castle_through_an_attacked_square() {
        // Black rook on f8 covers f1.
        assert_eq!(castles("4kr2/8/8/8/8/8/8/R3K2R w KQ - 0 1"), vec!["e1c1"]);
    }

    #[test]
    fn cannot_castle_out_of_check() {
        assert!(castles("4r1k1/8/8/8/8/8/8/R3K2R w KQ - 0 1").is_empty());
    }

    #[test]
    fn queenside_b_file_may_be_attacked_but_not_occupied() {
        // b1 is attacked by the rook on b8; castling long is still legal.
        assert_eq!(castles("1r2k3/8/8/8/8/8/8/R3K3 w Q - 0 1"), vec!["e1c1"]);
        assert!(castles("4k3/8/8/8/8/8/8/RN2K3 w Q - 0 1").is_empty());
    }
}
