use crate::game_state::{chess_types::*, game_state::GameState};
use crate::move_generation::legal_move_shared::enemy_piece_on;
use crate::moves::chess_move::{Move, FLAG_CAPTURE, FLAG_DOUBLE_PAWN_PUSH, FLAG_EN_PASSANT};
use crate::moves::leaper_attacks::pawn_attacks;

pub fn generate_pawn_moves(game_state: &GameState, out: &mut Vec<Move>) {
    let side = game_state.side_to_move;
    let enemy_occ = game_state.occupancy_by_color[side.opposite().index()];
    let empty = !game_state.occupancy_all;
    let push = side.pawn_push_offset();
    let ep_mask = en_passant_target(game_state).map_or(0, |sq| 1u64 << sq);

    let mut pawns = game_state.bitboard(side, PieceKind::Pawn);
    while pawns != 0 {
        let from = pawns.trailing_zeros() as Square;
        pawns &= pawns - 1;

        // A pawn on its promotion rank cannot exist in a legal position.
        if rank_of(from) == side.promotion_rank() {
            continue;
        }

        let to = from.wrapping_add_signed(push);
        if (1u64 << to) & empty != 0 {
            push_pawn_move(side, from, to, None, 0, out);

            if rank_of(from) == side.pawn_start_rank() {
                let two_step = to.wrapping_add_signed(push);
                if (1u64 << two_step) & empty != 0 {
                    out.push(Move::new(
                        from,
                        two_step,
                        PieceKind::Pawn,
                        None,
                        None,
                        FLAG_DOUBLE_PAWN_PUSH,
                    ));
                }
            }
        }

        let attacks = pawn_attacks(side, from);

        let mut captures = attacks & enemy_occ;
        while captures != 0 {
            let to = captures.trailing_zeros() as Square;
            push_pawn_move(side, from, to, enemy_piece_on(game_state, to), FLAG_CAPTURE, out);
            captures &= captures - 1;
        }

        if attacks & ep_mask != 0 {
            out.push(Move::new(
                from,
                ep_mask.trailing_zeros() as Square,
                PieceKind::Pawn,
                Some(PieceKind::Pawn),
                None,
                FLAG_CAPTURE | FLAG_EN_PASSANT,
            ));
        }
    }
}

/// The en-passant target if it is well formed for the side to move: on the
/// sixth rank from the mover's view, empty, with the enemy pawn that just
/// double-pushed standing in front of it.
pub fn en_passant_target(game_state: &GameState) -> Option<Square> {
    let target = game_state.en_passant_square?;
    let side = game_state.side_to_move;
    let expected_rank = match side {
        Color::White => 5,
        Color::Black => 2,
    };
    if rank_of(target) != expected_rank || game_state.occupancy_all & (1u64 << target) != 0 {
        return None;
    }

    let pushed_pawn = target.wrapping_add_signed(-side.pawn_push_offset());
    if game_state.bitboard(side.opposite(), PieceKind::Pawn) & (1u64 << pushed_pawn) == 0 {
        return None;
    }
    Some(target)
}

fn push_pawn_move(
    side: Color,
    from: Square,
    to: Square,
    captured: Option<PieceKind>,
    flags: u8,
    out: &mut Vec<Move>,
) {
    if rank_of(to) == side.promotion_rank() {
        for promo in PieceKind::PROMOTIONS {
            out.push(Move::new(from, to, PieceKind::Pawn, captured, Some(promo), flags));
        }
    } else {
        out.push(Move::new(from, to, PieceKind::Pawn, captured, None, flags));
    }
}

#[cfg(test)]
mod tests {
    use super::{en_passant_target, generate_pawn_moves};
    use crate::game_state::game_state::GameState;

    #[test]
    fn start_position_has_sixteen_pawn_moves() {
        let mut out = Vec::new();
        generate_pawn_moves(&GameState::new_game(), &mut out);
        assert_eq!(out.len(), 16);
        assert_eq!(out.iter().filter(|mv| mv.is_double_pawn_push()).count(), 8);
    }

    #[test]
    fn promotion_push_expands_to_four_kinds() {
        let game = GameState::from_fen("7k/P7/8/8/8/8/8/K7 w - - 0 1").expect("FEN should parse");
        let mut out = Vec::new();
        generate_pawn_moves(&game, &mut out);
        assert_eq!(out.len(), 4);
        assert!(out.iter().all(|mv| mv.promotion.is_some()));
    }

    #[test]
    fn stale_en_passant_field_is_ignored() {
        // d6 is named but no black pawn stands on d5.
        let game = GameState::from_fen("4k3/8/8/4P3/8/8/8/4K3 w - d6 0 1").expect("FEN should parse");
        assert_eq!(en_passant_target(&game), None);
        let mut out = Vec::new();
        generate_pawn_moves(&game, &mut out);
        assert!(out.iter().all(|mv| !mv.is_en_passant()));
    }
}
