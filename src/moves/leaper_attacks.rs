//! Precomputed attack tables for pieces with fixed jump patterns.
//!
//! Knight, king and pawn attacks do not depend on occupancy, so each is a
//! `const` table indexed by square.

use crate::game_state::chess_types::{Color, Square};

const KNIGHT_JUMPS: [(i32, i32); 8] = [
    (1, 2),
    (2, 1),
    (2, -1),
    (1, -2),
    (-1, -2),
    (-2, -1),
    (-2, 1),
    (-1, 2),
];

const KING_STEPS: [(i32, i32); 8] = [
    (0, 1),
    (1, 1),
    (1, 0),
    (1, -1),
    (0, -1),
    (-1, -1),
    (-1, 0),
    (-1, 1),
];

pub const KNIGHT_ATTACKS: [u64; 64] = build_table(&KNIGHT_JUMPS);
pub const KING_ATTACKS: [u64; 64] = build_table(&KING_STEPS);
pub const WHITE_PAWN_ATTACKS: [u64; 64] = build_table(&[(-1, 1), (1, 1)]);
pub const BLACK_PAWN_ATTACKS: [u64; 64] = build_table(&[(-1, -1), (1, -1)]);

#[inline]
pub const fn knight_attacks(square: Square) -> u64 {
    KNIGHT_ATTACKS[square as usize]
}

#[inline]
pub const fn king_attacks(square: Square) -> u64 {
    KING_ATTACKS[square as usize]
}

/// Squares a pawn of `color` standing on `square` attacks.
#[inline]
pub const fn pawn_attacks(color: Color, square: Square) -> u64 {
    match color {
        Color::White => WHITE_PAWN_ATTACKS[square as usize],
        Color::Black => BLACK_PAWN_ATTACKS[square as usize],
    }
}

const fn build_table(offsets: &[(i32, i32)]) -> [u64; 64] {
    let mut table = [0u64; 64];
    let mut sq = 0usize;

    while sq < 64 {
        let file = (sq % 8) as i32;
        let rank = (sq / 8) as i32;
        let mut attacks = 0u64;
        let mut i = 0usize;

        while i < offsets.len() {
            let f = file + offsets[i].0;
            let r = rank + offsets[i].1;
            if f >= 0 && f < 8 && r >= 0 && r < 8 {
                attacks |= 1u64 << (r * 8 + f);
            }
            i += 1;
        }

        table[sq] = attacks;
        sq += 1;
    }

    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn knight_in_center_has_eight_targets_and_in_corner_two() {
        assert_eq!(knight_attacks(27).count_ones(), 8);
        assert_eq!(knight_attacks(0).count_ones(), 2);
    }

    #[test]
    fn king_on_edge_has_five_neighbours() {
        assert_eq!(king_attacks(4).count_ones(), 5);
        assert_eq!(king_attacks(0).count_ones(), 3);
    }

    #[test]
    fn pawn_attacks_point_forward_for_each_color() {
        let e2 = 12u8;
        assert_eq!(pawn_attacks(Color::White, e2), (1u64 << 19) | (1u64 << 21));
        let a7 = 48u8;
        assert_eq!(pawn_attacks(Color::Black, a7), 1u64 << 41);
    }
}
