//! Immutable-per-ply board representation.
//!
//! `GameState` stores one bitboard per color and piece kind, occupancy caches,
//! side to move, castling rights, the en-passant target and the ply counters.
//! Move application never mutates a state in place: it clones and returns the
//! successor, so match history is a plain `Vec<GameState>`.

use crate::game_state::chess_rules::STARTING_POSITION_FEN;
use crate::game_state::chess_types::*;
use crate::utils::fen_generator::generate_fen;
use crate::utils::fen_parser::{parse_fen, FenError};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GameState {
    // [color][piece_kind]
    pub pieces: [[u64; 6]; 2],

    pub occupancy_by_color: [u64; 2],
    pub occupancy_all: u64,

    pub side_to_move: Color,
    pub castling_rights: CastlingRights,
    pub en_passant_square: Option<Square>,

    pub halfmove_clock: u16,
    pub fullmove_number: u16,
}

impl Default for GameState {
    fn default() -> Self {
        Self {
            pieces: [[0; 6]; 2],
            occupancy_by_color: [0; 2],
            occupancy_all: 0,

            side_to_move: Color::White,
            castling_rights: 0,
            en_passant_square: None,

            halfmove_clock: 0,
            fullmove_number: 1,
        }
    }
}

impl GameState {
    /// Board with no pieces; only useful as a builder base.
    #[inline]
    pub fn new_empty() -> Self {
        Self::default()
    }

    /// Standard starting position.
    pub fn new_game() -> Self {
        let mut state = Self::new_empty();
        let back_rank = [
            PieceKind::Rook,
            PieceKind::Knight,
            PieceKind::Bishop,
            PieceKind::Queen,
            PieceKind::King,
            PieceKind::Bishop,
            PieceKind::Knight,
            PieceKind::Rook,
        ];
        for (file, kind) in back_rank.into_iter().enumerate() {
            let file = file as u8;
            state.put_piece(square_at(file, 0), Piece::new(Color::White, kind));
            state.put_piece(square_at(file, 1), Piece::new(Color::White, PieceKind::Pawn));
            state.put_piece(square_at(file, 6), Piece::new(Color::Black, PieceKind::Pawn));
            state.put_piece(square_at(file, 7), Piece::new(Color::Black, kind));
        }
        state.castling_rights = CASTLE_ALL;
        state.recalc_occupancy();
        debug_assert_eq!(generate_fen(&state), STARTING_POSITION_FEN);
        state
    }

    #[inline]
    pub fn from_fen(fen: &str) -> Result<Self, FenError> {
        parse_fen(fen)
    }

    #[inline]
    pub fn get_fen(&self) -> String {
        generate_fen(self)
    }

    /// Bitboard of `color`'s pieces of `kind`.
    #[inline]
    pub fn bitboard(&self, color: Color, kind: PieceKind) -> u64 {
        self.pieces[color.index()][kind.index()]
    }

    pub fn piece_at(&self, square: Square) -> Option<Piece> {
        let mask = 1u64 << square;
        if self.occupancy_all & mask == 0 {
            return None;
        }
        let color = if self.occupancy_by_color[Color::White.index()] & mask != 0 {
            Color::White
        } else {
            Color::Black
        };
        PieceKind::ALL
            .into_iter()
            .find(|kind| self.pieces[color.index()][kind.index()] & mask != 0)
            .map(|kind| Piece::new(color, kind))
    }

    pub fn king_square(&self, color: Color) -> Option<Square> {
        let kings = self.bitboard(color, PieceKind::King);
        if kings == 0 {
            None
        } else {
            Some(kings.trailing_zeros() as Square)
        }
    }

    /// Number of plies played since the position this state's counters started from.
    #[inline]
    pub fn ply(&self) -> u32 {
        let base = u32::from(self.fullmove_number.saturating_sub(1)) * 2;
        match self.side_to_move {
            Color::White => base,
            Color::Black => base + 1,
        }
    }

    /// Places a piece without touching the occupancy caches; callers finish with
    /// [`GameState::recalc_occupancy`].
    pub(crate) fn put_piece(&mut self, square: Square, piece: Piece) {
        self.pieces[piece.color.index()][piece.kind.index()] |= 1u64 << square;
    }

    pub(crate) fn clear_square(&mut self, square: Square) {
        let mask = !(1u64 << square);
        for color_boards in self.pieces.iter_mut() {
            for bb in color_boards.iter_mut() {
                *bb &= mask;
            }
        }
    }

    pub(crate) fn recalc_occupancy(&mut self) {
        for color in Color::ALL {
            self.occupancy_by_color[color.index()] = self.pieces[color.index()]
                .iter()
                .copied()
                .fold(0u64, |acc, bb| acc | bb);
        }
        self.occupancy_all = self.occupancy_by_color[Color::White.index()]
            | self.occupancy_by_color[Color::Black.index()];
    }
}

#[cfg(test)]
mod tests {
    use super::GameState;
    use crate::game_state::chess_rules::STARTING_POSITION_FEN;
    use crate::game_state::chess_types::{square_at, Color, Piece, PieceKind};

    #[test]
    fn new_game_matches_starting_fen() {
        let built = GameState::new_game();
        let parsed = GameState::from_fen(STARTING_POSITION_FEN).expect("starting FEN should parse");
        assert_eq!(built, parsed);
        assert_eq!(built.occupancy_all.count_ones(), 32);
    }

    #[test]
    fn piece_at_reads_both_colors() {
        let game = GameState::new_game();
        assert_eq!(
            game.piece_at(square_at(4, 0)),
            Some(Piece::new(Color::White, PieceKind::King))
        );
        assert_eq!(
            game.piece_at(square_at(3, 7)),
            Some(Piece::new(Color::Black, PieceKind::Queen))
        );
        assert_eq!(game.piece_at(square_at(4, 4)), None);
    }

    #[test]
    fn ply_counts_half_moves() {
        let game = GameState::from_fen("8/8/8/8/8/8/8/K6k b - - 0 3").expect("FEN should parse");
        assert_eq!(game.ply(), 5);
    }
}
