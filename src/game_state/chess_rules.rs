//! Canonical chess-rule constants.
//!
//! Static rule literals shared by board setup, move generation and draw
//! detection.

use crate::game_state::chess_types::{
    square_at, CastlingRights, Color, Square, CASTLE_BLACK_KINGSIDE, CASTLE_BLACK_QUEENSIDE,
    CASTLE_WHITE_KINGSIDE, CASTLE_WHITE_QUEENSIDE,
};

/// Standard chess starting position in Forsyth-Edwards Notation (FEN).
pub const STARTING_POSITION_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Half-move clock value at which the fifty-move rule draws the game.
pub const FIFTY_MOVE_HALFMOVES: u16 = 100;

/// Occurrences of the same position that draw by repetition.
pub const REPETITION_DRAW_COUNT: usize = 3;

/// More simultaneous checkers than this cannot arise from a legal game.
pub const MAX_CHECKERS: usize = 2;

/// Squares a castling move touches, for one color and one wing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CastlingPath {
    pub right: CastlingRights,
    pub king_from: Square,
    pub king_to: Square,
    pub rook_from: Square,
    pub rook_to: Square,
    /// Squares that must be empty.
    pub clear: &'static [Square],
    /// Squares the king crosses or lands on; none may be attacked.
    pub king_walk: &'static [Square],
}

pub const WHITE_KINGSIDE: CastlingPath = CastlingPath {
    right: CASTLE_WHITE_KINGSIDE,
    king_from: square_at(4, 0),
    king_to: square_at(6, 0),
    rook_from: square_at(7, 0),
    rook_to: square_at(5, 0),
    clear: &[square_at(5, 0), square_at(6, 0)],
    king_walk: &[square_at(5, 0), square_at(6, 0)],
};

pub const WHITE_QUEENSIDE: CastlingPath = CastlingPath {
    right: CASTLE_WHITE_QUEENSIDE,
    king_from: square_at(4, 0),
    king_to: square_at(2, 0),
    rook_from: square_at(0, 0),
    rook_to: square_at(3, 0),
    clear: &[square_at(1, 0), square_at(2, 0), square_at(3, 0)],
    king_walk: &[square_at(3, 0), square_at(2, 0)],
};

pub const BLACK_KINGSIDE: CastlingPath = CastlingPath {
    right: CASTLE_BLACK_KINGSIDE,
    king_from: square_at(4, 7),
    king_to: square_at(6, 7),
    rook_from: square_at(7, 7),
    rook_to: square_at(5, 7),
    clear: &[square_at(5, 7), square_at(6, 7)],
    king_walk: &[square_at(5, 7), square_at(6, 7)],
};

pub const BLACK_QUEENSIDE: CastlingPath = CastlingPath {
    right: CASTLE_BLACK_QUEENSIDE,
    king_from: square_at(4, 7),
    king_to: square_at(2, 7),
    rook_from: square_at(0, 7),
    rook_to: square_at(3, 7),
    clear: &[square_at(1, 7), square_at(2, 7), square_at(3, 7)],
    king_walk: &[square_at(3, 7), square_at(2, 7)],
};

/// Every castling path, used to clear rights when a rook leaves or is taken on its home square.
pub const ALL_CASTLING_PATHS: [CastlingPath; 4] =
    [WHITE_KINGSIDE, WHITE_QUEENSIDE, BLACK_KINGSIDE, BLACK_QUEENSIDE];

#[inline]
pub const fn kingside_path(color: Color) -> CastlingPath {
    match color {
        Color::White => WHITE_KINGSIDE,
        Color::Black => BLACK_KINGSIDE,
    }
}

#[inline]
pub const fn queenside_path(color: Color) -> CastlingPath {
    match color {
        Color::White => WHITE_QUEENSIDE,
        Color::Black => BLACK_QUEENSIDE,
    }
}
