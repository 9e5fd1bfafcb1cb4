//! Move value type.
//!
//! A `Move` records everything apply-move needs (moved piece, captured piece,
//! promotion, special-move flags), so it is only meaningful relative to the
//! board it was generated from.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::game_state::chess_types::{PieceKind, Square};
use crate::utils::algebraic::square_name;

pub type MoveFlags = u8;

pub const FLAG_CAPTURE: MoveFlags = 1 << 0;
pub const FLAG_EN_PASSANT: MoveFlags = 1 << 1;
pub const FLAG_CASTLE_KINGSIDE: MoveFlags = 1 << 2;
pub const FLAG_CASTLE_QUEENSIDE: MoveFlags = 1 << 3;
pub const FLAG_DOUBLE_PAWN_PUSH: MoveFlags = 1 << 4;

pub const FLAG_CASTLING: MoveFlags = FLAG_CASTLE_KINGSIDE | FLAG_CASTLE_QUEENSIDE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Move {
    pub from: Square,
    pub to: Square,
    pub piece: PieceKind,
    pub captured: Option<PieceKind>,
    pub promotion: Option<PieceKind>,
    pub flags: MoveFlags,
}

impl Move {
    #[inline]
    pub const fn new(
        from: Square,
        to: Square,
        piece: PieceKind,
        captured: Option<PieceKind>,
        promotion: Option<PieceKind>,
        flags: MoveFlags,
    ) -> Self {
        Self {
            from,
            to,
            piece,
            captured,
            promotion,
            flags,
        }
    }

    #[inline]
    pub const fn is_capture(&self) -> bool {
        self.flags & FLAG_CAPTURE != 0
    }

    #[inline]
    pub const fn is_en_passant(&self) -> bool {
        self.flags & FLAG_EN_PASSANT != 0
    }

    #[inline]
    pub const fn is_castling(&self) -> bool {
        self.flags & FLAG_CASTLING != 0
    }

    #[inline]
    pub const fn is_kingside_castle(&self) -> bool {
        self.flags & FLAG_CASTLE_KINGSIDE != 0
    }

    #[inline]
    pub const fn is_double_pawn_push(&self) -> bool {
        self.flags & FLAG_DOUBLE_PAWN_PUSH != 0
    }

    /// Resets the fifty-move counter.
    #[inline]
    pub fn is_irreversible(&self) -> bool {
        self.is_capture() || self.piece == PieceKind::Pawn
    }

    /// True when this move has the given coordinates, as typed by a player or
    /// sent by an engine.
    #[inline]
    pub fn matches_coordinates(&self, from: Square, to: Square, promotion: Option<PieceKind>) -> bool {
        self.from == from && self.to == to && self.promotion == promotion
    }

    /// Long algebraic (UCI) form, e.g. `e2e4`, `e7e8q`, `e1g1`.
    pub fn to_uci(&self) -> String {
        let mut out = String::with_capacity(5);
        out.push_str(&square_name(self.from));
        out.push_str(&square_name(self.to));
        if let Some(promo) = self.promotion {
            out.push(promo.to_char());
        }
        out
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_uci())
    }
}
