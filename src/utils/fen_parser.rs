//! FEN-to-GameState parser.
//!
//! Builds fully-populated state from a Forsyth-Edwards Notation string,
//! including piece bitboards, rights, clocks and occupancies. Positions
//! without exactly one king per color are rejected, as are positions no legal
//! game can reach: the side not to move in check, or more than two checkers.

use thiserror::Error;

use crate::game_state::chess_rules::MAX_CHECKERS;
use crate::game_state::{chess_types::*, game_state::GameState};
use crate::move_generation::legal_move_checks::{checker_count, is_king_in_check};
use crate::utils::algebraic::parse_square;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FenError {
    #[error("FEN is missing the {0} field")]
    MissingField(&'static str),
    #[error("FEN has extra trailing fields")]
    TrailingFields,
    #[error("board layout must contain 8 ranks, found {0}")]
    RankCount(usize),
    #[error("rank {rank} does not sum to 8 files")]
    RankWidth { rank: u8 },
    #[error("invalid piece character '{0}' in board layout")]
    PieceChar(char),
    #[error("invalid side-to-move field: {0}")]
    SideToMove(String),
    #[error("invalid castling rights character: {0}")]
    CastlingChar(char),
    #[error("invalid en-passant square: {0}")]
    EnPassant(String),
    #[error("invalid {field}: {value}")]
    Counter { field: &'static str, value: String },
    #[error("{color} must have exactly one king, found {count}")]
    KingCount { color: Color, count: u32 },
    #[error("{0} is in check but it is not their move")]
    OpponentInCheck(Color),
    #[error("{color} is attacked by {count} pieces")]
    TooManyCheckers { color: Color, count: usize },
}

pub fn parse_fen(fen: &str) -> Result<GameState, FenError> {
    let mut parts = fen.split_whitespace();

    let board_part = parts.next().ok_or(FenError::MissingField("board layout"))?;
    let side_part = parts.next().ok_or(FenError::MissingField("side-to-move"))?;
    let castling_part = parts.next().ok_or(FenError::MissingField("castling rights"))?;
    let en_passant_part = parts.next().ok_or(FenError::MissingField("en-passant square"))?;
    let halfmove_part = parts.next().ok_or(FenError::MissingField("halfmove clock"))?;
    let fullmove_part = parts.next().ok_or(FenError::MissingField("fullmove number"))?;

    if parts.next().is_some() {
        return Err(FenError::TrailingFields);
    }

    let mut game_state = GameState::new_empty();

    parse_board(board_part, &mut game_state)?;
    game_state.side_to_move = parse_side_to_move(side_part)?;
    game_state.castling_rights = parse_castling_rights(castling_part)?;
    game_state.en_passant_square = parse_en_passant_square(en_passant_part)?;
    game_state.halfmove_clock = parse_counter("halfmove clock", halfmove_part)?;
    game_state.fullmove_number = parse_counter("fullmove number", fullmove_part)?.max(1);

    for color in Color::ALL {
        let count = game_state.bitboard(color, PieceKind::King).count_ones();
        if count != 1 {
            return Err(FenError::KingCount { color, count });
        }
    }

    game_state.recalc_occupancy();

    let side = game_state.side_to_move;
    if is_king_in_check(&game_state, side.opposite()) {
        return Err(FenError::OpponentInCheck(side.opposite()));
    }
    let count = checker_count(&game_state, side);
    if count > MAX_CHECKERS {
        return Err(FenError::TooManyCheckers { color: side, count });
    }

    Ok(game_state)
}

fn parse_board(board_part: &str, game_state: &mut GameState) -> Result<(), FenError> {
    let ranks: Vec<&str> = board_part.split('/').collect();
    if ranks.len() != 8 {
        return Err(FenError::RankCount(ranks.len()));
    }

    for (fen_rank_idx, rank_str) in ranks.iter().enumerate() {
        let board_rank = 7 - fen_rank_idx as u8;
        let mut file = 0u8;

        for ch in rank_str.chars() {
            if let Some(empty_count) = ch.to_digit(10) {
                if !(1..=8).contains(&empty_count) {
                    return Err(FenError::PieceChar(ch));
                }
                file += empty_count as u8;
                if file > 8 {
                    return Err(FenError::RankWidth { rank: board_rank + 1 });
                }
                continue;
            }

            let piece = Piece::from_fen_char(ch).ok_or(FenError::PieceChar(ch))?;
            if file >= 8 {
                return Err(FenError::RankWidth { rank: board_rank + 1 });
            }

            // Later pieces on the same square cannot happen: `file` only grows.
            game_state.put_piece(square_at(file, board_rank), piece);
            file += 1;
        }

        if file != 8 {
            return Err(FenError::RankWidth { rank: board_rank + 1 });
        }
    }

    Ok(())
}

fn parse_side_to_move(side_part: &str) -> Result<Color, FenError> {
    match side_part {
        "w" => Ok(Color::White),
        "b" => Ok(Color::Black),
        _ => Err(FenError::SideToMove(side_part.to_owned())),
    }
}

fn parse_castling_rights(castling_part: &str) -> Result<CastlingRights, FenError> {
    if castling_part == "-" {
        return Ok(0);
    }

    let mut rights: CastlingRights = 0;

    for ch in castling_part.chars() {
        match ch {
            'K' => rights |= CASTLE_WHITE_KINGSIDE,
            'Q' => rights |= CASTLE_WHITE_QUEENSIDE,
            'k' => rights |= CASTLE_BLACK_KINGSIDE,
            'q' => rights |= CASTLE_BLACK_QUEENSIDE,
            _ => return Err(FenError::CastlingChar(ch)),
        }
    }

    Ok(rights)
}

fn parse_en_passant_square(en_passant_part: &str) -> Result<Option<Square>, FenError> {
    if en_passant_part == "-" {
        return Ok(None);
    }

    let square = parse_square(en_passant_part)
        .ok_or_else(|| FenError::EnPassant(en_passant_part.to_owned()))?;
    if !matches!(rank_of(square), 2 | 5) {
        return Err(FenError::EnPassant(en_passant_part.to_owned()));
    }
    Ok(Some(square))
}

fn parse_counter(field: &'static str, value: &str) -> Result<u16, FenError> {
    value.parse::<u16>().map_err(|_| FenError::Counter {
        field,
        value: value.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::{parse_fen, FenError};
    use crate::game_state::chess_rules::STARTING_POSITION_FEN;
    use crate::game_state::chess_types::{Color, CASTLE_ALL};

    #[test]
    fn parse_starting_fen() {
        let game_state = parse_fen(STARTING_POSITION_FEN).expect("starting FEN should parse");

        assert_eq!(game_state.side_to_move, Color::White);
        assert_eq!(game_state.castling_rights, CASTLE_ALL);
        assert_eq!(game_state.fullmove_number, 1);
        assert_eq!(game_state.halfmove_clock, 0);
        assert_eq!(game_state.occupancy_all.count_ones(), 32);
    }

    #[test]
    fn en_passant_field_is_read() {
        let game_state =
            parse_fen("rnbqkbnr/pppp1ppp/8/8/4pP2/8/PPPPP1PP/RNBQKBNR b KQkq f3 0 3").expect("FEN should parse");
        assert_eq!(game_state.en_passant_square, Some(21));
    }

    #[test]
    fn king_count_is_enforced() {
        assert_eq!(
            parse_fen("8/8/8/8/8/8/8/K7 w - - 0 1"),
            Err(FenError::KingCount {
                color: Color::Black,
                count: 0
            })
        );
        assert!(matches!(
            parse_fen("kk6/8/8/8/8/8/8/K7 w - - 0 1"),
            Err(FenError::KingCount { count: 2, .. })
        ));
    }

    #[test]
    fn unreachable_check_states_are_rejected() {
        assert_eq!(
            parse_fen("4k3/8/8/8/8/8/8/4RK2 w - - 0 1"),
            Err(FenError::OpponentInCheck(Color::Black))
        );
        assert_eq!(
            parse_fen("4k3/8/8/8/8/3n4/3p4/4K2r w - - 0 1"),
            Err(FenError::TooManyCheckers {
                color: Color::White,
                count: 3
            })
        );
        // Double check is reachable.
        assert!(parse_fen("4k3/8/8/8/8/3n4/8/4K2r w - - 0 1").is_ok());
        assert!(parse_fen("4k3/8/8/8/8/8/8/4RK2 b - - 0 1").is_ok());
    }

    #[test]
    fn malformed_fields_are_rejected() {
        assert_eq!(
            parse_fen("8/8/8/8/8/8/8/K6k w - -"),
            Err(FenError::MissingField("halfmove clock"))
        );
        assert!(matches!(
            parse_fen("8/8/8/8/8/8/8/K6k x - - 0 1"),
            Err(FenError::SideToMove(_))
        ));
        assert!(matches!(
            parse_fen("8/8/8/8/8/8/8/K5k w - - 0 1"),
            Err(FenError::RankWidth { rank: 1 })
        ));
        assert_eq!(
            parse_fen("8/8/8/8/8/8/8/K6k w - - 0 1 extra"),
            Err(FenError::TrailingFields)
        );
    }
}
