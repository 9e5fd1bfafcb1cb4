//! Square name conversions (`e4` <-> index) shared by FEN, UCI and PGN code.

use crate::game_state::chess_types::{file_of, rank_of, square_at, Square};

/// Parse a square name such as `e4`.
pub fn parse_square(name: &str) -> Option<Square> {
    let bytes = name.as_bytes();
    if bytes.len() != 2 {
        return None;
    }

    let file = bytes[0].to_ascii_lowercase();
    let rank = bytes[1];
    if !(b'a'..=b'h').contains(&file) || !(b'1'..=b'8').contains(&rank) {
        return None;
    }

    Some(square_at(file - b'a', rank - b'1'))
}

/// Name of a square index. Indices above 63 are a caller bug.
pub fn square_name(square: Square) -> String {
    debug_assert!(square < 64, "square index out of bounds: {square}");
    let file_char = char::from(b'a' + file_of(square));
    let rank_char = char::from(b'1' + rank_of(square));
    format!("{file_char}{rank_char}")
}

#[cfg(test)]
mod tests {
    use super::{parse_square, square_name};

    #[test]
    fn corner_squares_convert_both_ways() {
        assert_eq!(parse_square("a1"), Some(0));
        assert_eq!(parse_square("h8"), Some(63));
        assert_eq!(square_name(0), "a1");
        assert_eq!(square_name(28), "e4");
    }

    #[test]
    fn malformed_names_are_rejected() {
        assert_eq!(parse_square("i1"), None);
        assert_eq!(parse_square("a9"), None);
        assert_eq!(parse_square("e"), None);
        assert_eq!(parse_square("e44"), None);
    }
}
