//! PGN export of match snapshots, and import of long-algebraic PGN.
//!
//! Movetext is written in the coordinate notation the rest of the crate uses
//! (`1. e2e4 e7e5 2. g1f3 *`), which is also what [`read_pgn`] accepts.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::errors::MatchResult;
use crate::game_state::chess_types::Color;
use crate::game_state::chess_rules::STARTING_POSITION_FEN;
use crate::game_state::game_state::GameState;
use crate::move_generation::legal_move_apply::apply_move;
use crate::moves::chess_move::Move;
use crate::session::outcome::SessionStatus;
use crate::session::snapshot::SessionSnapshot;
use crate::utils::fen_parser::FenError;
use crate::utils::long_algebraic::{find_legal_move, parse_coordinate_move};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PgnError {
    #[error("invalid PGN header line: {0}")]
    Header(String),
    #[error("PGN SetUp=1 is present but the FEN header is missing")]
    MissingFen,
    #[error(transparent)]
    Fen(#[from] FenError),
    #[error("move {ply} `{token}` is not legal")]
    Move { ply: usize, token: String },
}

/// Tag values the snapshot does not know about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PgnInfo {
    pub event: String,
    pub site: String,
    pub round: String,
    /// Display names; participants are described generically when unset.
    pub white: Option<String>,
    pub black: Option<String>,
}

impl Default for PgnInfo {
    fn default() -> Self {
        Self {
            event: "Plum Arbiter Match".to_owned(),
            site: "Local".to_owned(),
            round: "-".to_owned(),
            white: None,
            black: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PgnGame {
    pub headers: BTreeMap<String, String>,
    pub initial_state: GameState,
    pub moves: Vec<Move>,
    pub final_state: GameState,
    pub result: String,
}

/// Render a snapshot as PGN. Fails only if its moves do not replay.
pub fn write_pgn(snapshot: &SessionSnapshot, info: &PgnInfo) -> MatchResult<String> {
    let replay = snapshot.replay()?;
    let outcome = snapshot.status.outcome();

    let mut headers = BTreeMap::<String, String>::new();
    headers.insert("Event".to_owned(), info.event.clone());
    headers.insert("Site".to_owned(), info.site.clone());
    headers.insert("Date".to_owned(), snapshot.created_at.format("%Y.%m.%d").to_string());
    headers.insert("Time".to_owned(), snapshot.created_at.format("%H:%M:%S").to_string());
    headers.insert("Round".to_owned(), info.round.clone());
    headers.insert(
        "White".to_owned(),
        info.white.clone().unwrap_or_else(|| snapshot.seats.white.to_string()),
    );
    headers.insert(
        "Black".to_owned(),
        info.black.clone().unwrap_or_else(|| snapshot.seats.black.to_string()),
    );
    headers.insert(
        "Result".to_owned(),
        outcome.map_or("*", |outcome| outcome.pgn_result()).to_owned(),
    );
    let termination = match snapshot.status {
        SessionStatus::Completed { outcome } => outcome.termination(),
        SessionStatus::Aborted { .. } => "abandoned",
        SessionStatus::AwaitingAcceptance | SessionStatus::Active => "unterminated",
    };
    headers.insert("Termination".to_owned(), termination.to_owned());
    if let Some(control) = snapshot.time_control {
        headers.insert(
            "TimeControl".to_owned(),
            format!("{}+{}", control.time.as_secs(), control.increment.as_secs()),
        );
    }
    if snapshot.start_fen != STARTING_POSITION_FEN {
        headers.insert("SetUp".to_owned(), "1".to_owned());
        headers.insert("FEN".to_owned(), snapshot.start_fen.clone());
    }

    Ok(write_pgn_with_headers(&replay.history[0], &replay.moves, &headers))
}

pub fn write_pgn_with_headers(
    initial_state: &GameState,
    moves: &[Move],
    headers: &BTreeMap<String, String>,
) -> String {
    let mut out = String::new();

    for (key, value) in headers {
        out.push_str(&format!("[{} \"{}\"]\n", key, escape_pgn_value(value)));
    }
    out.push('\n');

    // Black to move in the start position begins with `N...`.
    let black_first = initial_state.side_to_move == Color::Black;
    let first_number = usize::from(initial_state.fullmove_number);
    let mut movetext_parts = Vec::<String>::with_capacity(moves.len() + 1);
    for (index, mv) in moves.iter().enumerate() {
        let ply = index + usize::from(black_first);
        let number = first_number + ply / 2;
        if ply % 2 == 0 {
            movetext_parts.push(format!("{number}. {}", mv.to_uci()));
        } else if index == 0 {
            movetext_parts.push(format!("{number}... {}", mv.to_uci()));
        } else {
            movetext_parts.push(mv.to_uci());
        }
    }

    let result = headers.get("Result").map_or("*", |x| normalize_result(x));
    movetext_parts.push(result.to_owned());
    out.push_str(&movetext_parts.join(" "));
    out.push('\n');

    out
}

pub fn read_pgn(pgn: &str) -> Result<PgnGame, PgnError> {
    let mut headers = BTreeMap::<String, String>::new();
    let mut movetext_lines = Vec::<String>::new();

    for line in pgn.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.starts_with('[') {
            let (k, v) = parse_header_line(trimmed)?;
            headers.insert(k, v);
        } else {
            movetext_lines.push(trimmed.to_owned());
        }
    }

    let initial_state = if headers.get("SetUp").map(String::as_str) == Some("1") {
        let fen = headers.get("FEN").ok_or(PgnError::MissingFen)?;
        GameState::from_fen(fen)?
    } else {
        GameState::new_game()
    };

    let mut state = initial_state.clone();
    let mut moves = Vec::<Move>::new();
    let mut result = "*".to_owned();

    let movetext = strip_pgn_comments_and_variations(&movetext_lines.join(" "));
    for token in movetext.split_whitespace() {
        let token = strip_move_number(token);
        if token.is_empty() {
            continue;
        }

        let cleaned = trim_annotation_suffix(token);
        if is_result_token(cleaned) {
            result = normalize_result(cleaned).to_owned();
            break;
        }

        let illegal = || PgnError::Move {
            ply: moves.len() + 1,
            token: cleaned.to_owned(),
        };
        let mv = parse_coordinate_move(cleaned)
            .and_then(|coords| find_legal_move(&state, coords))
            .ok_or_else(illegal)?;
        state = apply_move(&state, &mv).map_err(|_| illegal())?;
        moves.push(mv);
    }

    if let Some(header_result) = headers.get("Result") {
        result = normalize_result(header_result).to_owned();
    }

    Ok(PgnGame {
        headers,
        initial_state,
        moves,
        final_state: state,
        result,
    })
}

fn parse_header_line(line: &str) -> Result<(String, String), PgnError> {
    let bad = || PgnError::Header(line.to_owned());
    let inner = line.strip_prefix('[').and_then(|rest| rest.strip_suffix(']')).ok_or_else(bad)?;
    let (key, value_raw) = inner.split_once(' ').ok_or_else(bad)?;
    let value = value_raw
        .trim()
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .ok_or_else(bad)?;
    Ok((key.trim().to_owned(), value.replace("\\\"", "\"")))
}

fn strip_pgn_comments_and_variations(text: &str) -> String {
    let mut out = String::new();
    let mut brace_depth = 0usize;
    let mut paren_depth = 0usize;

    for ch in text.chars() {
        match ch {
            '{' => brace_depth = brace_depth.saturating_add(1),
            '}' => brace_depth = brace_depth.saturating_sub(1),
            '(' => paren_depth = paren_depth.saturating_add(1),
            ')' => paren_depth = paren_depth.saturating_sub(1),
            _ if brace_depth == 0 && paren_depth == 0 => out.push(ch),
            _ => {}
        }
    }

    out
}

/// Drop a leading `12.` or `12...`; whatever follows may be a move.
fn strip_move_number(token: &str) -> &str {
    let digits = token.chars().take_while(char::is_ascii_digit).count();
    if digits == 0 || !token[digits..].starts_with('.') {
        return token;
    }
    token[digits..].trim_start_matches('.')
}

fn trim_annotation_suffix(token: &str) -> &str {
    token.trim_end_matches(|c: char| matches!(c, '+' | '#' | '!' | '?'))
}

fn is_result_token(token: &str) -> bool {
    matches!(token, "1-0" | "0-1" | "1/2-1/2" | "*")
}

fn normalize_result(result: &str) -> &str {
    if is_result_token(result) {
        result
    } else {
        "*"
    }
}

fn escape_pgn_value(value: &str) -> String {
    value.replace('"', "\\\"")
}
