//! UCI client side: the lines we send and the lines we understand.
//!
//! Only the subset needed to get a move out of an engine is modelled. Lines
//! such as `id`, `option` and `info` are passed through as [`EngineLine::Other`].

use std::fmt;

use crate::engine::engine_bridge::EngineStrength;
use crate::game_state::chess_rules::STARTING_POSITION_FEN;
use crate::game_state::game_state::GameState;
use crate::moves::chess_move::Move;

/// Search limits for `go`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GoParams {
    pub movetime_ms: Option<u64>,
    pub depth: Option<u8>,
}

impl GoParams {
    /// `go depth N` when a depth is set, otherwise `go movetime N`.
    pub fn from_strength(strength: &EngineStrength) -> Self {
        match strength.depth {
            Some(depth) => Self {
                movetime_ms: None,
                depth: Some(depth),
            },
            None => Self {
                movetime_ms: Some(strength.movetime_ms),
                depth: None,
            },
        }
    }
}

/// Commands sent to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UciCommand {
    Uci,
    SetOption { name: String, value: String },
    IsReady,
    UciNewGame,
    Position { fen: Option<String>, moves: Vec<String> },
    Go(GoParams),
    Stop,
    Quit,
}

impl UciCommand {
    pub fn set_option(name: &str, value: impl ToString) -> Self {
        UciCommand::SetOption {
            name: name.to_owned(),
            value: value.to_string(),
        }
    }

    /// `position startpos moves ...` when the game began from the standard
    /// position, `position fen ... moves ...` otherwise.
    pub fn position(start: &GameState, moves: &[Move]) -> Self {
        let fen = start.get_fen();
        UciCommand::Position {
            fen: (fen != STARTING_POSITION_FEN).then_some(fen),
            moves: moves.iter().map(Move::to_uci).collect(),
        }
    }
}

impl fmt::Display for UciCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UciCommand::Uci => f.write_str("uci"),
            UciCommand::SetOption { name, value } => write!(f, "setoption name {name} value {value}"),
            UciCommand::IsReady => f.write_str("isready"),
            UciCommand::UciNewGame => f.write_str("ucinewgame"),
            UciCommand::Position { fen, moves } => {
                match fen {
                    Some(fen) => write!(f, "position fen {fen}")?,
                    None => f.write_str("position startpos")?,
                }
                if !moves.is_empty() {
                    write!(f, " moves {}", moves.join(" "))?;
                }
                Ok(())
            }
            UciCommand::Go(params) => {
                f.write_str("go")?;
                if let Some(depth) = params.depth {
                    write!(f, " depth {depth}")?;
                }
                if let Some(movetime) = params.movetime_ms {
                    write!(f, " movetime {movetime}")?;
                }
                Ok(())
            }
            UciCommand::Stop => f.write_str("stop"),
            UciCommand::Quit => f.write_str("quit"),
        }
    }
}

/// Strength-limiting options to send before a search.
pub fn strength_options(strength: &EngineStrength) -> Vec<UciCommand> {
    let mut options = Vec::with_capacity(3);
    match strength.elo {
        Some(elo) => {
            options.push(UciCommand::set_option("UCI_LimitStrength", true));
            options.push(UciCommand::set_option("UCI_Elo", elo));
        }
        None => options.push(UciCommand::set_option("UCI_LimitStrength", false)),
    }
    if let Some(skill) = strength.skill_level {
        options.push(UciCommand::set_option("Skill Level", skill));
    }
    options
}

/// Lines received from the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineLine {
    UciOk,
    ReadyOk,
    BestMove { mv: String, ponder: Option<String> },
    /// A `bestmove` line without a move token.
    Malformed(String),
    Other(String),
}

pub fn parse_engine_line(line: &str) -> EngineLine {
    let trimmed = line.trim();
    let mut tokens = trimmed.split_whitespace();

    match tokens.next() {
        Some("uciok") => EngineLine::UciOk,
        Some("readyok") => EngineLine::ReadyOk,
        Some("bestmove") => {
            let Some(mv) = tokens.next() else {
                return EngineLine::Malformed(trimmed.to_owned());
            };
            let ponder = match (tokens.next(), tokens.next()) {
                (Some("ponder"), Some(reply)) => Some(reply.to_owned()),
                _ => None,
            };
            EngineLine::BestMove {
                mv: mv.to_owned(),
                ponder,
            }
        }
        _ => EngineLine::Other(trimmed.to_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_command_uses_startpos_when_possible() {
        let start = GameState::new_game();
        let cmd = UciCommand::position(&start, &[]);
        assert_eq!(cmd.to_string(), "position startpos");

        let custom = GameState::from_fen("4k3/8/8/8/8/8/8/4K2R w K - 0 1").expect("FEN should parse");
        let cmd = UciCommand::position(&custom, &[]);
        assert_eq!(cmd.to_string(), "position fen 4k3/8/8/8/8/8/8/4K2R w K - 0 1");
    }

    #[test]
    fn go_and_setoption_lines() {
        let strength = EngineStrength {
            elo: Some(1350),
            skill_level: Some(5),
            movetime_ms: 250,
            depth: None,
        };
        assert_eq!(UciCommand::Go(GoParams::from_strength(&strength)).to_string(), "go movetime 250");
        let lines: Vec<String> = strength_options(&strength).iter().map(ToString::to_string).collect();
        assert_eq!(
            lines,
            vec![
                "setoption name UCI_LimitStrength value true",
                "setoption name UCI_Elo value 1350",
                "setoption name Skill Level value 5",
            ]
        );

        let by_depth = EngineStrength {
            depth: Some(8),
            ..strength
        };
        assert_eq!(UciCommand::Go(GoParams::from_strength(&by_depth)).to_string(), "go depth 8");
    }

    #[test]
    fn bestmove_lines_parse_with_and_without_ponder() {
        assert_eq!(
            parse_engine_line("bestmove e2e4 ponder e7e5"),
            EngineLine::BestMove {
                mv: "e2e4".to_owned(),
                ponder: Some("e7e5".to_owned())
            }
        );
        assert_eq!(
            parse_engine_line("bestmove a7a8q\n"),
            EngineLine::BestMove {
                mv: "a7a8q".to_owned(),
                ponder: None
            }
        );
        assert_eq!(parse_engine_line("bestmove"), EngineLine::Malformed("bestmove".to_owned()));
        assert_eq!(parse_engine_line("uciok"), EngineLine::UciOk);
        assert!(matches!(parse_engine_line("info depth 3 score cp 20"), EngineLine::Other(_)));
    }
}
