//! Session lifecycle states and how finished matches ended.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::game_state::chess_types::Color;
use crate::move_generation::game_status::GameStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForfeitReason {
    Disconnect,
    Timeout,
    EngineFailure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WinReason {
    Checkmate,
    Resignation,
    Forfeit(ForfeitReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawReason {
    Stalemate,
    FiftyMove,
    Repetition,
    InsufficientMaterial,
    Agreement,
}

/// Result of a completed match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Outcome {
    Win { winner: Color, reason: WinReason },
    Draw { reason: DrawReason },
}

impl Outcome {
    /// Outcome implied by a terminal board classification.
    #[must_use]
    pub const fn from_status(status: GameStatus) -> Option<Self> {
        let reason = match status {
            GameStatus::Normal | GameStatus::Check => return None,
            GameStatus::Checkmate { winner } => {
                return Some(Outcome::Win {
                    winner,
                    reason: WinReason::Checkmate,
                })
            }
            GameStatus::Stalemate => DrawReason::Stalemate,
            GameStatus::DrawByFiftyMove => DrawReason::FiftyMove,
            GameStatus::DrawByRepetition => DrawReason::Repetition,
            GameStatus::DrawByInsufficientMaterial => DrawReason::InsufficientMaterial,
        };
        Some(Outcome::Draw { reason })
    }

    #[must_use]
    pub const fn winner(&self) -> Option<Color> {
        match self {
            Outcome::Win { winner, .. } => Some(*winner),
            Outcome::Draw { .. } => None,
        }
    }

    /// PGN result token.
    #[must_use]
    pub const fn pgn_result(&self) -> &'static str {
        match self {
            Outcome::Win {
                winner: Color::White,
                ..
            } => "1-0",
            Outcome::Win {
                winner: Color::Black,
                ..
            } => "0-1",
            Outcome::Draw { .. } => "1/2-1/2",
        }
    }

    /// Value for the PGN `Termination` tag.
    #[must_use]
    pub const fn termination(&self) -> &'static str {
        match self {
            Outcome::Win { reason, .. } => match reason {
                WinReason::Checkmate | WinReason::Resignation => "normal",
                WinReason::Forfeit(ForfeitReason::Timeout) => "time forfeit",
                WinReason::Forfeit(ForfeitReason::Disconnect) => "abandoned",
                WinReason::Forfeit(ForfeitReason::EngineFailure) => "emergency",
            },
            Outcome::Draw { .. } => "normal",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Win { winner, reason } => {
                let how = match reason {
                    WinReason::Checkmate => "by checkmate",
                    WinReason::Resignation => "by resignation",
                    WinReason::Forfeit(ForfeitReason::Disconnect) => "by forfeit (disconnect)",
                    WinReason::Forfeit(ForfeitReason::Timeout) => "on time",
                    WinReason::Forfeit(ForfeitReason::EngineFailure) => "by forfeit (engine failure)",
                };
                write!(f, "{winner} wins {how}")
            }
            Outcome::Draw { reason } => {
                let why = match reason {
                    DrawReason::Stalemate => "stalemate",
                    DrawReason::FiftyMove => "fifty-move rule",
                    DrawReason::Repetition => "threefold repetition",
                    DrawReason::InsufficientMaterial => "insufficient material",
                    DrawReason::Agreement => "agreement",
                };
                write!(f, "draw by {why}")
            }
        }
    }
}

/// Why a match ended without being played out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    Declined,
    Expired,
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionStatus {
    AwaitingAcceptance,
    Active,
    Completed { outcome: Outcome },
    Aborted { reason: AbortReason },
}

impl SessionStatus {
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed { .. } | SessionStatus::Aborted { .. })
    }

    #[must_use]
    pub const fn outcome(&self) -> Option<Outcome> {
        match self {
            SessionStatus::Completed { outcome } => Some(*outcome),
            _ => None,
        }
    }
}
