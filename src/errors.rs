//! Error types for the match layer and the engine bridge.
//!
//! Every user-facing failure is a value. Engine failures carry text rather
//! than `std::io::Error` so they can be cloned into match events.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::session::participant::{MatchId, PlayerId};

/// A move that is not in the position's legal move list.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("illegal move: {notation}")]
pub struct IllegalMove {
    pub notation: String,
}

impl IllegalMove {
    pub fn new(notation: impl Into<String>) -> Self {
        Self {
            notation: notation.into(),
        }
    }
}

/// Why an engine request did not produce a move.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "failure", content = "detail", rename_all = "snake_case")]
pub enum EngineFailure {
    /// The engine program could not be started.
    #[error("failed to start engine `{program}`: {message}")]
    Spawn { program: String, message: String },

    /// The subprocess closed its output or exited.
    #[error("engine process exited")]
    ProcessExited,

    /// Reading from or writing to the subprocess failed.
    #[error("engine I/O error: {0}")]
    Io(String),

    /// A line the protocol does not allow at this point.
    #[error("malformed engine response: {0}")]
    Malformed(String),

    /// `bestmove` named a move that is not legal in the position sent.
    #[error("engine suggested illegal move {0}")]
    IllegalSuggestion(String),

    /// No `bestmove` before the deadline.
    #[error("engine did not answer within {millis} ms")]
    Timeout { millis: u64 },

    /// The request was cancelled before it resolved.
    #[error("engine request cancelled")]
    Cancelled,
}

impl From<std::io::Error> for EngineFailure {
    fn from(err: std::io::Error) -> Self {
        EngineFailure::Io(err.to_string())
    }
}

/// Errors returned by match operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    /// Move is not legal in the current position.
    #[error(transparent)]
    IllegalMove(#[from] IllegalMove),

    /// A computer move is already being computed for this match.
    #[error("the engine is already thinking for this match")]
    Busy,

    /// The engine failed; the match stays active.
    #[error("engine failure: {0}")]
    Engine(#[from] EngineFailure),

    /// Operation not allowed in the match's current phase.
    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("no match with id {0}")]
    UnknownMatch(MatchId),

    #[error("player {0} is not part of this match")]
    NotAParticipant(PlayerId),

    #[error("not your turn")]
    NotYourTurn,

    #[error("player {0} is already in a match")]
    AlreadyInMatch(PlayerId),

    /// Text that is not a coordinate move such as `e2e4` or `e7e8q`.
    #[error("invalid move notation: {0}")]
    InvalidNotation(String),

    #[error("challenge has expired")]
    ChallengeExpired,

    /// Snapshot could not be encoded, decoded or replayed.
    #[error("snapshot error: {0}")]
    Snapshot(String),
}

impl MatchError {
    pub(crate) fn invalid_state(message: impl Into<String>) -> Self {
        MatchError::InvalidState(message.into())
    }
}

/// Result type alias for match operations.
pub type MatchResult<T> = Result<T, MatchError>;
