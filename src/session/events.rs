//! Notifications emitted on every session transition.
//!
//! The registry publishes these on a broadcast channel; rendering and
//! messaging players is left to whoever subscribes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::EngineFailure;
use crate::game_state::chess_types::{Color, PieceKind};
use crate::move_generation::game_status::GameStatus;
use crate::session::outcome::{AbortReason, Outcome};
use crate::session::participant::{MatchId, Seats};
use crate::session::snapshot::SessionSnapshot;
use crate::session::time_control::TimeControlSettings;

/// One transition of one match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchEvent {
    pub match_id: MatchId,
    pub at: DateTime<Utc>,
    pub kind: MatchEventKind,
}

impl MatchEvent {
    pub fn now(match_id: MatchId, kind: MatchEventKind) -> Self {
        Self {
            match_id,
            at: Utc::now(),
            kind,
        }
    }
}

/// What happened, with its payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum MatchEventKind {
    ChallengeIssued {
        seats: Seats,
        time_control: Option<TimeControlSettings>,
        expires_at: DateTime<Utc>,
    },
    /// The match is live; also sent for computer matches, which skip the
    /// challenge.
    Started {
        seats: Seats,
        time_control: Option<TimeControlSettings>,
    },
    Resumed {
        seats: Seats,
        ply: usize,
    },
    MoveMade {
        color: Color,
        uci: String,
        fen: String,
        status: GameStatus,
    },
    EngineThinking {
        color: Color,
    },
    EngineFailed {
        color: Color,
        failure: EngineFailure,
    },
    DrawOffered {
        by: Color,
    },
    PromotionSet {
        color: Color,
        kind: PieceKind,
    },
    /// Terminal. Carries the final state so hosts can archive or export it.
    Completed {
        outcome: Outcome,
        snapshot: Box<SessionSnapshot>,
    },
    /// Terminal.
    Aborted {
        reason: AbortReason,
        snapshot: Box<SessionSnapshot>,
    },
}

impl MatchEventKind {
    pub const fn is_terminal(&self) -> bool {
        matches!(self, MatchEventKind::Completed { .. } | MatchEventKind::Aborted { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_json_carries_kind_and_payload() {
        let id = MatchId::new();
        let event = MatchEvent::now(id, MatchEventKind::DrawOffered { by: Color::White });
        let value = serde_json::to_value(&event).expect("event serializes");
        assert_eq!(value["kind"]["type"], "draw_offered");
        assert_eq!(value["kind"]["payload"]["by"], "white");
        assert_eq!(value["match_id"], id.to_string());

        let back: MatchEvent = serde_json::from_value(value).expect("event deserializes");
        assert_eq!(back, event);
        assert!(!back.kind.is_terminal());
    }
}
