//! Match and player identities, and who sits on each side of the board.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::engine_bridge::EngineStrength;
use crate::game_state::chess_types::Color;

/// Unique identifier for a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MatchId(Uuid);

impl MatchId {
    /// Create a new random match ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MatchId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Unique identifier for a player, assigned by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerId(Uuid);

impl PlayerId {
    /// Create a new random player ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PlayerId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// One side of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Participant {
    Human(PlayerId),
    Computer(EngineStrength),
}

impl Participant {
    #[must_use]
    pub const fn human(player: PlayerId) -> Self {
        Participant::Human(player)
    }

    #[must_use]
    pub const fn computer(strength: EngineStrength) -> Self {
        Participant::Computer(strength)
    }

    #[must_use]
    pub const fn player_id(&self) -> Option<PlayerId> {
        match self {
            Participant::Human(player) => Some(*player),
            Participant::Computer(_) => None,
        }
    }

    #[must_use]
    pub const fn is_computer(&self) -> bool {
        matches!(self, Participant::Computer(_))
    }

    #[must_use]
    pub fn is_player(&self, id: PlayerId) -> bool {
        self.player_id() == Some(id)
    }
}

impl fmt::Display for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Participant::Human(player) => write!(f, "{player}"),
            Participant::Computer(strength) => match strength.elo {
                Some(elo) => write!(f, "Computer ({elo})"),
                None => f.write_str("Computer"),
            },
        }
    }
}

/// Who a challenge is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Opponent {
    /// Another player, who must accept before the match starts.
    Player(PlayerId),
    /// The engine, at the configured default strength when `None`. The match
    /// starts at once.
    Computer(Option<EngineStrength>),
    /// Two engine sides; the initiator only watches.
    ComputerVsComputer {
        white: Option<EngineStrength>,
        black: Option<EngineStrength>,
    },
}

/// White and black participants of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seats {
    pub white: Participant,
    pub black: Participant,
}

impl Seats {
    #[must_use]
    pub const fn get(&self, color: Color) -> &Participant {
        match color {
            Color::White => &self.white,
            Color::Black => &self.black,
        }
    }

    /// Color played by `player`, if they sit at this board.
    #[must_use]
    pub fn color_of(&self, player: PlayerId) -> Option<Color> {
        if self.white.is_player(player) {
            Some(Color::White)
        } else if self.black.is_player(player) {
            Some(Color::Black)
        } else {
            None
        }
    }

    pub fn players(&self) -> impl Iterator<Item = PlayerId> {
        [self.white.player_id(), self.black.player_id()].into_iter().flatten()
    }

    #[must_use]
    pub const fn has_computer(&self) -> bool {
        self.white.is_computer() || self.black.is_computer()
    }
}
