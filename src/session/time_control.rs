//! Chess clocks.
//!
//! A time control is written `<time>[|<increment>]` or `<time>+<increment>`.
//! A bare number means minutes for the main time and seconds for the
//! increment; an `h`, `m` or `s` suffix overrides that (`90s|2`, `1h`, `5m|3s`).

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::game_state::chess_types::Color;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid time control `{0}`; expected e.g. `5`, `5|3`, `10+5` or `90s|2s`")]
pub struct TimeControlParseError(pub String);

/// Starting time and per-move increment for both sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeControlSettings {
    pub time: Duration,
    pub increment: Duration,
}

impl TimeControlSettings {
    pub const fn new(time: Duration, increment: Duration) -> Self {
        Self { time, increment }
    }
}

impl FromStr for TimeControlSettings {
    type Err = TimeControlParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || TimeControlParseError(s.to_owned());
        let trimmed = s.trim();
        let (time_part, increment_part) = match trimmed.split_once(['|', '+']) {
            Some((time, increment)) => (time, Some(increment)),
            None => (trimmed, None),
        };

        let time = parse_amount(time_part, 60).ok_or_else(err)?;
        if time.is_zero() {
            return Err(err());
        }
        let increment = match increment_part {
            Some(part) => parse_amount(part, 1).ok_or_else(err)?,
            None => Duration::ZERO,
        };

        Ok(Self { time, increment })
    }
}

/// `<n>`, `<n>h`, `<n>m` or `<n>s`; a bare number is multiplied by
/// `default_unit_secs`.
fn parse_amount(text: &str, default_unit_secs: u64) -> Option<Duration> {
    let text = text.trim();
    let (digits, unit_secs) = match text.char_indices().last()? {
        (idx, 'h') => (&text[..idx], 3600),
        (idx, 'm') => (&text[..idx], 60),
        (idx, 's') => (&text[..idx], 1),
        _ => (text, default_unit_secs),
    };
    let amount: u64 = digits.trim().parse().ok()?;
    Some(Duration::from_secs(amount.checked_mul(unit_secs)?))
}

impl fmt::Display for TimeControlSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.time.as_secs();
        if secs % 60 == 0 {
            write!(f, "{}", secs / 60)?;
        } else {
            write!(f, "{secs}s")?;
        }
        let increment = self.increment.as_secs();
        if increment > 0 {
            write!(f, "|{increment}")?;
        }
        Ok(())
    }
}

/// One side's clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clock {
    pub remaining: Duration,
    pub increment: Duration,
}

impl Clock {
    pub const fn new(settings: &TimeControlSettings) -> Self {
        Self {
            remaining: settings.time,
            increment: settings.increment,
        }
    }

    /// Deduct `elapsed`; true once the flag has fallen.
    pub fn tick(&mut self, elapsed: Duration) -> bool {
        self.remaining = self.remaining.saturating_sub(elapsed);
        self.is_expired()
    }

    pub fn is_expired(&self) -> bool {
        self.remaining.is_zero()
    }

    /// Credit the increment after a completed move.
    pub fn complete_move(&mut self) {
        self.remaining += self.increment;
    }
}

impl fmt::Display for Clock {
    /// `h:mm:ss`, `m:ss`, or `0:ss.cc` in the last thirty seconds.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self.remaining.as_secs();
        let (hours, minutes, seconds) = (total / 3600, (total / 60) % 60, total % 60);
        if hours > 0 {
            write!(f, "{hours}:{minutes:02}:{seconds:02}")
        } else if minutes == 0 && seconds <= 30 {
            let centis = self.remaining.subsec_millis() / 10;
            write!(f, "0:{seconds:02}.{centis:02}")
        } else {
            write!(f, "{minutes}:{seconds:02}")
        }
    }
}

/// Both clocks of a timed match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clocks {
    pub white: Clock,
    pub black: Clock,
}

impl Clocks {
    pub const fn new(settings: &TimeControlSettings) -> Self {
        Self {
            white: Clock::new(settings),
            black: Clock::new(settings),
        }
    }

    pub const fn get(&self, color: Color) -> &Clock {
        match color {
            Color::White => &self.white,
            Color::Black => &self.black,
        }
    }

    pub fn get_mut(&mut self, color: Color) -> &mut Clock {
        match color {
            Color::White => &mut self.white,
            Color::Black => &mut self.black,
        }
    }
}
