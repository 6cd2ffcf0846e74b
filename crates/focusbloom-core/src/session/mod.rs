//! Session kinds and their durations.
//!
//! A task's plan is `focus_sessions` Focus segments interleaved with short
//! breaks and closed by a single long break. The transition table lives in
//! [`policy`].

pub mod policy;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

pub use policy::{next_segment, Transition};

/// Minutes to milliseconds, saturating.
pub(crate) fn minutes_to_ms(minutes: u32) -> u64 {
    u64::from(minutes).saturating_mul(60).saturating_mul(1000)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionKind {
    Focus,
    ShortBreak,
    LongBreak,
}

impl SessionKind {
    /// Label persisted in the `current` column.
    pub fn as_label(self) -> &'static str {
        match self {
            SessionKind::Focus => "Focus",
            SessionKind::ShortBreak => "ShortBreak",
            SessionKind::LongBreak => "LongBreak",
        }
    }

    pub fn is_break(self) -> bool {
        !matches!(self, SessionKind::Focus)
    }
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

impl FromStr for SessionKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Focus" => Ok(SessionKind::Focus),
            "ShortBreak" => Ok(SessionKind::ShortBreak),
            "LongBreak" => Ok(SessionKind::LongBreak),
            other => Err(ValidationError::UnknownSessionKind(other.to_string())),
        }
    }
}

/// Segment lengths in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDurations {
    pub focus_ms: u64,
    pub short_break_ms: u64,
    pub long_break_ms: u64,
}

impl SessionDurations {
    pub fn from_minutes(focus: u32, short_break: u32, long_break: u32) -> Self {
        Self {
            focus_ms: minutes_to_ms(focus),
            short_break_ms: minutes_to_ms(short_break),
            long_break_ms: minutes_to_ms(long_break),
        }
    }

    pub fn duration_of(&self, kind: SessionKind) -> u64 {
        match kind {
            SessionKind::Focus => self.focus_ms,
            SessionKind::ShortBreak => self.short_break_ms,
            SessionKind::LongBreak => self.long_break_ms,
        }
    }
}

impl Default for SessionDurations {
    /// 25 / 5 / 15 minutes.
    fn default() -> Self {
        Self::from_minutes(25, 5, 15)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_parse_back() {
        for kind in [SessionKind::Focus, SessionKind::ShortBreak, SessionKind::LongBreak] {
            assert_eq!(kind.as_label().parse::<SessionKind>().unwrap(), kind);
        }
    }

    #[test]
    fn unknown_label_is_rejected() {
        assert!("Break".parse::<SessionKind>().is_err());
        assert!("focus".parse::<SessionKind>().is_err());
    }

    #[test]
    fn default_durations_are_25_5_15() {
        let d = SessionDurations::default();
        assert_eq!(d.duration_of(SessionKind::Focus), 1_500_000);
        assert_eq!(d.duration_of(SessionKind::ShortBreak), 300_000);
        assert_eq!(d.duration_of(SessionKind::LongBreak), 900_000);
    }

    #[test]
    fn serde_uses_persisted_labels() {
        let json = serde_json::to_string(&SessionKind::ShortBreak).unwrap();
        assert_eq!(json, "\"ShortBreak\"");
    }
}
