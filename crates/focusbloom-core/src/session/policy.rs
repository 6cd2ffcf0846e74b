//! Segment transition table.
//!
//! ```text
//! (cycle 0)  -> Focus (cycle 1)
//! Focus      -> ShortBreak            while cycle < focus_sessions
//! Focus      -> LongBreak             once cycle == focus_sessions
//! ShortBreak -> Focus (cycle + 1)
//! LongBreak  -> complete
//! ```
//!
//! Pure functions only; the controller applies the result.

use serde::{Deserialize, Serialize};

use super::SessionKind;

/// Outcome of asking the policy for the segment after the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Transition {
    /// Run `kind` next with the task at `cycle`.
    Segment { kind: SessionKind, cycle: u32 },
    /// No segments remain.
    Complete,
}

/// Decide the segment that follows `current` for a task at `current_cycle`
/// out of `focus_sessions`.
///
/// A task with no focus sessions has nothing to run and is complete.
pub fn next_segment(current: SessionKind, current_cycle: u32, focus_sessions: u32) -> Transition {
    if focus_sessions == 0 {
        return Transition::Complete;
    }
    if current_cycle == 0 {
        return Transition::Segment {
            kind: SessionKind::Focus,
            cycle: 1,
        };
    }
    match current {
        SessionKind::Focus if current_cycle >= focus_sessions => Transition::Segment {
            kind: SessionKind::LongBreak,
            cycle: current_cycle.min(focus_sessions),
        },
        SessionKind::Focus => Transition::Segment {
            kind: SessionKind::ShortBreak,
            cycle: current_cycle,
        },
        // A short break past the last cycle can only come from a task whose
        // plan shrank mid-run; close it with the long break instead.
        SessionKind::ShortBreak if current_cycle >= focus_sessions => Transition::Segment {
            kind: SessionKind::LongBreak,
            cycle: focus_sessions,
        },
        SessionKind::ShortBreak => Transition::Segment {
            kind: SessionKind::Focus,
            cycle: current_cycle + 1,
        },
        SessionKind::LongBreak => Transition::Complete,
    }
}

/// Every segment a fresh task runs through, in order.
pub fn plan(focus_sessions: u32) -> Vec<(SessionKind, u32)> {
    let mut segments = Vec::new();
    let mut kind = SessionKind::Focus;
    let mut cycle = 0;
    while let Transition::Segment { kind: k, cycle: c } = next_segment(kind, cycle, focus_sessions) {
        segments.push((k, c));
        kind = k;
        cycle = c;
    }
    segments
}
