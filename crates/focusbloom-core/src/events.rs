use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::SessionKind;
use crate::timer::ClockState;

/// Every state change of the session controller produces an Event.
/// UIs subscribe to them; the CLI prints them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    TaskLoaded {
        task_id: i64,
        at: DateTime<Utc>,
    },
    SegmentStarted {
        task_id: i64,
        kind: SessionKind,
        cycle: u32,
        duration_ms: u64,
        remaining_ms: u64,
        at: DateTime<Utc>,
    },
    TimerPaused {
        task_id: i64,
        remaining_ms: u64,
        at: DateTime<Utc>,
    },
    TimerResumed {
        task_id: i64,
        remaining_ms: u64,
        at: DateTime<Utc>,
    },
    TimerReset {
        task_id: i64,
        at: DateTime<Utc>,
    },
    /// Segment ran down to zero.
    SegmentCompleted {
        task_id: i64,
        kind: SessionKind,
        cycle: u32,
        duration_ms: u64,
        at: DateTime<Utc>,
    },
    /// Segment abandoned by a manual skip.
    SegmentSkipped {
        task_id: i64,
        from: SessionKind,
        to: Option<SessionKind>,
        at: DateTime<Utc>,
    },
    TaskCompleted {
        task_id: i64,
        at: DateTime<Utc>,
    },
    /// The bound task vanished mid-session; the clock was stopped.
    TaskUnavailable {
        task_id: i64,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        task_id: Option<i64>,
        state: ClockState,
        kind: Option<SessionKind>,
        cycle: u32,
        remaining_ms: u64,
        duration_ms: u64,
        at: DateTime<Utc>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_tagged_in_snake_case() {
        let event = Event::TaskCompleted {
            task_id: 3,
            at: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "task_completed");
        assert_eq!(json["task_id"], 3);
    }
}
