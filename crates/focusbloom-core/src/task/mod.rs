//! Task model.
//!
//! A task carries its own cycle plan (`focus_sessions`) and the progress the
//! controller has made through it: the current segment kind, the cycle
//! number and the consumed time of each kind of segment, which is what lets
//! a session resume after the process dies.

mod memory;
mod repository;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::session::{SessionDurations, SessionKind};

pub use memory::InMemoryTaskRepository;
pub use repository::{SegmentChange, TaskRepository, TaskWatchers};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub date: NaiveDate,
    #[serde(default)]
    pub start_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_at: Option<DateTime<Utc>>,
    /// Number of Focus segments in the plan.
    pub focus_sessions: u32,
    /// 0 until the first Focus segment begins.
    pub current_cycle: u32,
    /// Segment that is running or about to run.
    pub current: SessionKind,
    pub consumed_focus_ms: u64,
    pub consumed_short_break_ms: u64,
    pub consumed_long_break_ms: u64,
    pub in_progress: bool,
    pub active: bool,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn from_new(id: i64, new: NewTask, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            name: new.name,
            description: new.description,
            date: new.date,
            start_at: new.start_at,
            end_at: new.end_at,
            focus_sessions: new.focus_sessions,
            current_cycle: 0,
            current: SessionKind::Focus,
            consumed_focus_ms: 0,
            consumed_short_break_ms: 0,
            consumed_long_break_ms: 0,
            in_progress: false,
            active: false,
            completed: false,
            created_at,
        }
    }

    pub fn is_started(&self) -> bool {
        self.current_cycle > 0
    }

    pub fn consumed_ms(&self, kind: SessionKind) -> u64 {
        match kind {
            SessionKind::Focus => self.consumed_focus_ms,
            SessionKind::ShortBreak => self.consumed_short_break_ms,
            SessionKind::LongBreak => self.consumed_long_break_ms,
        }
    }

    /// Time left in the current segment given the configured durations.
    pub fn remaining_ms(&self, durations: &SessionDurations) -> u64 {
        let total = durations.duration_of(self.current);
        if !self.is_started() {
            return total;
        }
        total.saturating_sub(self.consumed_ms(self.current))
    }

    /// Length of the whole plan: every focus, every short break, one long break.
    pub fn planned_duration_ms(&self, durations: &SessionDurations) -> u64 {
        if self.focus_sessions == 0 {
            return 0;
        }
        let n = u64::from(self.focus_sessions);
        durations
            .focus_ms
            .saturating_mul(n)
            .saturating_add(durations.short_break_ms.saturating_mul(n - 1))
            .saturating_add(durations.long_break_ms)
    }
}

/// Input for creating a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub date: NaiveDate,
    #[serde(default)]
    pub start_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_at: Option<DateTime<Utc>>,
    pub focus_sessions: u32,
}

impl NewTask {
    pub fn new(name: impl Into<String>, date: NaiveDate, focus_sessions: u32) -> Self {
        Self {
            name: name.into(),
            description: None,
            date,
            start_at: None,
            end_at: None,
            focus_sessions,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "name".into(),
                message: "must not be empty".into(),
            });
        }
        if self.focus_sessions == 0 {
            return Err(ValidationError::InvalidValue {
                field: "focus_sessions".into(),
                message: "must be at least 1".into(),
            });
        }
        if let (Some(start), Some(end)) = (self.start_at, self.end_at) {
            if end <= start {
                return Err(ValidationError::InvalidTimeRange { start, end });
            }
        }
        Ok(())
    }
}
