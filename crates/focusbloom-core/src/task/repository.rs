//! Task repository boundary.
//!
//! Reads are reactive: `watch_task` hands out a `watch::Receiver` that sees
//! every write to that task. Writes are small targeted updates, mirroring
//! how the controller checkpoints progress.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use super::{NewTask, Task};
use crate::error::Result;
use crate::session::SessionKind;

/// The write batch issued when a task moves to a new segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentChange {
    pub current: SessionKind,
    pub cycle: u32,
    pub in_progress: bool,
}

pub trait TaskRepository: Send + Sync {
    fn create_task(&self, new: NewTask) -> Result<Task>;

    fn get_task(&self, id: i64) -> Result<Option<Task>>;

    fn list_tasks(&self) -> Result<Vec<Task>>;

    /// Returns whether a task was removed.
    fn delete_task(&self, id: i64) -> Result<bool>;

    /// Stream of snapshots for `id`; `None` once the task is gone.
    fn watch_task(&self, id: i64) -> Result<watch::Receiver<Option<Task>>>;

    fn update_consumed_focus_time(&self, id: i64, ms: u64) -> Result<()>;

    fn update_consumed_short_break_time(&self, id: i64, ms: u64) -> Result<()>;

    fn update_consumed_long_break_time(&self, id: i64, ms: u64) -> Result<()>;

    fn update_task_in_progress(&self, id: i64, in_progress: bool) -> Result<()>;

    fn update_task_active(&self, id: i64, active: bool) -> Result<()>;

    fn update_task_completed(&self, id: i64, completed: bool) -> Result<()>;

    fn update_task_cycle_number(&self, id: i64, cycle: u32) -> Result<()>;

    fn update_current_session_name(&self, id: i64, kind: SessionKind) -> Result<()>;

    fn update_all_tasks_active_status_to_inactive(&self) -> Result<()>;

    fn update_consumed_time(&self, id: i64, kind: SessionKind, ms: u64) -> Result<()> {
        match kind {
            SessionKind::Focus => self.update_consumed_focus_time(id, ms),
            SessionKind::ShortBreak => self.update_consumed_short_break_time(id, ms),
            SessionKind::LongBreak => self.update_consumed_long_break_time(id, ms),
        }
    }

    /// Move `id` onto a new segment with a zeroed checkpoint.
    fn apply_segment_change(&self, id: i64, change: SegmentChange) -> Result<()> {
        self.update_consumed_time(id, change.current, 0)?;
        self.update_current_session_name(id, change.current)?;
        self.update_task_cycle_number(id, change.cycle)?;
        self.update_task_in_progress(id, change.in_progress)
    }

    fn mark_completed(&self, id: i64) -> Result<()> {
        self.update_task_in_progress(id, false)?;
        self.update_task_active(id, false)?;
        self.update_task_completed(id, true)
    }

    /// Make `id` the only active task.
    fn activate_exclusively(&self, id: i64) -> Result<()> {
        self.update_all_tasks_active_status_to_inactive()?;
        self.update_task_active(id, true)
    }
}

/// Per-task `watch` senders shared by the repository implementations.
#[derive(Debug, Default)]
pub struct TaskWatchers {
    senders: Mutex<HashMap<i64, watch::Sender<Option<Task>>>>,
}

impl TaskWatchers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to `id`, seeding a new channel with `current`.
    pub fn subscribe(&self, id: i64, current: Option<Task>) -> watch::Receiver<Option<Task>> {
        let mut senders = self.senders.lock().unwrap_or_else(|e| e.into_inner());
        match senders.get(&id) {
            Some(tx) => {
                tx.send_replace(current);
                tx.subscribe()
            }
            None => {
                let (tx, rx) = watch::channel(current);
                senders.insert(id, tx);
                rx
            }
        }
    }

    pub fn publish(&self, id: i64, task: Option<Task>) {
        let mut senders = self.senders.lock().unwrap_or_else(|e| e.into_inner());
        let drop_channel = match senders.get(&id) {
            Some(tx) => {
                tx.send_replace(task);
                tx.receiver_count() == 0
            }
            None => false,
        };
        if drop_channel {
            senders.remove(&id);
        }
    }

    /// Whether anyone may be listening to `id`.
    pub fn is_watched(&self, id: i64) -> bool {
        let senders = self.senders.lock().unwrap_or_else(|e| e.into_inner());
        senders.contains_key(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    fn task(id: i64) -> Task {
        Task::from_new(
            id,
            NewTask::new("t", NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(), 2),
            Utc::now(),
        )
    }

    #[test]
    fn subscribers_share_one_channel() {
        let watchers = TaskWatchers::new();
        let a = watchers.subscribe(1, Some(task(1)));
        let b = watchers.subscribe(1, Some(task(1)));
        let mut updated = task(1);
        updated.current_cycle = 2;
        watchers.publish(1, Some(updated));
        assert_eq!(a.borrow().as_ref().unwrap().current_cycle, 2);
        assert_eq!(b.borrow().as_ref().unwrap().current_cycle, 2);
    }

    #[test]
    fn channel_is_dropped_without_receivers() {
        let watchers = TaskWatchers::new();
        let rx = watchers.subscribe(3, Some(task(3)));
        drop(rx);
        watchers.publish(3, None);
        assert!(!watchers.is_watched(3));
    }
}
