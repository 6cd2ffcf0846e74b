//! In-process task store. Used by tests and by embedders that persist
//! elsewhere.

use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::Utc;
use tokio::sync::watch;

use super::repository::{TaskRepository, TaskWatchers};
use super::{NewTask, Task};
use crate::error::{Result, SessionError};
use crate::session::SessionKind;

#[derive(Debug, Default)]
struct Inner {
    next_id: i64,
    tasks: BTreeMap<i64, Task>,
}

#[derive(Debug, Default)]
pub struct InMemoryTaskRepository {
    inner: Mutex<Inner>,
    watchers: TaskWatchers,
}

impl InMemoryTaskRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a task as-is, keeping its id. Handy for seeding a resumed state.
    pub fn insert(&self, task: Task) {
        let id = task.id;
        {
            let mut inner = self.lock();
            inner.next_id = inner.next_id.max(id);
            inner.tasks.insert(id, task.clone());
        }
        self.watchers.publish(id, Some(task));
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn modify(&self, id: i64, f: impl FnOnce(&mut Task)) -> Result<()> {
        let snapshot = {
            let mut inner = self.lock();
            let task = inner
                .tasks
                .get_mut(&id)
                .ok_or(SessionError::TaskNotFound { id })?;
            f(task);
            task.clone()
        };
        self.watchers.publish(id, Some(snapshot));
        Ok(())
    }
}

impl TaskRepository for InMemoryTaskRepository {
    fn create_task(&self, new: NewTask) -> Result<Task> {
        new.validate()?;
        let task = {
            let mut inner = self.lock();
            inner.next_id += 1;
            let task = Task::from_new(inner.next_id, new, Utc::now());
            inner.tasks.insert(task.id, task.clone());
            task
        };
        Ok(task)
    }

    fn get_task(&self, id: i64) -> Result<Option<Task>> {
        Ok(self.lock().tasks.get(&id).cloned())
    }

    fn list_tasks(&self) -> Result<Vec<Task>> {
        Ok(self.lock().tasks.values().cloned().collect())
    }

    fn delete_task(&self, id: i64) -> Result<bool> {
        let removed = self.lock().tasks.remove(&id).is_some();
        if removed {
            self.watchers.publish(id, None);
        }
        Ok(removed)
    }

    fn watch_task(&self, id: i64) -> Result<watch::Receiver<Option<Task>>> {
        let current = self.get_task(id)?;
        Ok(self.watchers.subscribe(id, current))
    }

    fn update_consumed_focus_time(&self, id: i64, ms: u64) -> Result<()> {
        self.modify(id, |t| t.consumed_focus_ms = ms)
    }

    fn update_consumed_short_break_time(&self, id: i64, ms: u64) -> Result<()> {
        self.modify(id, |t| t.consumed_short_break_ms = ms)
    }

    fn update_consumed_long_break_time(&self, id: i64, ms: u64) -> Result<()> {
        self.modify(id, |t| t.consumed_long_break_ms = ms)
    }

    fn update_task_in_progress(&self, id: i64, in_progress: bool) -> Result<()> {
        self.modify(id, |t| t.in_progress = in_progress)
    }

    fn update_task_active(&self, id: i64, active: bool) -> Result<()> {
        self.modify(id, |t| t.active = active)
    }

    fn update_task_completed(&self, id: i64, completed: bool) -> Result<()> {
        self.modify(id, |t| t.completed = completed)
    }

    fn update_task_cycle_number(&self, id: i64, cycle: u32) -> Result<()> {
        self.modify(id, |t| t.current_cycle = cycle)
    }

    fn update_current_session_name(&self, id: i64, kind: SessionKind) -> Result<()> {
        self.modify(id, |t| t.current = kind)
    }

    fn update_all_tasks_active_status_to_inactive(&self) -> Result<()> {
        let changed: Vec<Task> = {
            let mut inner = self.lock();
            inner
                .tasks
                .values_mut()
                .filter(|t| t.active)
                .map(|t| {
                    t.active = false;
                    t.clone()
                })
                .collect()
        };
        for task in changed {
            self.watchers.publish(task.id, Some(task));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::task::SegmentChange;
    use chrono::NaiveDate;

    fn new_task(name: &str) -> NewTask {
        NewTask::new(name, NaiveDate::from_ymd_opt(2026, 4, 1).unwrap(), 3)
    }

    #[test]
    fn create_assigns_increasing_ids() {
        let repo = InMemoryTaskRepository::new();
        let a = repo.create_task(new_task("a")).unwrap();
        let b = repo.create_task(new_task("b")).unwrap();
        assert!(b.id > a.id);
        assert_eq!(repo.list_tasks().unwrap().len(), 2);
    }

    #[test]
    fn watch_sees_updates_and_deletion() {
        let repo = InMemoryTaskRepository::new();
        let task = repo.create_task(new_task("a")).unwrap();
        let rx = repo.watch_task(task.id).unwrap();

        repo.update_consumed_focus_time(task.id, 1_200).unwrap();
        assert_eq!(rx.borrow().as_ref().unwrap().consumed_focus_ms, 1_200);

        assert!(repo.delete_task(task.id).unwrap());
        assert!(rx.borrow().is_none());
    }

    #[test]
    fn segment_change_zeroes_new_checkpoint() {
        let repo = InMemoryTaskRepository::new();
        let task = repo.create_task(new_task("a")).unwrap();
        repo.update_consumed_short_break_time(task.id, 4_000).unwrap();
        repo.apply_segment_change(
            task.id,
            SegmentChange {
                current: SessionKind::ShortBreak,
                cycle: 1,
                in_progress: true,
            },
        )
        .unwrap();
        let stored = repo.get_task(task.id).unwrap().unwrap();
        assert_eq!(stored.current, SessionKind::ShortBreak);
        assert_eq!(stored.consumed_short_break_ms, 0);
        assert!(stored.in_progress);
    }

    #[test]
    fn activate_exclusively_leaves_one_active() {
        let repo = InMemoryTaskRepository::new();
        let a = repo.create_task(new_task("a")).unwrap();
        let b = repo.create_task(new_task("b")).unwrap();
        repo.activate_exclusively(a.id).unwrap();
        repo.activate_exclusively(b.id).unwrap();
        let active: Vec<i64> = repo
            .list_tasks()
            .unwrap()
            .into_iter()
            .filter(|t| t.active)
            .map(|t| t.id)
            .collect();
        assert_eq!(active, vec![b.id]);
    }

    #[test]
    fn updating_missing_task_fails() {
        let repo = InMemoryTaskRepository::new();
        let err = repo.update_task_active(42, true).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Session(SessionError::TaskNotFound { id: 42 })
        ));
    }
}
