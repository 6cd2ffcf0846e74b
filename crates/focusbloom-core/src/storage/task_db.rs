//! SQLite-backed task repository.
//!
//! Every write publishes a fresh snapshot to the task's watchers, so a bound
//! controller sees its own checkpoints as well as writes from elsewhere in
//! the process.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tokio::sync::watch;
use tracing::debug;

use super::database::{open_connection, open_memory_connection};
use super::{data_dir, DB_FILE};
use crate::error::{Result, SessionError};
use crate::session::SessionKind;
use crate::task::{NewTask, SegmentChange, Task, TaskRepository, TaskWatchers};

const TASK_COLUMNS: &str = "id, name, description, date, start_at, end_at, focus_sessions,
    current_cycle, current, consumed_focus_ms, consumed_short_break_ms, consumed_long_break_ms,
    in_progress, active, completed, created_at";

pub struct SqliteTaskRepository {
    conn: Mutex<Connection>,
    watchers: TaskWatchers,
}

impl SqliteTaskRepository {
    /// Open the task store at `<data_dir>/focusbloom.db`.
    pub fn open() -> Result<Self> {
        Self::open_path(&data_dir()?.join(DB_FILE))
    }

    pub fn open_path(path: &Path) -> Result<Self> {
        Ok(Self::with_connection(open_connection(path)?))
    }

    pub fn open_memory() -> Result<Self> {
        Ok(Self::with_connection(open_memory_connection()?))
    }

    fn with_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
            watchers: TaskWatchers::new(),
        }
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn fetch(conn: &Connection, id: i64) -> Result<Option<Task>> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1");
        Ok(conn.query_row(&sql, params![id], row_to_task).optional()?)
    }

    fn publish(&self, id: i64) -> Result<()> {
        if self.watchers.is_watched(id) {
            let task = Self::fetch(&self.conn(), id)?;
            self.watchers.publish(id, task);
        }
        Ok(())
    }

    /// Run a single-row UPDATE for `id`, failing when the row is gone.
    fn update<P: rusqlite::Params>(&self, id: i64, sql: &str, params: P) -> Result<()> {
        let changed = self.conn().execute(sql, params)?;
        if changed == 0 {
            return Err(SessionError::TaskNotFound { id }.into());
        }
        self.publish(id)
    }
}

fn consumed_column(kind: SessionKind) -> &'static str {
    match kind {
        SessionKind::Focus => "consumed_focus_ms",
        SessionKind::ShortBreak => "consumed_short_break_ms",
        SessionKind::LongBreak => "consumed_long_break_ms",
    }
}

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn row_to_task(row: &Row<'_>) -> rusqlite::Result<Task> {
    let date: String = row.get(3)?;
    let start_at: Option<String> = row.get(4)?;
    let end_at: Option<String> = row.get(5)?;
    let current: String = row.get(8)?;
    let created_at: String = row.get(15)?;

    let timestamp = |idx: usize, value: &str| {
        DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| conversion_error(idx, e))
    };

    Ok(Task {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        date: NaiveDate::parse_from_str(&date, "%Y-%m-%d").map_err(|e| conversion_error(3, e))?,
        start_at: start_at.as_deref().map(|s| timestamp(4, s)).transpose()?,
        end_at: end_at.as_deref().map(|s| timestamp(5, s)).transpose()?,
        focus_sessions: row.get(6)?,
        current_cycle: row.get(7)?,
        current: current.parse().map_err(|e| conversion_error(8, e))?,
        consumed_focus_ms: row.get(9)?,
        consumed_short_break_ms: row.get(10)?,
        consumed_long_break_ms: row.get(11)?,
        in_progress: row.get(12)?,
        active: row.get(13)?,
        completed: row.get(14)?,
        created_at: timestamp(15, &created_at)?,
    })
}

impl TaskRepository for SqliteTaskRepository {
    fn create_task(&self, new: NewTask) -> Result<Task> {
        new.validate()?;
        let conn = self.conn();
        conn.execute(
            "INSERT INTO tasks (name, description, date, start_at, end_at, focus_sessions, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                new.name,
                new.description,
                new.date.format("%Y-%m-%d").to_string(),
                new.start_at.map(|t| t.to_rfc3339()),
                new.end_at.map(|t| t.to_rfc3339()),
                new.focus_sessions,
                Utc::now().to_rfc3339(),
            ],
        )?;
        let id = conn.last_insert_rowid();
        debug!(id, "task created");
        Self::fetch(&conn, id)?.ok_or_else(|| SessionError::TaskNotFound { id }.into())
    }

    fn get_task(&self, id: i64) -> Result<Option<Task>> {
        Self::fetch(&self.conn(), id)
    }

    fn list_tasks(&self) -> Result<Vec<Task>> {
        let conn = self.conn();
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks ORDER BY date, id");
        let mut stmt = conn.prepare(&sql)?;
        let tasks = stmt
            .query_map([], row_to_task)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tasks)
    }

    fn delete_task(&self, id: i64) -> Result<bool> {
        let removed = self.conn().execute("DELETE FROM tasks WHERE id = ?1", params![id])? > 0;
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
        self.update(
            id,
            "UPDATE tasks SET consumed_focus_ms = ?2 WHERE id = ?1",
            params![id, ms],
        )
    }

    fn update_consumed_short_break_time(&self, id: i64, ms: u64) -> Result<()> {
        self.update(
            id,
            "UPDATE tasks SET consumed_short_break_ms = ?2 WHERE id = ?1",
            params![id, ms],
        )
    }

    fn update_consumed_long_break_time(&self, id: i64, ms: u64) -> Result<()> {
        self.update(
            id,
            "UPDATE tasks SET consumed_long_break_ms = ?2 WHERE id = ?1",
            params![id, ms],
        )
    }

    fn update_task_in_progress(&self, id: i64, in_progress: bool) -> Result<()> {
        self.update(
            id,
            "UPDATE tasks SET in_progress = ?2 WHERE id = ?1",
            params![id, in_progress],
        )
    }

    fn update_task_active(&self, id: i64, active: bool) -> Result<()> {
        self.update(
            id,
            "UPDATE tasks SET active = ?2 WHERE id = ?1",
            params![id, active],
        )
    }

    fn update_task_completed(&self, id: i64, completed: bool) -> Result<()> {
        self.update(
            id,
            "UPDATE tasks SET completed = ?2 WHERE id = ?1",
            params![id, completed],
        )
    }

    fn update_task_cycle_number(&self, id: i64, cycle: u32) -> Result<()> {
        self.update(
            id,
            "UPDATE tasks SET current_cycle = ?2 WHERE id = ?1",
            params![id, cycle],
        )
    }

    fn update_current_session_name(&self, id: i64, kind: SessionKind) -> Result<()> {
        self.update(
            id,
            "UPDATE tasks SET current = ?2 WHERE id = ?1",
            params![id, kind.as_label()],
        )
    }

    fn update_all_tasks_active_status_to_inactive(&self) -> Result<()> {
        let ids = {
            let conn = self.conn();
            let tx = conn.unchecked_transaction()?;
            let ids = tx
                .prepare("SELECT id FROM tasks WHERE active = 1")?
                .query_map([], |row| row.get::<_, i64>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            tx.execute("UPDATE tasks SET active = 0 WHERE active = 1", [])?;
            tx.commit()?;
            ids
        };
        for id in ids {
            self.publish(id)?;
        }
        Ok(())
    }

    fn apply_segment_change(&self, id: i64, change: SegmentChange) -> Result<()> {
        let sql = format!(
            "UPDATE tasks SET {} = 0, current = ?2, current_cycle = ?3, in_progress = ?4 WHERE id = ?1",
            consumed_column(change.current)
        );
        self.update(
            id,
            &sql,
            params![id, change.current.as_label(), change.cycle, change.in_progress],
        )
    }

    fn mark_completed(&self, id: i64) -> Result<()> {
        self.update(
            id,
            "UPDATE tasks SET in_progress = 0, active = 0, completed = 1 WHERE id = ?1",
            params![id],
        )
    }

    fn activate_exclusively(&self, id: i64) -> Result<()> {
        let previously_active = {
            let conn = self.conn();
            let tx = conn.unchecked_transaction()?;
            let ids = tx
                .prepare("SELECT id FROM tasks WHERE active = 1 AND id != ?1")?
                .query_map(params![id], |row| row.get::<_, i64>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            tx.execute("UPDATE tasks SET active = 0 WHERE active = 1 AND id != ?1", params![id])?;
            let changed = tx.execute("UPDATE tasks SET active = 1 WHERE id = ?1", params![id])?;
            if changed == 0 {
                // Dropping the transaction rolls it back.
                return Err(SessionError::TaskNotFound { id }.into());
            }
            tx.commit()?;
            ids
        };
        for other in previously_active {
            self.publish(other)?;
        }
        self.publish(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;

    fn new_task(name: &str, sessions: u32) -> NewTask {
        NewTask::new(name, NaiveDate::from_ymd_opt(2026, 5, 4).unwrap(), sessions)
    }

    #[test]
    fn create_and_read_back() {
        let repo = SqliteTaskRepository::open_memory().unwrap();
        let mut new = new_task("write report", 3);
        new.description = Some("quarterly".into());
        let created = repo.create_task(new).unwrap();

        let stored = repo.get_task(created.id).unwrap().unwrap();
        assert_eq!(stored, created);
        assert_eq!(stored.current, SessionKind::Focus);
        assert_eq!(stored.current_cycle, 0);
        assert!(!stored.in_progress && !stored.active && !stored.completed);
        assert_eq!(stored.description.as_deref(), Some("quarterly"));
    }

    #[test]
    fn create_rejects_invalid_task() {
        let repo = SqliteTaskRepository::open_memory().unwrap();
        assert!(matches!(
            repo.create_task(new_task("", 2)),
            Err(CoreError::Validation(_))
        ));
        assert!(repo.list_tasks().unwrap().is_empty());
    }

    #[test]
    fn updates_on_missing_task_fail() {
        let repo = SqliteTaskRepository::open_memory().unwrap();
        assert!(matches!(
            repo.update_consumed_focus_time(42, 1),
            Err(CoreError::Session(SessionError::TaskNotFound { id: 42 }))
        ));
        assert!(repo.activate_exclusively(42).is_err());
    }

    #[test]
    fn segment_change_is_one_write() {
        let repo = SqliteTaskRepository::open_memory().unwrap();
        let task = repo.create_task(new_task("a", 2)).unwrap();
        repo.update_consumed_short_break_time(task.id, 9_000).unwrap();
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
        assert_eq!(stored.current_cycle, 1);
        assert_eq!(stored.consumed_short_break_ms, 0);
        assert!(stored.in_progress);
    }

    #[test]
    fn activate_exclusively_leaves_one_active() {
        let repo = SqliteTaskRepository::open_memory().unwrap();
        let a = repo.create_task(new_task("a", 1)).unwrap();
        let b = repo.create_task(new_task("b", 1)).unwrap();
        let rx_a = repo.watch_task(a.id).unwrap();

        repo.activate_exclusively(a.id).unwrap();
        assert!(rx_a.borrow().as_ref().unwrap().active);
        repo.activate_exclusively(b.id).unwrap();
        assert!(!rx_a.borrow().as_ref().unwrap().active);

        let active: Vec<i64> = repo
            .list_tasks()
            .unwrap()
            .into_iter()
            .filter(|t| t.active)
            .map(|t| t.id)
            .collect();
        assert_eq!(active, vec![b.id]);

        repo.update_all_tasks_active_status_to_inactive().unwrap();
        assert!(repo.list_tasks().unwrap().iter().all(|t| !t.active));
    }

    #[test]
    fn mark_completed_clears_flags() {
        let repo = SqliteTaskRepository::open_memory().unwrap();
        let task = repo.create_task(new_task("a", 1)).unwrap();
        repo.activate_exclusively(task.id).unwrap();
        repo.update_task_in_progress(task.id, true).unwrap();
        repo.mark_completed(task.id).unwrap();

        let stored = repo.get_task(task.id).unwrap().unwrap();
        assert!(stored.completed);
        assert!(!stored.active);
        assert!(!stored.in_progress);
    }

    #[test]
    fn watchers_see_deletion() {
        let repo = SqliteTaskRepository::open_memory().unwrap();
        let task = repo.create_task(new_task("a", 1)).unwrap();
        let rx = repo.watch_task(task.id).unwrap();
        repo.update_consumed_focus_time(task.id, 600_000).unwrap();
        assert_eq!(rx.borrow().as_ref().unwrap().consumed_focus_ms, 600_000);
        assert!(repo.delete_task(task.id).unwrap());
        assert!(rx.borrow().is_none());
        assert!(!repo.delete_task(task.id).unwrap());
    }

    #[test]
    fn progress_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DB_FILE);
        let id = {
            let repo = SqliteTaskRepository::open_path(&path).unwrap();
            let task = repo.create_task(new_task("a", 2)).unwrap();
            repo.update_consumed_focus_time(task.id, 600_000).unwrap();
            task.id
        };
        let repo = SqliteTaskRepository::open_path(&path).unwrap();
        assert_eq!(
            repo.get_task(id).unwrap().unwrap().consumed_focus_ms,
            600_000
        );
    }
}
