//! SQLite-based session log and statistics.
//!
//! Provides persistent storage for:
//! - Naturally completed segments (skipped ones are never logged)
//! - Session statistics (daily and all-time)
//! - Key-value store for application state

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use super::{data_dir, migrations, DB_FILE};
use crate::error::{DatabaseError, Result};
use crate::session::SessionKind;

/// A segment that ran to zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedSegment {
    pub task_id: i64,
    pub kind: SessionKind,
    pub cycle: u32,
    pub duration_ms: u64,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

/// Sink for completed segments.
pub trait SessionLog: Send + Sync {
    fn record_segment(&self, segment: &CompletedSegment) -> Result<()>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: i64,
    pub task_id: i64,
    pub kind: SessionKind,
    pub cycle: u32,
    pub duration_ms: u64,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Stats {
    pub total_sessions: u64,
    pub focus_sessions: u64,
    pub total_focus_ms: u64,
    pub total_break_ms: u64,
    pub today_focus_sessions: u64,
    pub today_focus_ms: u64,
    pub completed_tasks: u64,
}

/// Open `path` and bring its schema up to date.
pub(crate) fn open_connection(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
        path: path.to_path_buf(),
        source,
    })?;
    migrations::migrate(&conn).map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
    Ok(conn)
}

pub(crate) fn open_memory_connection() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    migrations::migrate(&conn).map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
    Ok(conn)
}

/// SQLite database for the session log.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open the database at `<data_dir>/focusbloom.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        Self::open_path(&data_dir()?.join(DB_FILE))
    }

    pub fn open_path(path: &Path) -> Result<Self> {
        Ok(Self {
            conn: Mutex::new(open_connection(path)?),
        })
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self> {
        Ok(Self {
            conn: Mutex::new(open_memory_connection()?),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append a completed segment, returning its row id.
    pub fn insert_segment(&self, segment: &CompletedSegment) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO sessions (task_id, kind, cycle, duration_ms, started_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                segment.task_id,
                segment.kind.as_label(),
                segment.cycle,
                segment.duration_ms,
                segment.started_at.to_rfc3339(),
                segment.completed_at.to_rfc3339(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Most recent segments first, optionally limited to one task.
    pub fn list_sessions(&self, task_id: Option<i64>, limit: usize) -> Result<Vec<SessionRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, task_id, kind, cycle, duration_ms, started_at, completed_at
             FROM sessions
             WHERE ?1 IS NULL OR task_id = ?1
             ORDER BY completed_at DESC, id DESC
             LIMIT ?2",
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map(params![task_id, limit], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, u32>(3)?,
                row.get::<_, u64>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, task_id, kind, cycle, duration_ms, started_at, completed_at) = row?;
            records.push(SessionRecord {
                id,
                task_id,
                kind: kind.parse()?,
                cycle,
                duration_ms,
                started_at: parse_timestamp(&started_at)?,
                completed_at: parse_timestamp(&completed_at)?,
            });
        }
        Ok(records)
    }

    pub fn stats_today(&self) -> Result<Stats> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT kind, COUNT(*), COALESCE(SUM(duration_ms), 0)
             FROM sessions
             WHERE completed_at >= ?1
             GROUP BY kind",
        )?;

        let mut stats = Stats::default();
        let rows = stmt.query_map(params![today_start()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, u64>(1)?,
                row.get::<_, u64>(2)?,
            ))
        })?;

        for row in rows {
            let (kind, count, ms) = row?;
            stats.total_sessions += count;
            if kind == SessionKind::Focus.as_label() {
                stats.focus_sessions += count;
                stats.total_focus_ms += ms;
                stats.today_focus_sessions += count;
                stats.today_focus_ms += ms;
            } else {
                stats.total_break_ms += ms;
            }
        }
        stats.completed_tasks = conn.query_row(
            "SELECT COUNT(DISTINCT task_id) FROM sessions WHERE kind = ?1 AND completed_at >= ?2",
            params![SessionKind::LongBreak.as_label(), today_start()],
            |row| row.get(0),
        )?;
        Ok(stats)
    }

    pub fn stats_all(&self) -> Result<Stats> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT kind, COUNT(*), COALESCE(SUM(duration_ms), 0)
             FROM sessions
             GROUP BY kind",
        )?;

        let mut stats = Stats::default();
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, u64>(1)?,
                row.get::<_, u64>(2)?,
            ))
        })?;

        for row in rows {
            let (kind, count, ms) = row?;
            stats.total_sessions += count;
            if kind == SessionKind::Focus.as_label() {
                stats.focus_sessions += count;
                stats.total_focus_ms += ms;
            } else {
                stats.total_break_ms += ms;
            }
        }

        // Today's focus
        let (count, ms) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(duration_ms), 0)
             FROM sessions
             WHERE kind = ?1 AND completed_at >= ?2",
            params![SessionKind::Focus.as_label(), today_start()],
            |row| Ok((row.get::<_, u64>(0)?, row.get::<_, u64>(1)?)),
        )?;
        stats.today_focus_sessions = count;
        stats.today_focus_ms = ms;

        stats.completed_tasks = conn.query_row(
            "SELECT COUNT(*) FROM tasks WHERE completed = 1",
            [],
            |row| row.get(0),
        )?;

        Ok(stats)
    }
}

impl SessionLog for Database {
    fn record_segment(&self, segment: &CompletedSegment) -> Result<()> {
        let id = self.insert_segment(segment)?;
        tracing::debug!(id, task_id = segment.task_id, kind = %segment.kind, "segment logged");
        Ok(())
    }
}

fn today_start() -> String {
    format!("{}T00:00:00+00:00", Utc::now().format("%Y-%m-%d"))
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::QueryFailed(format!("bad timestamp '{value}': {e}")).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn segment(task_id: i64, kind: SessionKind, cycle: u32, duration_ms: u64) -> CompletedSegment {
        let completed_at = Utc::now();
        CompletedSegment {
            task_id,
            kind,
            cycle,
            duration_ms,
            started_at: completed_at - Duration::milliseconds(duration_ms as i64),
            completed_at,
        }
    }

    #[test]
    fn record_and_query() {
        let db = Database::open_memory().unwrap();
        db.record_segment(&segment(1, SessionKind::Focus, 1, 1_500_000))
            .unwrap();
        db.record_segment(&segment(1, SessionKind::ShortBreak, 1, 300_000))
            .unwrap();
        let stats = db.stats_all().unwrap();
        assert_eq!(stats.total_sessions, 2);
        assert_eq!(stats.focus_sessions, 1);
        assert_eq!(stats.total_focus_ms, 1_500_000);
        assert_eq!(stats.total_break_ms, 300_000);
        assert_eq!(stats.today_focus_sessions, 1);
    }

    #[test]
    fn stats_today_skips_older_segments() {
        let db = Database::open_memory().unwrap();
        let mut old = segment(1, SessionKind::Focus, 1, 1_000);
        old.completed_at -= Duration::days(2);
        old.started_at -= Duration::days(2);
        db.record_segment(&old).unwrap();
        db.record_segment(&segment(2, SessionKind::Focus, 1, 2_000))
            .unwrap();
        db.record_segment(&segment(2, SessionKind::LongBreak, 1, 500))
            .unwrap();

        let today = db.stats_today().unwrap();
        assert_eq!(today.focus_sessions, 1);
        assert_eq!(today.total_focus_ms, 2_000);
        assert_eq!(today.completed_tasks, 1);
        assert_eq!(db.stats_all().unwrap().focus_sessions, 2);
    }

    #[test]
    fn list_sessions_filters_by_task() {
        let db = Database::open_memory().unwrap();
        db.record_segment(&segment(1, SessionKind::Focus, 1, 10)).unwrap();
        db.record_segment(&segment(2, SessionKind::Focus, 1, 20)).unwrap();
        db.record_segment(&segment(2, SessionKind::ShortBreak, 1, 5))
            .unwrap();

        let all = db.list_sessions(None, 10).unwrap();
        assert_eq!(all.len(), 3);
        let task_two = db.list_sessions(Some(2), 10).unwrap();
        assert_eq!(task_two.len(), 2);
        assert!(task_two.iter().all(|r| r.task_id == 2));
        assert_eq!(db.list_sessions(None, 1).unwrap().len(), 1);
    }
}
