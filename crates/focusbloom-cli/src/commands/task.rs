//! Task management commands for CLI.

use chrono::{DateTime, Local, NaiveDate, Utc};
use clap::Subcommand;
use focusbloom_core::{Config, NewTask, SessionDurations, SqliteTaskRepository, TaskRepository};
use serde_json::json;

#[derive(Subcommand)]
pub enum TaskAction {
    /// Create a new task
    Create {
        /// Task name
        name: String,
        /// Task description
        #[arg(long)]
        description: Option<String>,
        /// Day the task belongs to, YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Number of focus sessions (default: schedule.default_focus_sessions)
        #[arg(long)]
        sessions: Option<u32>,
        /// Planned start, RFC 3339
        #[arg(long)]
        start_at: Option<DateTime<Utc>>,
        /// Planned end, RFC 3339
        #[arg(long)]
        end_at: Option<DateTime<Utc>>,
    },
    /// List tasks
    List {
        /// Only tasks for this day
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Hide completed tasks
        #[arg(long)]
        pending: bool,
    },
    /// Show task details
    Show {
        /// Task ID
        id: i64,
    },
    /// Delete a task
    Delete {
        /// Task ID
        id: i64,
    },
}

pub fn run(action: TaskAction) -> Result<(), Box<dyn std::error::Error>> {
    let repo = SqliteTaskRepository::open()?;

    match action {
        TaskAction::Create {
            name,
            description,
            date,
            sessions,
            start_at,
            end_at,
        } => {
            let config = Config::load()?;
            let date = date.unwrap_or_else(|| Local::now().date_naive());
            let sessions = sessions.unwrap_or(config.schedule.default_focus_sessions);
            let mut new = NewTask::new(name, date, sessions);
            new.description = description;
            new.start_at = start_at;
            new.end_at = end_at;

            let task = repo.create_task(new)?;
            println!("{}", serde_json::to_string_pretty(&task)?);
        }
        TaskAction::List { date, pending } => {
            let tasks: Vec<_> = repo
                .list_tasks()?
                .into_iter()
                .filter(|task| date.is_none_or(|d| task.date == d))
                .filter(|task| !pending || !task.completed)
                .collect();
            println!("{}", serde_json::to_string_pretty(&tasks)?);
        }
        TaskAction::Show { id } => {
            let task = repo
                .get_task(id)?
                .ok_or_else(|| format!("task {id} not found"))?;
            let config = Config::load()?;
            let durations = SessionDurations::from_minutes(
                config.schedule.focus_duration,
                config.schedule.short_break,
                config.schedule.long_break,
            );
            let remaining_ms = task.remaining_ms(&durations);
            let planned_ms = task.planned_duration_ms(&durations);
            let output = json!({
                "task": task,
                "remaining_ms": remaining_ms,
                "planned_ms": planned_ms,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        TaskAction::Delete { id } => {
            if !repo.delete_task(id)? {
                return Err(format!("task {id} not found").into());
            }
            println!("Task deleted: {id}");
        }
    }
    Ok(())
}
