//! Session commands.
//!
//! `timer run` keeps the process alive and ticks the task until its plan is
//! done or Ctrl-C pauses it; every other command is a single step against
//! the stored task state.

use std::sync::Arc;
use std::time::Duration;

use clap::Subcommand;
use focusbloom_core::{
    Clock, Config, Database, Event, Notifier, SessionRunner, SettingsStore,
    SqliteTaskRepository, StartOutcome, TaskProgressController, TaskRepository,
};
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

#[derive(Subcommand)]
pub enum TimerAction {
    /// Run a task's sessions in the foreground, resuming stored progress
    Run {
        /// Task ID
        id: i64,
    },
    /// Skip the rest of the task's current segment
    Skip {
        /// Task ID
        id: i64,
    },
    /// Print a task's session state as JSON (default: the active task)
    Status {
        /// Task ID
        id: Option<i64>,
    },
    /// Clear the active flag on every task
    ResetActive,
}

/// Reminders printed to stderr, next to the event stream on stdout.
struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn show_notification(&self, title: &str, description: &str) {
        eprintln!("[{title}] {description}");
    }
}

struct Session {
    repo: Arc<SqliteTaskRepository>,
    settings: SettingsStore,
}

impl Session {
    fn open() -> Result<Self, Box<dyn std::error::Error>> {
        let config = Config::load()?;
        Ok(Self {
            repo: Arc::new(SqliteTaskRepository::open()?),
            settings: SettingsStore::from_config(&config),
        })
    }

    fn controller(&self) -> TaskProgressController {
        TaskProgressController::new(
            self.repo.clone(),
            self.settings.subscribe(),
            Arc::new(ConsoleNotifier),
            Clock::new(),
        )
    }
}

fn print_event(event: &Event) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string(event)?);
    Ok(())
}

pub fn run(action: TimerAction) -> Result<(), Box<dyn std::error::Error>> {
    let session = Session::open()?;

    match action {
        TimerAction::Run { id } => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(run_foreground(session, id))?;
        }
        TimerAction::Skip { id } => {
            let mut controller = session.controller();
            controller.load_task(id)?;
            let transition = controller.next()?;
            println!("{}", serde_json::to_string_pretty(&transition)?);
        }
        TimerAction::Status { id } => {
            let id = match id {
                Some(id) => Some(id),
                None => session
                    .repo
                    .list_tasks()?
                    .into_iter()
                    .find(|t| t.active)
                    .map(|t| t.id),
            };
            let Some(id) = id else {
                println!("{}", json!({ "active": null }));
                return Ok(());
            };
            let mut controller = session.controller();
            let task = controller.load_task(id)?;
            let output = json!({
                "task": task,
                "status": controller.status(),
                "snapshot": controller.snapshot(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        TimerAction::ResetActive => {
            session.controller().deactivate_all()?;
            println!("{}", json!({ "type": "active_reset" }));
        }
    }
    Ok(())
}

async fn run_foreground(session: Session, id: i64) -> Result<(), Box<dyn std::error::Error>> {
    let log = Arc::new(Database::open()?);
    let controller = session.controller().with_session_log(log);
    let mut events = controller.subscribe_events();
    let mut runner = SessionRunner::new(controller);

    runner.load_task(id).await?;
    if let StartOutcome::Completed = runner.start().await? {
        while let Ok(event) = events.try_recv() {
            print_event(&event)?;
        }
        return Ok(());
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut watchdog = tokio::time::interval(Duration::from_secs(1));

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    print_event(&event)?;
                    if matches!(event, Event::TaskCompleted { .. } | Event::TaskUnavailable { .. }) {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "event output fell behind"),
                Err(RecvError::Closed) => break,
            },
            _ = &mut ctrl_c => {
                runner.pause().await?;
                while let Ok(event) = events.try_recv() {
                    print_event(&event)?;
                }
                return Ok(());
            }
            _ = watchdog.tick() => {
                if !runner.is_running() {
                    break;
                }
            }
        }
    }
    while let Ok(event) = events.try_recv() {
        print_event(&event)?;
    }

    if let Some(result) = runner.wait().await {
        result?;
    }
    Ok(())
}
