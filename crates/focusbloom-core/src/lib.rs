//! # Focusbloom Core Library
//!
//! Task-bound Pomodoro sessions. Each task carries a plan of
//! `focus_sessions` Focus segments separated by short breaks and closed by a
//! long break; the controller walks a task through that plan and checkpoints
//! progress so an interrupted session resumes where it stopped.
//!
//! ## Architecture
//!
//! - **Clock**: a countdown owned by one controller, advanced only by
//!   `tick()` calls carrying the current [`SessionToken`]
//! - **Policy**: pure transition table from the current segment to the next
//! - **Controller**: binds a task to the clock and persists every transition
//! - **Runner**: the tokio loop that ticks a shared controller every 200 ms
//! - **Storage**: SQLite task store and session log, TOML configuration
//!
//! ## Key Components
//!
//! - [`TaskProgressController`]: the session state machine
//! - [`SessionRunner`]: background tick loop
//! - [`TaskRepository`]: task persistence boundary
//! - [`Config`]: application configuration management

pub mod controller;
pub mod error;
pub mod events;
pub mod notify;
pub mod session;
pub mod settings;
pub mod storage;
pub mod task;
pub mod timer;

pub use controller::runner::{RunOutcome, SessionRunner, SharedController};
pub use controller::{ControllerStatus, StartOutcome, TaskProgressController, TickReport};
pub use error::{ConfigError, CoreError, DatabaseError, SessionError, ValidationError};
pub use events::Event;
pub use notify::{Notification, Notifier, QueuedNotifier};
pub use session::{next_segment, SessionDurations, SessionKind, Transition};
pub use settings::{Settings, SettingsStore};
pub use storage::{CompletedSegment, Config, Database, SessionLog, SqliteTaskRepository, Stats};
pub use task::{InMemoryTaskRepository, NewTask, SegmentChange, Task, TaskRepository};
pub use timer::{Clock, ClockSnapshot, ClockState, ClockTick, SessionToken};
