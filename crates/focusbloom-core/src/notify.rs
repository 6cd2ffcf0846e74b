//! Notification boundary.
//!
//! Delivery is fire-and-forget: the controller hands over a title and a
//! body and moves on. Platform transports live outside this crate.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::session::{SessionKind, Transition};
use crate::task::Task;

pub trait Notifier: Send + Sync {
    fn show_notification(&self, title: &str, description: &str);
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub description: String,
}

impl Notification {
    /// Message shown when `task` moves on to `transition`.
    pub fn for_transition(task: &Task, transition: Transition) -> Self {
        let (title, description) = match transition {
            Transition::Segment {
                kind: SessionKind::Focus,
                cycle,
            } => (
                "Focus time".to_string(),
                format!(
                    "Break's over. Focus session {cycle} of {} for \"{}\" has started.",
                    task.focus_sessions, task.name
                ),
            ),
            Transition::Segment {
                kind: SessionKind::ShortBreak,
                ..
            } => (
                "Short break".to_string(),
                format!("Nice work on \"{}\". Take a short break.", task.name),
            ),
            Transition::Segment {
                kind: SessionKind::LongBreak,
                ..
            } => (
                "Long break".to_string(),
                format!(
                    "All {} focus sessions of \"{}\" are done. Enjoy a long break.",
                    task.focus_sessions, task.name
                ),
            ),
            Transition::Complete => (
                "Task completed".to_string(),
                format!("\"{}\" is complete.", task.name),
            ),
        };
        Self { title, description }
    }
}

/// Keeps notifications until a consumer drains them.
#[derive(Debug, Default)]
pub struct QueuedNotifier {
    queue: Mutex<Vec<Notification>>,
}

impl QueuedNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<Notification> {
        let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *queue)
    }

    pub fn len(&self) -> usize {
        self.queue.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Notifier for QueuedNotifier {
    fn show_notification(&self, title: &str, description: &str) {
        self.queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Notification {
                title: title.to_string(),
                description: description.to_string(),
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::NewTask;
    use chrono::{NaiveDate, Utc};

    fn task() -> Task {
        Task::from_new(
            9,
            NewTask::new("Read paper", NaiveDate::from_ymd_opt(2026, 5, 5).unwrap(), 3),
            Utc::now(),
        )
    }

    #[test]
    fn focus_message_names_the_cycle() {
        let n = Notification::for_transition(
            &task(),
            Transition::Segment {
                kind: SessionKind::Focus,
                cycle: 2,
            },
        );
        assert_eq!(n.title, "Focus time");
        assert!(n.description.contains("2 of 3"));
    }

    #[test]
    fn completion_message() {
        let n = Notification::for_transition(&task(), Transition::Complete);
        assert_eq!(n.title, "Task completed");
        assert!(n.description.contains("Read paper"));
    }

    #[test]
    fn queued_notifier_drains_in_order() {
        let notifier = QueuedNotifier::new();
        notifier.show_notification("a", "1");
        notifier.show_notification("b", "2");
        let drained = notifier.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].title, "a");
        assert!(notifier.is_empty());
    }
}
