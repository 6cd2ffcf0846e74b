//! Task progress controller.
//!
//! Binds one task to an owned [`Clock`] and walks it through its cycle plan:
//!
//! ```text
//! load_task -> start -> tick ... tick -> (segment finished)
//!                 ^                          |
//!                 +---- next segment <-------+  until LongBreak completes
//! ```
//!
//! Every tick checkpoints the consumed time of the current segment so a
//! restarted process resumes where it stopped. Every segment boundary is one
//! repository write batch plus, when reminders are on, one notification.
//!
//! The controller never sleeps. [`runner`] owns the 200 ms loop and feeds
//! `tick()` with the [`SessionToken`] it was started with; ticks carrying a
//! superseded token are ignored.

mod checkpoint;
pub mod runner;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::error::{CoreError, Result, SessionError};
use crate::events::Event;
use crate::notify::{Notification, Notifier};
use crate::session::{next_segment, SessionKind, Transition};
use crate::settings::Settings;
use crate::storage::{CompletedSegment, SessionLog};
use crate::task::{SegmentChange, Task, TaskRepository};
use crate::timer::{Clock, ClockSnapshot, ClockState, ClockTick, SessionToken};

use checkpoint::Checkpointer;

const EVENT_CAPACITY: usize = 256;

/// What the controller is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerStatus {
    /// No task loaded.
    Unbound,
    /// Task loaded, clock not running.
    Ready,
    Running,
    Paused,
    Completed,
    /// The bound task disappeared; the session was stopped.
    TaskUnavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started {
        token: SessionToken,
        kind: SessionKind,
        cycle: u32,
        remaining_ms: u64,
    },
    /// Nothing left to run; the task was marked completed.
    Completed,
}

/// Result of feeding one tick to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickReport {
    Ticked { remaining_ms: u64 },
    /// Paused or idle; nothing advanced.
    Held,
    /// Token belongs to a superseded run. The caller should stop ticking.
    Stale,
    /// The previous segment finished and the next one is running under `token`.
    SegmentStarted {
        token: SessionToken,
        kind: SessionKind,
        cycle: u32,
    },
    /// The last long break finished.
    Completed,
}

#[derive(Debug, Clone, Copy)]
struct ActiveSegment {
    kind: SessionKind,
    cycle: u32,
    duration_ms: u64,
    started_at: DateTime<Utc>,
}

pub struct TaskProgressController {
    repo: Arc<dyn TaskRepository>,
    settings: watch::Receiver<Settings>,
    notifier: Arc<dyn Notifier>,
    session_log: Option<Arc<dyn SessionLog>>,
    clock: Clock,
    events: broadcast::Sender<Event>,
    task_rx: Option<watch::Receiver<Option<Task>>>,
    bound_id: Option<i64>,
    segment: Option<ActiveSegment>,
    checkpoint: Checkpointer,
    unavailable: bool,
}

impl TaskProgressController {
    pub fn new(
        repo: Arc<dyn TaskRepository>,
        settings: watch::Receiver<Settings>,
        notifier: Arc<dyn Notifier>,
        clock: Clock,
    ) -> Self {
        let (events, _rx) = broadcast::channel(EVENT_CAPACITY);
        let interval = settings.borrow().checkpoint_interval_ms;
        Self {
            repo,
            settings,
            notifier,
            session_log: None,
            clock,
            events,
            task_rx: None,
            bound_id: None,
            segment: None,
            checkpoint: Checkpointer::new(interval),
            unavailable: false,
        }
    }

    /// Record every naturally finished segment into `log`.
    pub fn with_session_log(mut self, log: Arc<dyn SessionLog>) -> Self {
        self.session_log = Some(log);
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn subscribe_events(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Remaining time and clock state, for UIs.
    pub fn clock_updates(&self) -> watch::Receiver<ClockSnapshot> {
        self.clock.subscribe()
    }

    /// The bound task's snapshot stream.
    pub fn task_updates(&self) -> Option<watch::Receiver<Option<Task>>> {
        self.task_rx.clone()
    }

    pub fn bound_task_id(&self) -> Option<i64> {
        self.bound_id
    }

    pub fn current_task(&self) -> Option<Task> {
        self.task_rx.as_ref().and_then(|rx| rx.borrow().clone())
    }

    pub fn clock_state(&self) -> ClockState {
        self.clock.state()
    }

    pub fn remaining_ms(&self) -> u64 {
        self.clock.remaining_ms()
    }

    pub fn current_token(&self) -> Option<SessionToken> {
        self.clock.current_token()
    }

    pub fn tick_interval_ms(&self) -> u64 {
        self.clock.tick_interval_ms()
    }

    pub fn status(&self) -> ControllerStatus {
        if self.bound_id.is_none() {
            return ControllerStatus::Unbound;
        }
        if self.unavailable {
            return ControllerStatus::TaskUnavailable;
        }
        if self.current_task().is_some_and(|t| t.completed) {
            return ControllerStatus::Completed;
        }
        match self.clock.state() {
            ClockState::Ticking => ControllerStatus::Running,
            ClockState::Paused => ControllerStatus::Paused,
            _ => ControllerStatus::Ready,
        }
    }

    pub fn snapshot(&self) -> Event {
        let task = self.current_task();
        Event::StateSnapshot {
            task_id: self.bound_id,
            state: self.clock.state(),
            kind: self.segment.map(|s| s.kind).or(task.as_ref().map(|t| t.current)),
            cycle: task.as_ref().map(|t| t.current_cycle).unwrap_or(0),
            remaining_ms: self.clock.remaining_ms(),
            duration_ms: self.segment.map(|s| s.duration_ms).unwrap_or(0),
            at: Utc::now(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Bind `id`, replacing any previous subscription.
    ///
    /// Binding a different task stops the clock for the previous one after
    /// flushing its checkpoint.
    pub fn load_task(&mut self, id: i64) -> Result<Task> {
        if let Some(previous) = self.bound_id.filter(|prev| *prev != id) {
            self.release(previous)?;
        }
        let rx = self.repo.watch_task(id)?;
        let task = rx
            .borrow()
            .clone()
            .ok_or(SessionError::TaskNotFound { id })?;
        self.task_rx = Some(rx);
        self.bound_id = Some(id);
        self.unavailable = false;
        if self.segment.is_none() {
            let durations = self.settings.borrow().durations;
            self.clock.set_ticking_time(task.remaining_ms(&durations));
        }
        debug!(task_id = id, "task loaded");
        self.emit(Event::TaskLoaded {
            task_id: id,
            at: Utc::now(),
        });
        Ok(task)
    }

    /// Begin the task, or resume it from its stored segment and checkpoint.
    pub fn start(&mut self) -> Result<StartOutcome> {
        let id = self.bound()?;
        self.flush_checkpoint(id)?;
        let task = self.require_task(id)?;
        if task.completed {
            return Err(SessionError::TaskAlreadyCompleted { id }.into());
        }
        let settings = *self.settings.borrow();

        let activated = self.repo.activate_exclusively(id);
        self.guard(id, activated)?;

        if !task.is_started() {
            match next_segment(task.current, task.current_cycle, task.focus_sessions) {
                Transition::Complete => {
                    self.complete(&task)?;
                    Ok(StartOutcome::Completed)
                }
                Transition::Segment { kind, cycle } => {
                    let change = SegmentChange {
                        current: kind,
                        cycle,
                        in_progress: true,
                    };
                    let written = self.repo.apply_segment_change(id, change);
                    self.guard(id, written)?;
                    let duration = settings.durations.duration_of(kind);
                    Ok(self.begin_segment(id, kind, cycle, duration, duration, &settings))
                }
            }
        } else {
            let kind = task.current;
            let duration = settings.durations.duration_of(kind);
            let remaining = task.remaining_ms(&settings.durations);
            let written = self.repo.update_task_in_progress(id, true);
            self.guard(id, written)?;
            Ok(self.begin_segment(id, kind, task.current_cycle, duration, remaining, &settings))
        }
    }

    pub fn pause(&mut self) -> Result<bool> {
        let id = self.bound()?;
        if !self.clock.pause() {
            return Ok(false);
        }
        self.flush_checkpoint(id)?;
        self.emit(Event::TimerPaused {
            task_id: id,
            remaining_ms: self.clock.remaining_ms(),
            at: Utc::now(),
        });
        Ok(true)
    }

    pub fn resume(&mut self) -> Result<bool> {
        let id = self.bound()?;
        self.require_task(id)?;
        if !self.clock.resume() {
            return Ok(false);
        }
        self.emit(Event::TimerResumed {
            task_id: id,
            remaining_ms: self.clock.remaining_ms(),
            at: Utc::now(),
        });
        Ok(true)
    }

    /// Stop the clock and return it to idle. Session and cycle stay as they
    /// are; the consumed time is flushed so `start()` picks up from there.
    pub fn reset(&mut self) -> Result<()> {
        let id = self.bound()?;
        self.flush_checkpoint(id)?;
        self.clock.reset();
        self.segment = None;
        if let Some(task) = self.current_task() {
            let durations = self.settings.borrow().durations;
            self.clock.set_ticking_time(task.remaining_ms(&durations));
        }
        self.emit(Event::TimerReset {
            task_id: id,
            at: Utc::now(),
        });
        Ok(())
    }

    /// Skip the rest of the current segment.
    ///
    /// The next segment starts right away if the task was in progress;
    /// otherwise it is only recorded and waits for `start()`.
    pub fn next(&mut self) -> Result<Transition> {
        let id = self.bound()?;
        let task = self.require_task(id)?;
        if task.completed {
            return Err(SessionError::TaskAlreadyCompleted { id }.into());
        }
        let running = self.segment.is_some() || task.in_progress;
        self.segment = None;

        let transition = next_segment(task.current, task.current_cycle, task.focus_sessions);
        self.emit(Event::SegmentSkipped {
            task_id: id,
            from: task.current,
            to: match transition {
                Transition::Segment { kind, .. } => Some(kind),
                Transition::Complete => None,
            },
            at: Utc::now(),
        });
        info!(task_id = id, from = %task.current, ?transition, "segment skipped");

        let settings = *self.settings.borrow();
        if settings.reminders_enabled {
            let message = Notification::for_transition(&task, transition);
            self.notifier
                .show_notification(&message.title, &message.description);
        }

        match transition {
            Transition::Complete => self.complete(&task)?,
            Transition::Segment { kind, cycle } => {
                let change = SegmentChange {
                    current: kind,
                    cycle,
                    in_progress: running,
                };
                let written = self.repo.apply_segment_change(id, change);
                self.guard(id, written)?;
                let duration = settings.durations.duration_of(kind);
                if running {
                    let activated = self.repo.activate_exclusively(id);
                    self.guard(id, activated)?;
                    self.begin_segment(id, kind, cycle, duration, duration, &settings);
                } else {
                    self.clock.reset();
                    self.clock.set_ticking_time(duration);
                }
            }
        }
        Ok(transition)
    }

    /// Clear the active flag on every task and stop the clock.
    pub fn deactivate_all(&mut self) -> Result<()> {
        if let Some(id) = self.bound_id {
            self.flush_checkpoint(id)?;
        }
        self.clock.reset();
        self.segment = None;
        self.repo.update_all_tasks_active_status_to_inactive()
    }

    /// Advance the clock by one interval on behalf of the run `token`.
    pub fn tick(&mut self, token: SessionToken) -> Result<TickReport> {
        let Some(id) = self.bound_id else {
            return Ok(TickReport::Stale);
        };
        match self.clock.tick(token) {
            ClockTick::Stale => {
                debug!(task_id = id, generation = token.generation(), "stale tick ignored");
                Ok(TickReport::Stale)
            }
            ClockTick::Held => Ok(TickReport::Held),
            ClockTick::Advanced { remaining_ms } => {
                self.on_tick(id, remaining_ms)?;
                Ok(TickReport::Ticked { remaining_ms })
            }
            ClockTick::Finished => self.execute_tasks(id),
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn bound(&self) -> Result<i64, SessionError> {
        self.bound_id.ok_or(SessionError::NoTaskBound)
    }

    fn emit(&self, event: Event) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Current snapshot of `id`, failing closed when it is gone.
    fn require_task(&mut self, id: i64) -> Result<Task> {
        match self.current_task() {
            Some(task) => Ok(task),
            None => Err(self.fail_closed(id)),
        }
    }

    /// Map a "task not found" write failure onto the fail-closed path.
    fn guard(&mut self, id: i64, result: Result<()>) -> Result<()> {
        match result {
            Err(CoreError::Session(SessionError::TaskNotFound { .. })) => Err(self.fail_closed(id)),
            other => other,
        }
    }

    fn fail_closed(&mut self, id: i64) -> CoreError {
        warn!(task_id = id, "bound task disappeared; stopping session");
        self.clock.stop();
        self.clock.reset();
        self.segment = None;
        self.unavailable = true;
        self.emit(Event::TaskUnavailable {
            task_id: id,
            at: Utc::now(),
        });
        SessionError::TaskUnavailable { id }.into()
    }

    fn begin_segment(
        &mut self,
        id: i64,
        kind: SessionKind,
        cycle: u32,
        duration_ms: u64,
        remaining_ms: u64,
        settings: &Settings,
    ) -> StartOutcome {
        self.clock.set_ticking_time(remaining_ms);
        let token = self.clock.start();
        self.segment = Some(ActiveSegment {
            kind,
            cycle,
            duration_ms,
            started_at: Utc::now(),
        });
        self.checkpoint.begin(
            duration_ms.saturating_sub(remaining_ms),
            settings.checkpoint_interval_ms,
        );
        info!(task_id = id, %kind, cycle, duration_ms, remaining_ms, "segment started");
        self.emit(Event::SegmentStarted {
            task_id: id,
            kind,
            cycle,
            duration_ms,
            remaining_ms,
            at: Utc::now(),
        });
        StartOutcome::Started {
            token,
            kind,
            cycle,
            remaining_ms,
        }
    }

    fn on_tick(&mut self, id: i64, remaining_ms: u64) -> Result<()> {
        self.require_task(id)?;
        let Some(segment) = self.segment else {
            return Ok(());
        };
        let consumed = segment.duration_ms.saturating_sub(remaining_ms);
        if let Some(ms) = self.checkpoint.observe(consumed) {
            let written = self.repo.update_consumed_time(id, segment.kind, ms);
            self.guard(id, written)?;
            debug!(task_id = id, kind = %segment.kind, consumed_ms = ms, "checkpoint");
        }
        Ok(())
    }

    fn flush_checkpoint(&mut self, id: i64) -> Result<()> {
        let Some(segment) = self.segment else {
            return Ok(());
        };
        let consumed = segment
            .duration_ms
            .saturating_sub(self.clock.remaining_ms());
        let due = self.checkpoint.observe(consumed);
        if let Some(ms) = due.or_else(|| self.checkpoint.flush()) {
            let written = self.repo.update_consumed_time(id, segment.kind, ms);
            self.guard(id, written)?;
        }
        Ok(())
    }

    /// The clock ran out: record, transition, notify and chain the next
    /// segment.
    fn execute_tasks(&mut self, id: i64) -> Result<TickReport> {
        let task = self.require_task(id)?;
        let Some(segment) = self.segment.take() else {
            return Ok(TickReport::Held);
        };
        let completed_at = Utc::now();
        info!(task_id = id, kind = %segment.kind, cycle = segment.cycle, "segment completed");
        self.emit(Event::SegmentCompleted {
            task_id: id,
            kind: segment.kind,
            cycle: segment.cycle,
            duration_ms: segment.duration_ms,
            at: completed_at,
        });
        if let Some(log) = &self.session_log {
            let record = CompletedSegment {
                task_id: id,
                kind: segment.kind,
                cycle: segment.cycle,
                duration_ms: segment.duration_ms,
                started_at: segment.started_at,
                completed_at,
            };
            if let Err(e) = log.record_segment(&record) {
                warn!(task_id = id, error = %e, "failed to record completed segment");
            }
        }

        let settings = *self.settings.borrow();
        let transition = next_segment(task.current, task.current_cycle, task.focus_sessions);
        if settings.reminders_enabled {
            let message = Notification::for_transition(&task, transition);
            self.notifier
                .show_notification(&message.title, &message.description);
        }

        match transition {
            Transition::Complete => {
                self.complete(&task)?;
                Ok(TickReport::Completed)
            }
            Transition::Segment { kind, cycle } => {
                let change = SegmentChange {
                    current: kind,
                    cycle,
                    in_progress: true,
                };
                let written = self.repo.apply_segment_change(id, change);
                self.guard(id, written)?;
                let duration = settings.durations.duration_of(kind);
                match self.begin_segment(id, kind, cycle, duration, duration, &settings) {
                    StartOutcome::Started { token, .. } => Ok(TickReport::SegmentStarted {
                        token,
                        kind,
                        cycle,
                    }),
                    StartOutcome::Completed => Ok(TickReport::Completed),
                }
            }
        }
    }

    fn complete(&mut self, task: &Task) -> Result<()> {
        let written = self.repo.mark_completed(task.id);
        self.guard(task.id, written)?;
        self.clock.stop();
        self.clock.reset();
        self.clock.set_ticking_time(0);
        self.segment = None;
        info!(task_id = task.id, "task completed");
        self.emit(Event::TaskCompleted {
            task_id: task.id,
            at: Utc::now(),
        });
        Ok(())
    }

    /// Let go of `id`: flush its checkpoint, stop the clock, clear active.
    /// A task that no longer exists has nothing left to release.
    fn release(&mut self, id: i64) -> Result<()> {
        if self.current_task().is_some() {
            self.flush_checkpoint(id)?;
            self.repo.update_task_active(id, false)?;
        }
        self.clock.reset();
        self.segment = None;
        self.task_rx = None;
        self.bound_id = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::QueuedNotifier;
    use crate::session::SessionDurations;
    use crate::settings::SettingsStore;
    use crate::task::{InMemoryTaskRepository, NewTask};
    use chrono::NaiveDate;

    struct Harness {
        repo: Arc<InMemoryTaskRepository>,
        notifier: Arc<QueuedNotifier>,
        settings: SettingsStore,
        controller: TaskProgressController,
    }

    fn harness(durations: SessionDurations, checkpoint_interval_ms: u64) -> Harness {
        let repo = Arc::new(InMemoryTaskRepository::new());
        let notifier = Arc::new(QueuedNotifier::new());
        let settings = SettingsStore::new(Settings {
            durations,
            reminders_enabled: true,
            checkpoint_interval_ms,
        });
        let controller = TaskProgressController::new(
            repo.clone(),
            settings.subscribe(),
            notifier.clone(),
            Clock::new(),
        );
        Harness {
            repo,
            notifier,
            settings,
            controller,
        }
    }

    fn small() -> SessionDurations {
        SessionDurations {
            focus_ms: 1_000,
            short_break_ms: 500,
            long_break_ms: 800,
        }
    }

    fn create(repo: &InMemoryTaskRepository, focus_sessions: u32) -> Task {
        repo.create_task(NewTask::new(
            "Draft chapter",
            NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(),
            focus_sessions,
        ))
        .unwrap()
    }

    fn started_token(outcome: StartOutcome) -> SessionToken {
        match outcome {
            StartOutcome::Started { token, .. } => token,
            StartOutcome::Completed => panic!("expected a running segment"),
        }
    }

    #[test]
    fn commands_require_a_bound_task() {
        let mut h = harness(small(), 0);
        let err = h.controller.start().unwrap_err();
        assert!(matches!(err, CoreError::Session(SessionError::NoTaskBound)));
        assert_eq!(h.controller.status(), ControllerStatus::Unbound);
    }

    #[test]
    fn load_unknown_task_fails() {
        let mut h = harness(small(), 0);
        let err = h.controller.load_task(99).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Session(SessionError::TaskNotFound { id: 99 })
        ));
    }

    #[test]
    fn start_initialises_first_focus() {
        let mut h = harness(small(), 0);
        let task = create(&h.repo, 2);
        h.controller.load_task(task.id).unwrap();
        let outcome = h.controller.start().unwrap();
        assert!(matches!(
            outcome,
            StartOutcome::Started {
                kind: SessionKind::Focus,
                cycle: 1,
                remaining_ms: 1_000,
                ..
            }
        ));
        let stored = h.repo.get_task(task.id).unwrap().unwrap();
        assert_eq!(stored.current_cycle, 1);
        assert_eq!(stored.current, SessionKind::Focus);
        assert!(stored.in_progress && stored.active);
        assert_eq!(h.controller.status(), ControllerStatus::Running);
    }

    #[test]
    fn ticks_checkpoint_consumed_time() {
        let mut h = harness(small(), 0);
        let task = create(&h.repo, 2);
        h.controller.load_task(task.id).unwrap();
        let token = started_token(h.controller.start().unwrap());
        for _ in 0..3 {
            h.controller.tick(token).unwrap();
        }
        let stored = h.repo.get_task(task.id).unwrap().unwrap();
        assert_eq!(stored.consumed_focus_ms, 600);
    }

    #[test]
    fn debounced_checkpoint_is_flushed_on_pause() {
        let mut h = harness(small(), 1_000);
        let task = create(&h.repo, 2);
        h.controller.load_task(task.id).unwrap();
        let token = started_token(h.controller.start().unwrap());
        h.controller.tick(token).unwrap();
        h.controller.tick(token).unwrap();
        assert_eq!(h.repo.get_task(task.id).unwrap().unwrap().consumed_focus_ms, 0);
        assert!(h.controller.pause().unwrap());
        assert_eq!(h.repo.get_task(task.id).unwrap().unwrap().consumed_focus_ms, 400);
    }

    #[test]
    fn pause_holds_remaining_time() {
        let mut h = harness(small(), 0);
        let task = create(&h.repo, 2);
        h.controller.load_task(task.id).unwrap();
        let token = started_token(h.controller.start().unwrap());
        h.controller.tick(token).unwrap();
        h.controller.pause().unwrap();
        for _ in 0..5 {
            assert_eq!(h.controller.tick(token).unwrap(), TickReport::Held);
        }
        assert_eq!(h.controller.remaining_ms(), 800);
        h.controller.resume().unwrap();
        assert_eq!(
            h.controller.tick(token).unwrap(),
            TickReport::Ticked { remaining_ms: 600 }
        );
    }

    #[test]
    fn finishing_focus_chains_into_short_break() {
        let mut h = harness(small(), 0);
        let task = create(&h.repo, 2);
        h.controller.load_task(task.id).unwrap();
        let token = started_token(h.controller.start().unwrap());
        let mut report = TickReport::Held;
        for _ in 0..5 {
            report = h.controller.tick(token).unwrap();
        }
        let TickReport::SegmentStarted { token: next, kind, cycle } = report else {
            panic!("expected chained segment, got {report:?}");
        };
        assert_eq!(kind, SessionKind::ShortBreak);
        assert_eq!(cycle, 1);
        assert_ne!(next, token);
        assert_eq!(h.controller.tick(token).unwrap(), TickReport::Stale);

        let notes = h.notifier.drain();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].title, "Short break");
    }

    #[test]
    fn reminders_off_sends_nothing() {
        let mut h = harness(small(), 0);
        let mut s = h.settings.current();
        s.reminders_enabled = false;
        h.settings.update(s);
        let task = create(&h.repo, 1);
        h.controller.load_task(task.id).unwrap();
        let mut token = started_token(h.controller.start().unwrap());
        loop {
            match h.controller.tick(token).unwrap() {
                TickReport::SegmentStarted { token: t, .. } => token = t,
                TickReport::Completed => break,
                _ => {}
            }
        }
        assert!(h.notifier.is_empty());
    }

    #[test]
    fn resume_uses_checkpoint() {
        let mut h = harness(SessionDurations::default(), 0);
        let mut task = create(&h.repo, 4);
        task.current_cycle = 1;
        task.current = SessionKind::Focus;
        task.consumed_focus_ms = 600_000;
        task.in_progress = true;
        h.repo.insert(task.clone());

        h.controller.load_task(task.id).unwrap();
        let outcome = h.controller.start().unwrap();
        assert!(matches!(
            outcome,
            StartOutcome::Started {
                remaining_ms: 900_000,
                cycle: 1,
                ..
            }
        ));
        assert_eq!(h.controller.remaining_ms(), 900_000);
    }

    #[test]
    fn skip_moves_to_next_segment_with_fresh_checkpoint() {
        let mut h = harness(small(), 0);
        let task = create(&h.repo, 3);
        h.controller.load_task(task.id).unwrap();
        let token = started_token(h.controller.start().unwrap());
        h.controller.tick(token).unwrap();
        h.repo.update_consumed_short_break_time(task.id, 300).unwrap();

        let transition = h.controller.next().unwrap();
        assert_eq!(
            transition,
            Transition::Segment {
                kind: SessionKind::ShortBreak,
                cycle: 1
            }
        );
        let stored = h.repo.get_task(task.id).unwrap().unwrap();
        assert_eq!(stored.current, SessionKind::ShortBreak);
        assert_eq!(stored.consumed_short_break_ms, 0);
        assert_eq!(h.controller.remaining_ms(), 500);
        assert_eq!(h.controller.status(), ControllerStatus::Running);
        assert_eq!(h.controller.tick(token).unwrap(), TickReport::Stale);
    }

    #[test]
    fn skip_sends_one_reminder() {
        let mut h = harness(small(), 0);
        let task = create(&h.repo, 2);
        h.controller.load_task(task.id).unwrap();
        let token = started_token(h.controller.start().unwrap());
        h.controller.tick(token).unwrap();
        h.controller.next().unwrap();

        let notes = h.notifier.drain();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].title, "Short break");
    }

    #[test]
    fn skip_with_reminders_off_is_silent() {
        let mut h = harness(small(), 0);
        let mut s = h.settings.current();
        s.reminders_enabled = false;
        h.settings.update(s);
        let task = create(&h.repo, 2);
        h.controller.load_task(task.id).unwrap();
        h.controller.start().unwrap();
        h.controller.next().unwrap();
        assert!(h.notifier.is_empty());
    }

    #[test]
    fn skip_from_long_break_completes() {
        let mut h = harness(small(), 0);
        let mut task = create(&h.repo, 1);
        task.current_cycle = 1;
        task.current = SessionKind::LongBreak;
        task.in_progress = true;
        h.repo.insert(task.clone());
        h.controller.load_task(task.id).unwrap();
        assert_eq!(h.controller.next().unwrap(), Transition::Complete);
        let stored = h.repo.get_task(task.id).unwrap().unwrap();
        assert!(stored.completed && !stored.in_progress && !stored.active);
        assert_eq!(h.controller.status(), ControllerStatus::Completed);
    }

    #[test]
    fn reset_keeps_session_state() {
        let mut h = harness(small(), 0);
        let task = create(&h.repo, 2);
        h.controller.load_task(task.id).unwrap();
        let token = started_token(h.controller.start().unwrap());
        h.controller.tick(token).unwrap();
        h.controller.reset().unwrap();
        assert_eq!(h.controller.clock_state(), ClockState::Idle);
        assert_eq!(h.controller.tick(token).unwrap(), TickReport::Stale);
        let stored = h.repo.get_task(task.id).unwrap().unwrap();
        assert_eq!(stored.current_cycle, 1);
        assert_eq!(stored.current, SessionKind::Focus);
        assert_eq!(stored.consumed_focus_ms, 200);
    }

    #[test]
    fn deleted_task_fails_closed() {
        let mut h = harness(small(), 0);
        let task = create(&h.repo, 2);
        h.controller.load_task(task.id).unwrap();
        let token = started_token(h.controller.start().unwrap());
        let mut events = h.controller.subscribe_events();
        h.repo.delete_task(task.id).unwrap();

        let err = h.controller.tick(token).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Session(SessionError::TaskUnavailable { id }) if id == task.id
        ));
        assert_eq!(h.controller.status(), ControllerStatus::TaskUnavailable);
        assert_eq!(h.controller.clock_state(), ClockState::Idle);
        assert_eq!(h.controller.tick(token).unwrap(), TickReport::Stale);
        assert!(matches!(
            events.try_recv().unwrap(),
            Event::TaskUnavailable { .. }
        ));
    }

    #[test]
    fn zero_focus_sessions_completes_on_start() {
        let mut h = harness(small(), 0);
        let mut task = create(&h.repo, 1);
        task.focus_sessions = 0;
        h.repo.insert(task.clone());
        h.controller.load_task(task.id).unwrap();
        assert_eq!(h.controller.start().unwrap(), StartOutcome::Completed);
        assert!(h.repo.get_task(task.id).unwrap().unwrap().completed);
    }

    #[test]
    fn completed_task_cannot_restart() {
        let mut h = harness(small(), 0);
        let task = create(&h.repo, 1);
        h.repo.update_task_completed(task.id, true).unwrap();
        h.controller.load_task(task.id).unwrap();
        let err = h.controller.start().unwrap_err();
        assert!(matches!(
            err,
            CoreError::Session(SessionError::TaskAlreadyCompleted { .. })
        ));
    }

    #[test]
    fn starting_another_task_moves_the_active_flag() {
        let mut h = harness(small(), 0);
        let a = create(&h.repo, 2);
        let b = create(&h.repo, 2);
        h.controller.load_task(a.id).unwrap();
        let token_a = started_token(h.controller.start().unwrap());
        h.controller.tick(token_a).unwrap();

        h.controller.load_task(b.id).unwrap();
        h.controller.start().unwrap();
        assert_eq!(h.controller.tick(token_a).unwrap(), TickReport::Stale);

        let tasks = h.repo.list_tasks().unwrap();
        let active: Vec<i64> = tasks.iter().filter(|t| t.active).map(|t| t.id).collect();
        assert_eq!(active, vec![b.id]);
        let first = tasks.iter().find(|t| t.id == a.id).unwrap();
        assert_eq!(first.consumed_focus_ms, 200);
    }

    #[test]
    fn loading_another_task_after_delete_binds_it() {
        let mut h = harness(small(), 1_000);
        let a = create(&h.repo, 2);
        let b = create(&h.repo, 2);
        h.controller.load_task(a.id).unwrap();
        let token_a = started_token(h.controller.start().unwrap());
        h.controller.tick(token_a).unwrap();
        h.repo.delete_task(a.id).unwrap();

        let loaded = h.controller.load_task(b.id).unwrap();
        assert_eq!(loaded.id, b.id);
        assert_eq!(h.controller.clock_state(), ClockState::Idle);
        assert_eq!(h.controller.tick(token_a).unwrap(), TickReport::Stale);
        let outcome = h.controller.start().unwrap();
        assert!(matches!(
            outcome,
            StartOutcome::Started {
                kind: SessionKind::Focus,
                cycle: 1,
                ..
            }
        ));
        assert!(h.repo.get_task(b.id).unwrap().unwrap().active);
    }

    #[test]
    fn deactivate_all_clears_active_flags() {
        let mut h = harness(small(), 0);
        let task = create(&h.repo, 2);
        h.controller.load_task(task.id).unwrap();
        h.controller.start().unwrap();
        h.controller.deactivate_all().unwrap();
        assert!(!h.repo.get_task(task.id).unwrap().unwrap().active);
        assert_eq!(h.controller.clock_state(), ClockState::Idle);
    }
}
