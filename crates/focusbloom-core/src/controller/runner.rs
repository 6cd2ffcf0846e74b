//! Tick loop for a shared controller.
//!
//! One loop runs per clock start:
//!
//! ```text
//! loop {
//!     wait 200ms
//!     match controller.tick(token) {
//!         SegmentStarted(next) => token = next,   // next segment of the plan
//!         Completed | Stale    => break,          // plan done / superseded
//!         _                    => continue,       // ticked or paused
//!     }
//! }
//! ```
//!
//! Pausing does not stop the loop; it keeps polling until the clock resumes
//! or a newer start makes its token stale.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

use super::{StartOutcome, TaskProgressController, TickReport};
use crate::error::Result;
use crate::session::Transition;
use crate::task::Task;
use crate::timer::SessionToken;

pub type SharedController = Arc<Mutex<TaskProgressController>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The task finished its last long break.
    Completed,
    /// Another start (or a reset) took over the clock.
    Superseded,
}

/// Tick `controller` every interval until the run started under `token`
/// completes or is superseded.
pub async fn drive(controller: SharedController, token: SessionToken) -> Result<RunOutcome> {
    let period = Duration::from_millis(controller.lock().await.tick_interval_ms());
    let mut interval = interval_at(Instant::now() + period, period);
    // A suspended process resumes one tick at a time rather than bursting.
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut token = token;
    loop {
        interval.tick().await;
        let report = controller.lock().await.tick(token)?;
        match report {
            TickReport::Ticked { .. } | TickReport::Held => {}
            TickReport::SegmentStarted { token: next, kind, cycle } => {
                debug!(%kind, cycle, "runner following next segment");
                token = next;
            }
            TickReport::Completed => return Ok(RunOutcome::Completed),
            TickReport::Stale => return Ok(RunOutcome::Superseded),
        }
    }
}

/// Owns the background loop for a shared controller and restarts it
/// whenever a command hands the clock a new token.
pub struct SessionRunner {
    controller: SharedController,
    handle: Option<JoinHandle<Result<RunOutcome>>>,
}

impl SessionRunner {
    pub fn new(controller: TaskProgressController) -> Self {
        Self::from_shared(Arc::new(Mutex::new(controller)))
    }

    pub fn from_shared(controller: SharedController) -> Self {
        Self {
            controller,
            handle: None,
        }
    }

    pub fn controller(&self) -> SharedController {
        Arc::clone(&self.controller)
    }

    pub async fn load_task(&mut self, id: i64) -> Result<Task> {
        self.controller.lock().await.load_task(id)
    }

    pub async fn start(&mut self) -> Result<StartOutcome> {
        let outcome = self.controller.lock().await.start()?;
        if let StartOutcome::Started { token, .. } = outcome {
            self.spawn(token);
        }
        Ok(outcome)
    }

    pub async fn pause(&mut self) -> Result<bool> {
        self.controller.lock().await.pause()
    }

    pub async fn resume(&mut self) -> Result<bool> {
        self.controller.lock().await.resume()
    }

    pub async fn reset(&mut self) -> Result<()> {
        self.controller.lock().await.reset()?;
        self.abort();
        Ok(())
    }

    pub async fn next(&mut self) -> Result<Transition> {
        let (transition, token) = {
            let mut controller = self.controller.lock().await;
            let transition = controller.next()?;
            (transition, controller.current_token())
        };
        match token {
            Some(token) => self.spawn(token),
            None => self.abort(),
        }
        Ok(transition)
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Wait for the current loop to end. `None` when no loop was started.
    pub async fn wait(&mut self) -> Option<Result<RunOutcome>> {
        let handle = self.handle.take()?;
        Some(match handle.await {
            Ok(outcome) => outcome,
            Err(e) => Err(e.into()),
        })
    }

    fn spawn(&mut self, token: SessionToken) {
        // The old loop would exit on its stale token anyway; aborting just
        // frees it sooner.
        self.abort();
        let controller = Arc::clone(&self.controller);
        self.handle = Some(tokio::spawn(drive(controller, token)));
    }

    fn abort(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for SessionRunner {
    fn drop(&mut self) {
        self.abort();
    }
}
