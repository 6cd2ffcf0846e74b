//! Countdown clock.
//!
//! The clock is a tick-driven state machine. It does not spawn anything
//! itself - whoever owns it calls `tick()` every [`TICK_INTERVAL_MS`]
//! (see [`crate::controller::runner`]).
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Ticking <-> Paused
//! Ticking | Paused -> Stopped            (stop)
//! Ticking -> Stopped -> Finished         (remaining reached zero)
//! any -> Idle                            (reset)
//! ```
//!
//! Every `start()` hands out a fresh [`SessionToken`]. Ticks carrying an
//! older token are reported as stale and change nothing, so a superseded
//! driver loop can never advance (or checkpoint) a newer segment.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Fixed cadence of the countdown.
pub const TICK_INTERVAL_MS: u64 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockState {
    Idle,
    Ticking,
    Paused,
    Stopped,
    Finished,
}

/// Identifies one `start()` of the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionToken(u64);

impl SessionToken {
    pub fn generation(self) -> u64 {
        self.0
    }
}

/// Published on every change: remaining time and state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockSnapshot {
    pub state: ClockState,
    pub remaining_ms: u64,
}

/// Result of a single `tick()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockTick {
    /// Counted down one interval; time is left.
    Advanced { remaining_ms: u64 },
    /// Reached zero on this tick. Reported once per start.
    Finished,
    /// Current token, but the clock is not ticking (paused, idle, done).
    Held,
    /// Token from a superseded start.
    Stale,
}

#[derive(Debug)]
pub struct Clock {
    state: ClockState,
    remaining_ms: u64,
    generation: u64,
    tick_ms: u64,
    tx: watch::Sender<ClockSnapshot>,
}

impl Clock {
    pub fn new() -> Self {
        Self::with_tick_interval(TICK_INTERVAL_MS)
    }

    pub fn with_tick_interval(tick_ms: u64) -> Self {
        let (tx, _rx) = watch::channel(ClockSnapshot {
            state: ClockState::Idle,
            remaining_ms: 0,
        });
        Self {
            state: ClockState::Idle,
            remaining_ms: 0,
            generation: 0,
            tick_ms: tick_ms.max(1),
            tx,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> ClockState {
        self.state
    }

    pub fn remaining_ms(&self) -> u64 {
        self.remaining_ms
    }

    pub fn tick_interval_ms(&self) -> u64 {
        self.tick_ms
    }

    /// Token of the most recent start, if the clock has a live run.
    pub fn current_token(&self) -> Option<SessionToken> {
        match self.state {
            ClockState::Ticking | ClockState::Paused => Some(SessionToken(self.generation)),
            _ => None,
        }
    }

    pub fn is_current(&self, token: SessionToken) -> bool {
        token.0 == self.generation
    }

    pub fn snapshot(&self) -> ClockSnapshot {
        ClockSnapshot {
            state: self.state,
            remaining_ms: self.remaining_ms,
        }
    }

    /// Reactive view of remaining time and state.
    pub fn subscribe(&self) -> watch::Receiver<ClockSnapshot> {
        self.tx.subscribe()
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Set the countdown for the next `start()`.
    pub fn set_ticking_time(&mut self, remaining_ms: u64) {
        self.remaining_ms = remaining_ms;
        self.publish();
    }

    /// Begin counting down, cancelling whatever run came before.
    pub fn start(&mut self) -> SessionToken {
        self.generation += 1;
        self.state = ClockState::Ticking;
        self.publish();
        SessionToken(self.generation)
    }

    pub fn pause(&mut self) -> bool {
        if self.state != ClockState::Ticking {
            return false;
        }
        self.state = ClockState::Paused;
        self.publish();
        true
    }

    pub fn resume(&mut self) -> bool {
        if self.state != ClockState::Paused {
            return false;
        }
        self.state = ClockState::Ticking;
        self.publish();
        true
    }

    /// Halt the current run. A new `start()` is needed to tick again.
    pub fn stop(&mut self) -> bool {
        if !matches!(self.state, ClockState::Ticking | ClockState::Paused) {
            return false;
        }
        self.state = ClockState::Stopped;
        self.publish();
        true
    }

    /// Back to `Idle`; outstanding tokens become stale.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.state = ClockState::Idle;
        self.publish();
    }

    pub fn tick(&mut self, token: SessionToken) -> ClockTick {
        if !self.is_current(token) {
            return ClockTick::Stale;
        }
        if self.state != ClockState::Ticking {
            return ClockTick::Held;
        }
        self.remaining_ms = self.remaining_ms.saturating_sub(self.tick_ms);
        if self.remaining_ms == 0 {
            self.state = ClockState::Stopped;
            self.publish();
            self.state = ClockState::Finished;
            self.publish();
            return ClockTick::Finished;
        }
        self.publish();
        ClockTick::Advanced {
            remaining_ms: self.remaining_ms,
        }
    }

    fn publish(&self) {
        self.tx.send_replace(self.snapshot());
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_pause_resume() {
        let mut clock = Clock::new();
        assert_eq!(clock.state(), ClockState::Idle);

        clock.set_ticking_time(1_000);
        let token = clock.start();
        assert_eq!(clock.state(), ClockState::Ticking);

        assert!(clock.pause());
        assert_eq!(clock.state(), ClockState::Paused);
        assert_eq!(clock.tick(token), ClockTick::Held);
        assert_eq!(clock.remaining_ms(), 1_000);

        assert!(clock.resume());
        assert_eq!(clock.tick(token), ClockTick::Advanced { remaining_ms: 800 });
    }

    #[test]
    fn ticks_decrease_by_exactly_one_interval() {
        let mut clock = Clock::new();
        clock.set_ticking_time(2_000);
        let token = clock.start();
        let mut previous = clock.remaining_ms();
        for _ in 0..9 {
            match clock.tick(token) {
                ClockTick::Advanced { remaining_ms } => {
                    assert_eq!(previous - remaining_ms, TICK_INTERVAL_MS);
                    previous = remaining_ms;
                }
                other => panic!("unexpected tick {other:?}"),
            }
        }
        assert_eq!(clock.tick(token), ClockTick::Finished);
        assert_eq!(clock.remaining_ms(), 0);
    }

    #[test]
    fn finish_is_reported_once() {
        let mut clock = Clock::new();
        clock.set_ticking_time(200);
        let token = clock.start();
        assert_eq!(clock.tick(token), ClockTick::Finished);
        assert_eq!(clock.state(), ClockState::Finished);
        assert_eq!(clock.tick(token), ClockTick::Held);
    }

    #[test]
    fn partial_interval_saturates_to_zero() {
        let mut clock = Clock::new();
        clock.set_ticking_time(500);
        let token = clock.start();
        assert_eq!(clock.tick(token), ClockTick::Advanced { remaining_ms: 300 });
        assert_eq!(clock.tick(token), ClockTick::Advanced { remaining_ms: 100 });
        assert_eq!(clock.tick(token), ClockTick::Finished);
    }

    #[test]
    fn restart_makes_old_token_stale() {
        let mut clock = Clock::new();
        clock.set_ticking_time(1_000);
        let first = clock.start();
        let second = clock.start();
        assert_ne!(first, second);
        assert_eq!(clock.tick(first), ClockTick::Stale);
        assert_eq!(clock.remaining_ms(), 1_000);
        assert_eq!(clock.tick(second), ClockTick::Advanced { remaining_ms: 800 });
    }

    #[test]
    fn reset_returns_to_idle_and_invalidates_token() {
        let mut clock = Clock::new();
        clock.set_ticking_time(1_000);
        let token = clock.start();
        assert!(clock.stop());
        assert_eq!(clock.state(), ClockState::Stopped);
        assert_eq!(clock.tick(token), ClockTick::Held);
        clock.reset();
        assert_eq!(clock.state(), ClockState::Idle);
        assert_eq!(clock.tick(token), ClockTick::Stale);
        assert!(clock.current_token().is_none());
    }

    #[test]
    fn subscribers_see_remaining_time() {
        let mut clock = Clock::new();
        let rx = clock.subscribe();
        clock.set_ticking_time(600);
        let token = clock.start();
        clock.tick(token);
        let snap = *rx.borrow();
        assert_eq!(snap.state, ClockState::Ticking);
        assert_eq!(snap.remaining_ms, 400);
    }
}
