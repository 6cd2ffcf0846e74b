//! Consumed-time checkpoint throttling.
//!
//! Ticks arrive five times a second; the store only needs a value every
//! `interval_ms` plus a final flush when the clock stops. Written values are
//! monotonically increasing within a segment.

#[derive(Debug, Clone)]
pub(crate) struct Checkpointer {
    interval_ms: u64,
    last_written: u64,
    latest: u64,
}

impl Checkpointer {
    pub(crate) fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            last_written: 0,
            latest: 0,
        }
    }

    /// Start tracking a segment whose stored checkpoint is `consumed_ms`.
    pub(crate) fn begin(&mut self, consumed_ms: u64, interval_ms: u64) {
        self.interval_ms = interval_ms;
        self.last_written = consumed_ms;
        self.latest = consumed_ms;
    }

    /// Record a tick. Returns the value to write, if one is due.
    pub(crate) fn observe(&mut self, consumed_ms: u64) -> Option<u64> {
        self.latest = self.latest.max(consumed_ms);
        if self.latest.saturating_sub(self.last_written) >= self.interval_ms.max(1) {
            self.last_written = self.latest;
            return Some(self.latest);
        }
        None
    }

    /// Value still unwritten, if any.
    pub(crate) fn flush(&mut self) -> Option<u64> {
        if self.latest > self.last_written {
            self.last_written = self.latest;
            return Some(self.latest);
        }
        None
    }
}
