mod clock;

pub use clock::{Clock, ClockSnapshot, ClockState, ClockTick, SessionToken, TICK_INTERVAL_MS};
