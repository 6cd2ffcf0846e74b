//! Reactive settings consumed by the session controller.
//!
//! The controller never reads the config file; it holds a
//! `watch::Receiver<Settings>` and samples it at each segment boundary.
//! Until something publishes real values the defaults (25/5/15 minutes,
//! reminders on) apply.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::session::SessionDurations;
use crate::storage::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub durations: SessionDurations,
    pub reminders_enabled: bool,
    /// Minimum spacing between consumed-time writes; 0 writes every tick.
    pub checkpoint_interval_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            durations: SessionDurations::default(),
            reminders_enabled: true,
            checkpoint_interval_ms: 1_000,
        }
    }
}

impl From<&Config> for Settings {
    fn from(config: &Config) -> Self {
        Self {
            durations: SessionDurations::from_minutes(
                config.schedule.focus_duration,
                config.schedule.short_break,
                config.schedule.long_break,
            ),
            reminders_enabled: config.notifications.enabled,
            checkpoint_interval_ms: config.timer.checkpoint_interval_ms,
        }
    }
}

/// Owner side of the settings stream.
#[derive(Debug)]
pub struct SettingsStore {
    tx: watch::Sender<Settings>,
}

impl SettingsStore {
    pub fn new(settings: Settings) -> Self {
        let (tx, _rx) = watch::channel(settings);
        Self { tx }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(Settings::from(config))
    }

    pub fn current(&self) -> Settings {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Settings> {
        self.tx.subscribe()
    }

    pub fn update(&self, settings: Settings) {
        self.tx.send_replace(settings);
    }
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}
