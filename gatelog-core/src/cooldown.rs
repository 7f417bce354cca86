//! Per-badge debounce state.
//!
//! Process-local and never persisted: losing it on restart only means the
//! first tap after a restart is always accepted.

use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use gatelog_model::badge_key;

/// Default debounce window between two accepted scans of one badge.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_millis(3000);

#[derive(Debug)]
pub struct CooldownTracker {
    window: chrono::Duration,
    last_accepted: DashMap<String, DateTime<Utc>>,
}

impl Default for CooldownTracker {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN)
    }
}

impl CooldownTracker {
    pub fn new(window: Duration) -> Self {
        Self {
            window: chrono::Duration::from_std(window)
                .unwrap_or(chrono::Duration::MAX),
            last_accepted: DashMap::new(),
        }
    }

    pub fn window(&self) -> chrono::Duration {
        self.window
    }

    /// Timestamp of the last accepted scan for this badge, any case.
    pub fn last_accepted(&self, badge: &str) -> Option<DateTime<Utc>> {
        self.last_accepted.get(&badge_key(badge)).map(|entry| *entry)
    }

    pub fn record_accepted(&self, badge: &str, at: DateTime<Utc>) {
        self.last_accepted.insert(badge_key(badge), at);
    }

    /// `true` while `now` is inside the window opened by the last accepted
    /// scan. A clock that moved backwards counts as inside the window.
    pub fn is_cooling_down(&self, badge: &str, now: DateTime<Utc>) -> bool {
        self.last_accepted(badge)
            .is_some_and(|last| now - last < self.window)
    }

    pub fn len(&self) -> usize {
        self.last_accepted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_accepted.is_empty()
    }
}
