use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Daily time budget for unauthenticated sessions, in minutes.
pub const DAILY_LIMIT_MINUTES: u32 = 120;

/// Length of the usage window before counters reset.
pub const RESET_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

struct SessionUsage {
    window_start: Instant,
    minutes: u32,
}

/// Session-scoped daily time-budget enforcement for unauthenticated users.
///
/// Each accepted question submission accrues one minute against the session.
/// Counters reset 24 wall-clock hours after the window opened. State is held
/// in memory only and does not survive a restart; authenticated sessions never
/// reach this type.
pub struct UsageLimiter {
    sessions: HashMap<String, SessionUsage>,
    limit: u32,
    window: Duration,
}

impl Default for UsageLimiter {
    fn default() -> Self {
        Self::new(DAILY_LIMIT_MINUTES, RESET_WINDOW)
    }
}

impl UsageLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        UsageLimiter {
            sessions: HashMap::new(),
            limit,
            window,
        }
    }

    /// Charges one minute against the session.
    ///
    /// Returns `Some(total_minutes)` when the submission is allowed, `None`
    /// once the budget is exhausted for the current window.
    pub fn try_accrue(&mut self, session_id: &str) -> Option<u32> {
        self.try_accrue_at(session_id, Instant::now())
    }

    /// Minutes accrued by the session in its current window.
    pub fn minutes_used(&self, session_id: &str) -> u32 {
        self.sessions.get(session_id).map_or(0, |u| u.minutes)
    }

    // Clock-injected core so the 24h boundary is testable.
    fn try_accrue_at(&mut self, session_id: &str, now: Instant) -> Option<u32> {
        let usage = self
            .sessions
            .entry(session_id.to_string())
            .or_insert(SessionUsage {
                window_start: now,
                minutes: 0,
            });

        if now.duration_since(usage.window_start) >= self.window {
            usage.window_start = now;
            usage.minutes = 0;
        }

        if usage.minutes >= self.limit {
            return None;
        }

        usage.minutes += 1;
        Some(usage.minutes)
    }
}
