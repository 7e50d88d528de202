//! Single-flight, time-gated poll trigger.
//!
//! The host calls the heartbeat far more often than the API may be polled.
//! `try_begin` admits a cycle only when nothing is in flight and the
//! next-eligible time has passed. Admission immediately moves the
//! next-eligible time one interval ahead, so a slow or failing fetch can
//! neither overlap nor spin.

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};

/// Extra delay after the API answers 429.
pub fn rate_limit_cooldown() -> Duration {
    Duration::hours(1)
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PollState {
    pub next_eligible: DateTime<Utc>,
    pub in_progress: bool,
    pub poll_interval: Duration,
}

pub struct PollScheduler {
    state: Mutex<PollState>,
}

impl PollScheduler {
    /// First heartbeat at or after `start` is eligible.
    pub fn new(poll_interval: std::time::Duration, start: DateTime<Utc>) -> Self {
        Self {
            state: Mutex::new(PollState {
                next_eligible: start,
                in_progress: false,
                poll_interval: Duration::seconds(poll_interval.as_secs() as i64),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PollState> {
        // state is plain data; a panic mid-update cannot leave it torn
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Admit a poll cycle at `now`, or `None` if one is running or the
    /// interval has not elapsed. The returned guard ends the cycle on drop.
    pub fn try_begin(&self, now: DateTime<Utc>) -> Option<PollGuard<'_>> {
        let mut state = self.lock();
        if state.in_progress || now < state.next_eligible {
            tracing::debug!(
                in_progress = state.in_progress,
                next_poll = %state.next_eligible,
                "Awaiting next poll"
            );
            return None;
        }

        state.in_progress = true;
        state.next_eligible = now + state.poll_interval;
        Some(PollGuard { scheduler: self })
    }

    /// Push the next-eligible time further out. Returns the new time.
    pub fn postpone(&self, by: Duration) -> DateTime<Utc> {
        let mut state = self.lock();
        state.next_eligible += by;
        state.next_eligible
    }

    /// Make the very next heartbeat eligible.
    pub fn retry_now(&self, now: DateTime<Utc>) {
        self.lock().next_eligible = now;
    }

    pub fn snapshot(&self) -> PollState {
        self.lock().clone()
    }

    pub fn next_eligible(&self) -> DateTime<Utc> {
        self.lock().next_eligible
    }

    pub fn in_progress(&self) -> bool {
        self.lock().in_progress
    }
}

/// Held for the duration of one poll cycle.
pub struct PollGuard<'a> {
    scheduler: &'a PollScheduler,
}

impl Drop for PollGuard<'_> {
    fn drop(&mut self) {
        self.scheduler.lock().in_progress = false;
    }
}
