//! Cooperative recurring tasks polled against the engine clock.

/// A task that fires every `interval_ms` while armed. Disarming cancels it
/// deterministically: a disarmed task is never due.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurringTask {
    interval_ms: u64,
    next_due_ms: Option<i64>,
}

impl RecurringTask {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            next_due_ms: None,
        }
    }

    /// First firing one interval after `now_ms`. A zero interval never arms.
    pub fn arm(&mut self, now_ms: i64) {
        if self.interval_ms > 0 {
            self.next_due_ms = Some(now_ms.saturating_add(self.interval_ms as i64));
        }
    }

    pub fn disarm(&mut self) {
        self.next_due_ms = None;
    }

    pub fn is_armed(&self) -> bool {
        self.next_due_ms.is_some()
    }

    pub fn next_due_ms(&self) -> Option<i64> {
        self.next_due_ms
    }

    /// Whether the task should run at `now_ms`. Firing reschedules it; missed
    /// intervals collapse into a single firing.
    pub fn poll(&mut self, now_ms: i64) -> bool {
        let Some(due) = self.next_due_ms else {
            return false;
        };
        if now_ms < due {
            return false;
        }
        let interval = self.interval_ms as i64;
        let mut next = due.saturating_add(interval);
        if next <= now_ms {
            next = now_ms.saturating_add(interval);
        }
        self.next_due_ms = Some(next);
        true
    }
}
