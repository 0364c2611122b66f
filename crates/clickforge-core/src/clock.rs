//! Wall-clock access for the engine.
//!
//! All timestamps in game state are absolute epoch milliseconds. The engine
//! never reads the system time directly; it asks its [`Clock`], so tests and
//! headless hosts can drive time explicitly with a [`ManualClock`].

use std::cell::Cell;
use std::rc::Rc;

/// A source of absolute wall-clock time in epoch milliseconds.
pub trait Clock {
    fn now_ms(&self) -> i64;
}

/// Reads the real UTC time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// A clock that only moves when told to. Clones share the same time, so a
/// test can keep one handle while the engine owns another.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<i64>>,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now: Rc::new(Cell::new(start_ms)),
        }
    }

    pub fn set_ms(&self, now_ms: i64) {
        self.now.set(now_ms);
    }

    pub fn advance_ms(&self, ms: i64) {
        self.now.set(self.now.get().saturating_add(ms));
    }

    /// Advance by fractional seconds (rounded to the nearest millisecond).
    pub fn advance_secs(&self, secs: f64) {
        self.advance_ms((secs * 1000.0).round() as i64);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.get()
    }
}

/// Milliseconds between two timestamps, as seconds. Never negative: a clock
/// that moved backwards yields zero elapsed time.
pub fn elapsed_secs(from_ms: i64, to_ms: i64) -> f64 {
    (to_ms.saturating_sub(from_ms)).max(0) as f64 / 1000.0
}
