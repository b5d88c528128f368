//! Wall-clock abstraction.
//!
//! All timestamps written by the coordinator are fixed-width UTC strings with
//! millisecond precision, so lexicographic order equals chronological order
//! in every backend's sort.

use std::sync::Mutex;

use time::{Duration, OffsetDateTime};

pub use planta_storage::format_timestamp;

/// Source of "now" for every write the coordinator performs.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> OffsetDateTime;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// A clock that only moves when told to. Each read advances it by `step`
/// so successive writes get strictly increasing timestamps.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<OffsetDateTime>,
    step: Duration,
}

impl ManualClock {
    pub fn new(start: OffsetDateTime) -> Self {
        Self::with_step(start, Duration::seconds(1))
    }

    pub fn with_step(start: OffsetDateTime, step: Duration) -> Self {
        Self {
            now: Mutex::new(start),
            step,
        }
    }

    /// Jump forward without reading.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> OffsetDateTime {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        let current = *now;
        *now += self.step;
        current
    }
}
